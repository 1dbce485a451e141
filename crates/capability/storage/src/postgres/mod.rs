//! PostgreSQL 存储实现
//!
//! 依赖表 `daily_schedules`，结构由 [`PgDailyScheduleStore::ensure_schema`] 创建：
//! - `(device_id, channel_id)` 上的部分唯一索引（仅 `is_active`），
//!   保证每个通道最多一条启用中的调度
//! - 时间字段为 `smallint`，读出时校验范围

pub mod schedule;

pub use schedule::*;
