//! # Lumo Storage 模块
//!
//! 调度相关的持久化抽象与实现：
//!
//! - [`traits`]：`DailyScheduleStore`（每日调度）与 `DurableJobQueue`（持久作业队列）
//! - [`error`]：带分类的存储错误，冲突与不存在可被上层区分处理
//! - [`in_memory`]：`RwLock` 内存实现，测试与本地运行使用
//! - [`postgres`]：sqlx 实现的调度表
//! - [`redis`]：有序集合 + 哈希实现的作业队列
//!
//! ## 约束
//!
//! - 同一设备同一通道最多一条启用中的调度
//! - 同一 `job_id` 的作业在队列中最多一份，重复入队视为替换
//! - 已认领的作业从队列移除，不会被第二次认领

pub mod connection;
pub mod error;
pub mod in_memory;
pub mod postgres;
pub mod redis;
pub mod traits;

pub use connection::*;
pub use error::*;
pub use traits::*;

pub use in_memory::{InMemoryDailyScheduleStore, InMemoryJobQueue};
pub use postgres::PgDailyScheduleStore;
pub use crate::redis::RedisJobQueue;
