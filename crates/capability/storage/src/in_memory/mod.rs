//! 内存存储实现
//!
//! 未配置数据库或 Redis 时使用，同时用于测试。

pub mod job_queue;
pub mod schedule;

pub use job_queue::*;
pub use schedule::*;
