//! # 调度执行能力模块
//!
//! 保证每条启用中的每日调度每天各执行一次开和关，三条路径并行且相互独立：
//!
//! ```text
//!                 ┌─▶ DurableJobQueue（Redis）──▶ 队列 worker ──┐
//! DailySchedule ──┼─▶ 兜底定时器（队列不可达时）────────────────┼─▶ ChannelActuator
//!                 └─▶ 控制器 RTC（apply_all_schedules）         ┘     （幂等开关）
//! ```
//!
//! - 下一触发时刻每次都从当前墙钟重新计算，不缓存
//! - 同一 `job_id` 的入队、替换、取消互斥，替换语义保证不会重复触发
//! - 作业触发后重新读取调度，仍启用则安排下一天

mod actuator;
mod clock;
mod error;
mod executor;
mod fallback;

pub use actuator::ChannelActuator;
pub use clock::{Clock, SystemClock, next_due};
pub use error::ScheduleError;
pub use executor::{ApplyReport, ExecutorConfig, JobPath, RestoreReport, ScheduleExecutor};
