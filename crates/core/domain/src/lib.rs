//! 桥接服务共享的领域模型。
//!
//! - [`device`]：控制器状态快照（通道状态 + 人体感应开关）
//! - [`schedule`]：每日开关调度与派生出的触发作业

pub mod device;
pub mod schedule;

pub use device::{ChannelState, DeviceSnapshot};
pub use schedule::{
    DailySchedule, DailyScheduleUpdate, NewDailySchedule, ScheduleEdge, ScheduledJob,
    TimeValidationError, time_is_between, validate_time,
};

/// 获取当前时间戳（毫秒）。
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
