use lumo_control::ControlError;
use lumo_storage::{StorageError, StorageErrorKind};

/// 调度操作错误
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid time: {0}")]
    InvalidTime(String),
    #[error("invalid channel: {0}")]
    InvalidChannel(u8),
    /// 同一设备同一通道已存在启用中的调度
    #[error("schedule conflict: {0}")]
    Conflict(String),
    #[error("schedule not found: {0}")]
    NotFound(i64),
    #[error("storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Control(#[from] ControlError),
}

impl ScheduleError {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ScheduleError::InvalidTime(_) | ScheduleError::InvalidChannel(_)
        )
    }
}

impl From<StorageError> for ScheduleError {
    fn from(err: StorageError) -> Self {
        match err.kind() {
            StorageErrorKind::Conflict => ScheduleError::Conflict(err.to_string()),
            _ => ScheduleError::Storage(err.to_string()),
        }
    }
}

impl From<domain::TimeValidationError> for ScheduleError {
    fn from(err: domain::TimeValidationError) -> Self {
        ScheduleError::InvalidTime(err.to_string())
    }
}

/// 持久队列不可用；只在本 crate 内流转，调用方看到的是兜底定时器
#[derive(Debug, thiserror::Error)]
pub(crate) enum QueueError {
    #[error("durable queue unavailable: {0}")]
    Unavailable(String),
}
