use lumo_protocol::{CodecError, LinkError};

/// 设备控制错误。
///
/// 校验类错误在任何 I/O 之前返回；链路错误原样上抛，本层不自动重试。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlError {
    #[error("invalid channel: {0}")]
    InvalidChannel(u8),
    #[error("invalid brightness: {0} (expected 0-255)")]
    InvalidBrightness(u16),
    #[error("invalid time: {0}")]
    InvalidTime(String),
    #[error("invalid duration: {0}s")]
    InvalidDuration(u32),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl ControlError {
    /// 是否为请求参数错误（调用方修正请求即可）。
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ControlError::InvalidChannel(_)
                | ControlError::InvalidBrightness(_)
                | ControlError::InvalidTime(_)
                | ControlError::InvalidDuration(_)
        )
    }
}

impl From<domain::TimeValidationError> for ControlError {
    fn from(err: domain::TimeValidationError) -> Self {
        ControlError::InvalidTime(err.to_string())
    }
}
