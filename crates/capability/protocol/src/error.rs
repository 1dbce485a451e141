//! 链路与编解码错误类型定义

/// 控制器链路错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// 无法打开底层设备
    #[error("link unavailable: {0}")]
    Unavailable(String),

    /// 链路在请求进行中断开（含显式关闭时挂起的请求）
    #[error("link lost")]
    Lost,

    /// 在超时时间内未收到匹配前缀的应答
    #[error("command timeout: {0}")]
    CommandTimeout(String),

    /// 控制器以 `ERR:` 应答
    #[error("controller rejected command: {0}")]
    Rejected(String),

    /// 链路已关闭
    #[error("link closed")]
    Closed,
}

/// 协议编解码错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// 应答不是预期的行类型
    #[error("unexpected line: {0}")]
    UnexpectedLine(String),

    /// 通道编号无法用单个数字编码
    #[error("channel {0} cannot be encoded on the wire")]
    ChannelNotEncodable(u8),
}
