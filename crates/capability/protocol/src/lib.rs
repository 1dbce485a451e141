//! # 控制器链路能力模块
//!
//! 负责主机与灯光控制器之间的行协议通信：
//! - **链路**：单飞请求/应答、按前缀匹配应答、超时重发、断线指数退避重连
//! - **编码**：控制意图 → 固件要求的精确指令行
//! - **解码**：`STATUS` / `ACK` / `ERR` / `INFO` / 诊断行 → 结构化数据
//!
//! ## 架构设计
//!
//! ```text
//! DeviceController
//!       │  ControllerCommand::encode()
//!       ▼
//! CommandLink (ControllerLink)
//!       │  FIFO 队列 → 单个后台任务独占连接
//!       ▼
//! LinkConnector (TCP 网桥 / 串口)
//!       │
//!       ▼
//! 控制器固件 ──应答──▶ StatusDecoder / classify_line
//!             └─主动上报─▶ UnsolicitedLineHandler
//! ```

mod command;
mod connector;
mod decode;
mod error;
mod link;

pub use command::{ACK_PREFIX, ControllerCommand, MAX_WIRE_CHANNELS, STATUS_PREFIX};
pub use connector::{LinkConnector, LinkEndpoint, LinkIo, LinkStream, SerialConnector, TcpConnector};
pub use decode::{
    ControllerLine, DiagnosticKind, DiagnosticReading, DiagnosticReport, StatusDecoder,
    classify_line, decode_diagnostic, is_error_line, is_info_line,
};
pub use error::{CodecError, LinkError};
pub use link::{
    CommandLink, ControllerLink, IgnoreUnsolicited, LinkConfig, LinkState, UnsolicitedLineHandler,
};
