//! 物理链路连接器
//!
//! 控制器可能经由 USB 串口直连，也可能经由串口转 TCP 网桥接入，
//! 链路层只关心拿到一个可读写的字节流。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_serial::SerialPortBuilderExt;

/// 可读写字节流
pub trait LinkIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> LinkIo for T {}

/// 链路字节流
pub type LinkStream = Box<dyn LinkIo>;

/// 建立物理连接的抽象
#[async_trait]
pub trait LinkConnector: Send + Sync {
    async fn connect(&self) -> io::Result<LinkStream>;

    /// 用于日志的端点描述
    fn describe(&self) -> String;
}

/// 链路端点配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkEndpoint {
    /// 串口转 TCP 网桥，如 `192.168.1.50:4000`
    Tcp { addr: String },
    /// 本地串口，如 `/dev/ttyUSB0`
    Serial { path: String, baud_rate: u32 },
}

impl LinkEndpoint {
    pub fn connector(&self) -> Box<dyn LinkConnector> {
        match self {
            LinkEndpoint::Tcp { addr } => Box::new(TcpConnector::new(addr.clone())),
            LinkEndpoint::Serial { path, baud_rate } => {
                Box::new(SerialConnector::new(path.clone(), *baud_rate))
            }
        }
    }
}

/// TCP 连接器
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl LinkConnector for TcpConnector {
    async fn connect(&self) -> io::Result<LinkStream> {
        let stream = TcpStream::connect(&self.addr).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.addr)
    }
}

/// 串口连接器
#[derive(Debug, Clone)]
pub struct SerialConnector {
    path: String,
    baud_rate: u32,
}

impl SerialConnector {
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
        }
    }
}

#[async_trait]
impl LinkConnector for SerialConnector {
    async fn connect(&self) -> io::Result<LinkStream> {
        let stream = tokio_serial::new(&self.path, self.baud_rate)
            .open_native_async()
            .map_err(io::Error::from)?;
        Ok(Box::new(stream))
    }

    fn describe(&self) -> String {
        format!("serial://{}@{}", self.path, self.baud_rate)
    }
}
