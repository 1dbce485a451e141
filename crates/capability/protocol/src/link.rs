//! 控制器链路
//!
//! 物理链路是半双工的请求/应答模式，无法区分交错的应答，因此同一时刻只允许一条指令在途。
//! 所有调用方的请求进入一个有界队列，由唯一的后台任务按到达顺序（FIFO）逐条处理。
//!
//! ```text
//! Closed → Opening → Open ⇄ Busy → Reconnecting → Opening → Open
//!                     └──────── close() ────────→ Closed
//! ```
//!
//! - 等待应答期间收到的不匹配行（如 `INFO:`）交给注册的回调，不丢弃
//! - `ERR:` 行直接结束当前请求
//! - I/O 错误或对端关闭时，所有挂起请求以 `LinkError::Lost` 失败，随后指数退避重连
//! - 指令最终超时后，它迟到的应答在下一条指令写出前被丢弃

use crate::connector::{LinkConnector, LinkStream};
use crate::command::{ACK_PREFIX, STATUS_PREFIX};
use crate::decode::is_error_line;
use crate::error::LinkError;
use async_trait::async_trait;
use lumo_telemetry::{
    record_command_failure, record_command_sent, record_command_timeout, record_link_reconnect,
    record_unsolicited_line,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 超时指令的迟到应答在下一条指令写出前最多等待这么久
const STALE_REPLY_GRACE: Duration = Duration::from_millis(250);

/// 链路配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// 单条指令等待应答的超时（毫秒）
    #[serde(default = "default_command_timeout")]
    pub command_timeout_ms: u64,
    /// 超时后的重发次数
    #[serde(default = "default_command_retries")]
    pub command_retries: u32,
    /// 建立连接超时（毫秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// 首次重连等待（毫秒），之后按 2 倍递增
    #[serde(default = "default_reconnect_initial")]
    pub reconnect_initial_ms: u64,
    /// 重连等待上限（毫秒）
    #[serde(default = "default_reconnect_max")]
    pub reconnect_max_ms: u64,
    /// 排队请求上限
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_command_timeout() -> u64 {
    3000
}

fn default_command_retries() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_reconnect_initial() -> u64 {
    500
}

fn default_reconnect_max() -> u64 {
    30_000
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: default_command_timeout(),
            command_retries: default_command_retries(),
            connect_timeout_ms: default_connect_timeout(),
            reconnect_initial_ms: default_reconnect_initial(),
            reconnect_max_ms: default_reconnect_max(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// 链路状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Closed,
    Opening,
    Open,
    /// 有一条指令在途
    Busy,
    Reconnecting,
}

/// 未匹配任何挂起请求的上行行的处理器
pub trait UnsolicitedLineHandler: Send + Sync {
    fn on_line(&self, line: &str);
}

/// 丢弃所有主动上报
#[derive(Debug, Default)]
pub struct IgnoreUnsolicited;

impl UnsolicitedLineHandler for IgnoreUnsolicited {
    fn on_line(&self, _line: &str) {}
}

impl UnsolicitedLineHandler for mpsc::UnboundedSender<String> {
    fn on_line(&self, line: &str) {
        let _ = self.send(line.to_string());
    }
}

/// 指令发送抽象（上层只依赖此接口）
#[async_trait]
pub trait CommandLink: Send + Sync {
    /// 发送一行指令，返回首个以 `expected_prefix` 开头的应答行
    async fn send(&self, command_line: &str, expected_prefix: &str) -> Result<String, LinkError>;
}

/// 单条挂起请求，只在一次请求的生命周期内存在
struct PendingRequest {
    command_line: String,
    expected_prefix: String,
    reply: oneshot::Sender<Result<String, LinkError>>,
}

/// 控制器链路句柄
pub struct ControllerLink {
    requests: mpsc::Sender<PendingRequest>,
    state: watch::Receiver<LinkState>,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    endpoint: String,
}

impl ControllerLink {
    /// 打开链路；底层设备无法打开时返回 `LinkError::Unavailable`
    pub async fn open(
        connector: Arc<dyn LinkConnector>,
        config: LinkConfig,
        handler: Arc<dyn UnsolicitedLineHandler>,
    ) -> Result<Self, LinkError> {
        match connect_once(connector.as_ref(), &config).await {
            Ok(stream) => {
                info!(target: "lumo.link", endpoint = %connector.describe(), "link_opened");
                Ok(Self::spawn(connector, config, handler, Some(stream)))
            }
            Err(err) => {
                warn!(
                    target: "lumo.link",
                    endpoint = %connector.describe(),
                    error = %err,
                    "link_open_failed"
                );
                Err(LinkError::Unavailable(err.to_string()))
            }
        }
    }

    /// 启动链路；设备暂不可达时同样返回句柄，后台按退避策略重连，
    /// 期间的请求以 `LinkError::Lost` 失败。
    pub async fn start(
        connector: Arc<dyn LinkConnector>,
        config: LinkConfig,
        handler: Arc<dyn UnsolicitedLineHandler>,
    ) -> Self {
        let stream = match connect_once(connector.as_ref(), &config).await {
            Ok(stream) => {
                info!(target: "lumo.link", endpoint = %connector.describe(), "link_opened");
                Some(stream)
            }
            Err(err) => {
                warn!(
                    target: "lumo.link",
                    endpoint = %connector.describe(),
                    error = %err,
                    "link_open_deferred"
                );
                None
            }
        };
        Self::spawn(connector, config, handler, stream)
    }

    fn spawn(
        connector: Arc<dyn LinkConnector>,
        config: LinkConfig,
        handler: Arc<dyn UnsolicitedLineHandler>,
        stream: Option<LinkStream>,
    ) -> Self {
        let endpoint = connector.describe();
        let initial = if stream.is_some() {
            LinkState::Open
        } else {
            LinkState::Reconnecting
        };
        let (state_tx, state_rx) = watch::channel(initial);
        let (requests_tx, requests_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = LinkWorker {
            connector,
            config,
            handler,
            requests: requests_rx,
            state: state_tx,
            shutdown: shutdown_rx,
            stale_replies: 0,
        };
        let handle = tokio::spawn(worker.run(stream));

        Self {
            requests: requests_tx,
            state: state_rx,
            shutdown: shutdown_tx,
            worker: Mutex::new(Some(handle)),
            endpoint,
        }
    }

    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 显式关闭：挂起请求以 `LinkError::Lost` 失败，之后的请求返回 `LinkError::Closed`
    pub async fn close(&self) {
        let _ = self.shutdown.send(true);
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!(target: "lumo.link", endpoint = %self.endpoint, "link_closed");
    }
}

#[async_trait]
impl CommandLink for ControllerLink {
    async fn send(&self, command_line: &str, expected_prefix: &str) -> Result<String, LinkError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = PendingRequest {
            command_line: command_line.to_string(),
            expected_prefix: expected_prefix.to_string(),
            reply: reply_tx,
        };
        self.requests
            .send(request)
            .await
            .map_err(|_| LinkError::Closed)?;
        reply_rx.await.unwrap_or(Err(LinkError::Lost))
    }
}

async fn connect_once(
    connector: &dyn LinkConnector,
    config: &LinkConfig,
) -> std::io::Result<LinkStream> {
    match tokio::time::timeout(
        Duration::from_millis(config.connect_timeout_ms),
        connector.connect(),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "connect timeout",
        )),
    }
}

/// 会话结束原因
enum SessionEnd {
    Shutdown,
    HandleDropped,
    Broken(String),
}

/// 单条请求失败原因
enum Failure {
    Command(LinkError),
    Broken(String),
    Shutdown,
}

type LineReader = Lines<BufReader<ReadHalf<LinkStream>>>;
type LineWriter = WriteHalf<LinkStream>;

/// 独占物理连接的后台任务
struct LinkWorker {
    connector: Arc<dyn LinkConnector>,
    config: LinkConfig,
    handler: Arc<dyn UnsolicitedLineHandler>,
    requests: mpsc::Receiver<PendingRequest>,
    state: watch::Sender<LinkState>,
    shutdown: watch::Receiver<bool>,
    /// 已最终超时、应答可能仍会到达的指令数
    stale_replies: u32,
}

impl LinkWorker {
    async fn run(mut self, initial: Option<LinkStream>) {
        let mut next = initial;
        loop {
            let stream = match next.take() {
                Some(stream) => stream,
                None => match self.reconnect().await {
                    Some(stream) => stream,
                    None => {
                        self.fail_queued();
                        break;
                    }
                },
            };
            match self.session(stream).await {
                SessionEnd::Shutdown => {
                    self.fail_queued();
                    break;
                }
                SessionEnd::HandleDropped => break,
                SessionEnd::Broken(reason) => {
                    warn!(
                        target: "lumo.link",
                        endpoint = %self.connector.describe(),
                        reason = %reason,
                        "link_lost"
                    );
                    self.fail_queued();
                }
            }
        }
        self.state.send_replace(LinkState::Closed);
    }

    /// 在一个已建立的连接上服务请求，直到连接断开或关闭
    async fn session(&mut self, stream: LinkStream) -> SessionEnd {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut lines = BufReader::new(reader).lines();
        self.stale_replies = 0;
        self.state.send_replace(LinkState::Open);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => return SessionEnd::Shutdown,
                request = self.requests.recv() => {
                    let Some(request) = request else {
                        return SessionEnd::HandleDropped;
                    };
                    self.state.send_replace(LinkState::Busy);
                    let outcome = self.execute(&mut writer, &mut lines, &request).await;
                    match outcome {
                        Ok(line) => {
                            let _ = request.reply.send(Ok(line));
                        }
                        Err(Failure::Command(err)) => {
                            record_command_failure();
                            let _ = request.reply.send(Err(err));
                        }
                        Err(Failure::Broken(reason)) => {
                            let _ = request.reply.send(Err(LinkError::Lost));
                            return SessionEnd::Broken(reason);
                        }
                        Err(Failure::Shutdown) => {
                            let _ = request.reply.send(Err(LinkError::Lost));
                            return SessionEnd::Shutdown;
                        }
                    }
                    self.state.send_replace(LinkState::Open);
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.absorb_idle_line(&line),
                    Ok(None) => return SessionEnd::Broken("closed by peer".to_string()),
                    Err(err) => return SessionEnd::Broken(err.to_string()),
                },
            }
        }
    }

    /// 写出指令并等待匹配应答；超时后按配置重发
    async fn execute(
        &mut self,
        writer: &mut LineWriter,
        lines: &mut LineReader,
        request: &PendingRequest,
    ) -> Result<String, Failure> {
        let timeout = Duration::from_millis(self.config.command_timeout_ms);
        let frame = format!("{}\n", request.command_line);
        self.settle(lines).await?;

        for attempt in 0..=self.config.command_retries {
            if let Err(err) = write_frame(writer, &frame).await {
                return Err(Failure::Broken(err.to_string()));
            }
            record_command_sent();
            debug!(
                target: "lumo.link",
                command = %request.command_line,
                attempt = attempt,
                "command_sent"
            );

            let deadline = Instant::now() + timeout;
            loop {
                tokio::select! {
                    biased;
                    _ = self.shutdown.changed() => return Err(Failure::Shutdown),
                    _ = tokio::time::sleep_until(deadline) => break,
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            let line = line.trim_end_matches('\r');
                            if line.starts_with(request.expected_prefix.as_str()) {
                                debug!(target: "lumo.link", command = %request.command_line, response = %line, "command_resolved");
                                return Ok(line.to_string());
                            }
                            if is_error_line(line) {
                                warn!(target: "lumo.link", command = %request.command_line, response = %line, "command_rejected");
                                return Err(Failure::Command(LinkError::Rejected(line.to_string())));
                            }
                            self.dispatch_unsolicited(line);
                        }
                        Ok(None) => return Err(Failure::Broken("closed by peer".to_string())),
                        Err(err) => return Err(Failure::Broken(err.to_string())),
                    },
                }
            }

            record_command_timeout();
            warn!(
                target: "lumo.link",
                command = %request.command_line,
                attempt = attempt,
                timeout_ms = self.config.command_timeout_ms,
                "command_timeout"
            );
        }

        self.stale_replies = self
            .stale_replies
            .saturating_add(self.config.command_retries.saturating_add(1));
        Err(Failure::Command(LinkError::CommandTimeout(
            request.command_line.clone(),
        )))
    }

    /// 等待并丢弃超时指令的迟到应答，最长 `STALE_REPLY_GRACE`
    async fn settle(&mut self, lines: &mut LineReader) -> Result<(), Failure> {
        if self.stale_replies == 0 {
            return Ok(());
        }
        let grace = STALE_REPLY_GRACE.min(Duration::from_millis(self.config.command_timeout_ms));
        let deadline = Instant::now() + grace;
        while self.stale_replies > 0 {
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => return Err(Failure::Shutdown),
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.absorb_idle_line(&line),
                    Ok(None) => return Err(Failure::Broken("closed by peer".to_string())),
                    Err(err) => return Err(Failure::Broken(err.to_string())),
                },
                _ = tokio::time::sleep_until(deadline) => break,
            }
        }
        self.stale_replies = 0;
        Ok(())
    }

    /// 没有指令在途时收到的行：先抵扣迟到的应答，其余按主动上报处理
    fn absorb_idle_line(&mut self, line: &str) {
        let line = line.trim_end_matches('\r');
        if self.stale_replies > 0 {
            if line.starts_with(ACK_PREFIX) || is_error_line(line) {
                self.stale_replies -= 1;
                debug!(target: "lumo.link", response = %line, "stale_reply_discarded");
                return;
            }
            if line.starts_with(STATUS_PREFIX) {
                // 迟到的状态仍是有效数据
                self.stale_replies -= 1;
            }
        }
        self.dispatch_unsolicited(line);
    }

    fn dispatch_unsolicited(&self, line: &str) {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            return;
        }
        record_unsolicited_line();
        debug!(target: "lumo.link", line = %line, "unsolicited_line");
        self.handler.on_line(line);
    }

    /// 失败所有排队中的请求
    fn fail_queued(&mut self) {
        while let Ok(request) = self.requests.try_recv() {
            let _ = request.reply.send(Err(LinkError::Lost));
        }
    }

    /// 指数退避重连；关闭或句柄被丢弃时返回 None
    async fn reconnect(&mut self) -> Option<LinkStream> {
        let max_delay = Duration::from_millis(self.config.reconnect_max_ms.max(1));
        let mut delay = Duration::from_millis(self.config.reconnect_initial_ms.max(1)).min(max_delay);
        let mut attempt: u32 = 0;

        loop {
            self.state.send_replace(LinkState::Reconnecting);
            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            // 退避期间链路不可用，新请求立即失败
            loop {
                tokio::select! {
                    biased;
                    _ = self.shutdown.changed() => return None,
                    _ = &mut sleep => break,
                    request = self.requests.recv() => match request {
                        Some(request) => {
                            let _ = request.reply.send(Err(LinkError::Lost));
                        }
                        None => return None,
                    },
                }
            }

            attempt += 1;
            self.state.send_replace(LinkState::Opening);
            match connect_once(self.connector.as_ref(), &self.config).await {
                Ok(stream) => {
                    record_link_reconnect();
                    info!(
                        target: "lumo.link",
                        endpoint = %self.connector.describe(),
                        attempt = attempt,
                        "link_reconnected"
                    );
                    return Some(stream);
                }
                Err(err) => {
                    warn!(
                        target: "lumo.link",
                        endpoint = %self.connector.describe(),
                        attempt = attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %err,
                        "link_reconnect_failed"
                    );
                    delay = (delay * 2).min(max_delay);
                }
            }
        }
    }
}

async fn write_frame(writer: &mut LineWriter, frame: &str) -> std::io::Result<()> {
    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await
}
