//! 追踪初始化、请求 ID 生成与基础计数器。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 计数器快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub commands_sent: u64,
    pub command_failures: u64,
    pub command_timeouts: u64,
    pub link_reconnects: u64,
    pub unsolicited_lines: u64,
    pub status_decoded: u64,
    pub snapshots_published: u64,
    pub observer_delivery_failures: u64,
    pub jobs_enqueued_durable: u64,
    pub jobs_enqueued_fallback: u64,
    pub queue_failures: u64,
    pub jobs_fired: u64,
    pub hardware_schedules_applied: u64,
}

/// 进程内计数器。
pub struct TelemetryMetrics {
    commands_sent: AtomicU64,
    command_failures: AtomicU64,
    command_timeouts: AtomicU64,
    link_reconnects: AtomicU64,
    unsolicited_lines: AtomicU64,
    status_decoded: AtomicU64,
    snapshots_published: AtomicU64,
    observer_delivery_failures: AtomicU64,
    jobs_enqueued_durable: AtomicU64,
    jobs_enqueued_fallback: AtomicU64,
    queue_failures: AtomicU64,
    jobs_fired: AtomicU64,
    hardware_schedules_applied: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            commands_sent: AtomicU64::new(0),
            command_failures: AtomicU64::new(0),
            command_timeouts: AtomicU64::new(0),
            link_reconnects: AtomicU64::new(0),
            unsolicited_lines: AtomicU64::new(0),
            status_decoded: AtomicU64::new(0),
            snapshots_published: AtomicU64::new(0),
            observer_delivery_failures: AtomicU64::new(0),
            jobs_enqueued_durable: AtomicU64::new(0),
            jobs_enqueued_fallback: AtomicU64::new(0),
            queue_failures: AtomicU64::new(0),
            jobs_fired: AtomicU64::new(0),
            hardware_schedules_applied: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            command_failures: self.command_failures.load(Ordering::Relaxed),
            command_timeouts: self.command_timeouts.load(Ordering::Relaxed),
            link_reconnects: self.link_reconnects.load(Ordering::Relaxed),
            unsolicited_lines: self.unsolicited_lines.load(Ordering::Relaxed),
            status_decoded: self.status_decoded.load(Ordering::Relaxed),
            snapshots_published: self.snapshots_published.load(Ordering::Relaxed),
            observer_delivery_failures: self.observer_delivery_failures.load(Ordering::Relaxed),
            jobs_enqueued_durable: self.jobs_enqueued_durable.load(Ordering::Relaxed),
            jobs_enqueued_fallback: self.jobs_enqueued_fallback.load(Ordering::Relaxed),
            queue_failures: self.queue_failures.load(Ordering::Relaxed),
            jobs_fired: self.jobs_fired.load(Ordering::Relaxed),
            hardware_schedules_applied: self.hardware_schedules_applied.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局计数器实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info，可由 RUST_LOG 覆盖）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录指令写出次数（含重发）。
pub fn record_command_sent() {
    metrics().commands_sent.fetch_add(1, Ordering::Relaxed);
}

/// 记录指令失败次数（超时、拒绝）。
pub fn record_command_failure() {
    metrics().command_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录指令等待应答超时次数。
pub fn record_command_timeout() {
    metrics().command_timeouts.fetch_add(1, Ordering::Relaxed);
}

/// 记录链路重连成功次数。
pub fn record_link_reconnect() {
    metrics().link_reconnects.fetch_add(1, Ordering::Relaxed);
}

/// 记录控制器主动上报行数。
pub fn record_unsolicited_line() {
    metrics().unsolicited_lines.fetch_add(1, Ordering::Relaxed);
}

/// 记录状态解码成功次数。
pub fn record_status_decoded() {
    metrics().status_decoded.fetch_add(1, Ordering::Relaxed);
}

/// 记录快照广播次数。
pub fn record_snapshot_published() {
    metrics().snapshots_published.fetch_add(1, Ordering::Relaxed);
}

/// 记录观察者投递失败次数（超时或出错）。
pub fn record_observer_delivery_failure() {
    metrics().observer_delivery_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录作业写入持久队列次数。
pub fn record_job_enqueued_durable() {
    metrics().jobs_enqueued_durable.fetch_add(1, Ordering::Relaxed);
}

/// 记录作业转入进程内定时器次数。
pub fn record_job_enqueued_fallback() {
    metrics().jobs_enqueued_fallback.fetch_add(1, Ordering::Relaxed);
}

/// 记录持久队列操作失败次数。
pub fn record_queue_failure() {
    metrics().queue_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录调度作业触发次数。
pub fn record_job_fired() {
    metrics().jobs_fired.fetch_add(1, Ordering::Relaxed);
}

/// 记录下发到设备 RTC 的调度条数。
pub fn record_hardware_schedule_applied() {
    metrics().hardware_schedules_applied.fetch_add(1, Ordering::Relaxed);
}
