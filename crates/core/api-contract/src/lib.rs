//! 稳定的 DTO 与 API 响应契约。

use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 健康检查返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDto {
    pub ok: bool,
    pub device_id: String,
    /// 链路状态：closed / opening / open / busy / reconnecting
    pub link: String,
}

/// 通道状态返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStateDto {
    pub id: u8,
    pub brightness: u8,
    pub motion_enabled: bool,
    pub manual_override: bool,
    pub timed_schedule_active: bool,
    pub timed_remaining_seconds: u32,
    pub energy_wh_today: f64,
    pub current_power_w: f64,
}

/// 设备快照返回结构（SSE 事件体相同）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshotDto {
    pub device_id: String,
    pub motion_sensor_enabled: bool,
    pub channels: Vec<ChannelStateDto>,
    pub captured_at_ms: i64,
}

/// 每日调度创建请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDailyScheduleRequest {
    pub channel_id: u8,
    pub on_hour: u8,
    pub on_minute: u8,
    pub off_hour: u8,
    pub off_minute: u8,
    pub is_active: Option<bool>,
}

/// 每日调度更新请求体。
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDailyScheduleRequest {
    pub on_hour: Option<u8>,
    pub on_minute: Option<u8>,
    pub off_hour: Option<u8>,
    pub off_minute: Option<u8>,
    pub is_active: Option<bool>,
}

/// 每日调度返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyScheduleDto {
    pub id: i64,
    pub device_id: String,
    pub channel_id: u8,
    pub on_hour: u8,
    pub on_minute: u8,
    pub off_hour: u8,
    pub off_minute: u8,
    pub is_active: bool,
    pub last_applied_at_ms: Option<i64>,
    /// 当前墙钟时间是否处于点亮窗口
    pub currently_active: bool,
}

/// 重新下发全部调度的结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplySchedulesDto {
    pub schedules: usize,
    pub hardware_applied: usize,
    pub hardware_error: Option<String>,
    pub durable_jobs: usize,
    pub fallback_jobs: usize,
}

/// Telemetry 指标快照返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
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
    pub observers: usize,
}
