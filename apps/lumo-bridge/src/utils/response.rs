//! HTTP 响应辅助函数和 DTO 转换
//!
//! - 错误响应：校验 400、冲突 409、不存在 404、链路 502/504、存储 500
//! - DTO 转换：快照、调度、下发结果

use api_contract::{
    ApiResponse, ApplySchedulesDto, ChannelStateDto, DailyScheduleDto, DeviceSnapshotDto,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::{ChannelState, DailySchedule, DeviceSnapshot};
use lumo_control::ControlError;
use lumo_protocol::{LinkError, LinkState};
use lumo_schedule::{ApplyReport, ScheduleError};

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::error(code, message.into()))).into_response()
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, "INVALID.REQUEST", message)
}

/// 资源未找到错误响应
pub fn not_found_error() -> Response {
    error_response(StatusCode::NOT_FOUND, "RESOURCE.NOT_FOUND", "not found")
}

/// 控制错误响应：参数错误 400，超时 504，其余链路/设备错误 502
pub fn control_error(err: ControlError) -> Response {
    let message = err.to_string();
    match err {
        err if err.is_validation() => bad_request_error(message),
        ControlError::Link(LinkError::CommandTimeout(_)) => {
            error_response(StatusCode::GATEWAY_TIMEOUT, "LINK.TIMEOUT", message)
        }
        ControlError::Link(LinkError::Rejected(_)) => {
            error_response(StatusCode::BAD_GATEWAY, "DEVICE.REJECTED", message)
        }
        ControlError::Link(_) => {
            error_response(StatusCode::BAD_GATEWAY, "LINK.UNAVAILABLE", message)
        }
        _ => error_response(StatusCode::BAD_GATEWAY, "DEVICE.BAD_RESPONSE", message),
    }
}

/// 调度错误响应
pub fn schedule_error(err: ScheduleError) -> Response {
    match err {
        ScheduleError::Control(err) => control_error(err),
        ScheduleError::Conflict(message) => {
            error_response(StatusCode::CONFLICT, "SCHEDULE.CONFLICT", message)
        }
        ScheduleError::NotFound(_) => not_found_error(),
        err if err.is_validation() => bad_request_error(err.to_string()),
        err => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL.ERROR",
            err.to_string(),
        ),
    }
}

pub fn link_state_label(state: LinkState) -> &'static str {
    match state {
        LinkState::Closed => "closed",
        LinkState::Opening => "opening",
        LinkState::Open => "open",
        LinkState::Busy => "busy",
        LinkState::Reconnecting => "reconnecting",
    }
}

fn channel_to_dto(channel: &ChannelState) -> ChannelStateDto {
    ChannelStateDto {
        id: channel.id,
        brightness: channel.brightness,
        motion_enabled: channel.motion_enabled,
        manual_override: channel.manual_override,
        timed_schedule_active: channel.timed_schedule_active,
        timed_remaining_seconds: channel.timed_remaining_seconds,
        energy_wh_today: channel.energy_wh_today,
        current_power_w: channel.current_power_w,
    }
}

/// DeviceSnapshot 转 DeviceSnapshotDto
pub fn snapshot_to_dto(device_id: &str, snapshot: &DeviceSnapshot) -> DeviceSnapshotDto {
    DeviceSnapshotDto {
        device_id: device_id.to_string(),
        motion_sensor_enabled: snapshot.motion_sensor_enabled,
        channels: snapshot.channels.iter().map(channel_to_dto).collect(),
        captured_at_ms: snapshot.captured_at_ms,
    }
}

/// DailySchedule 转 DailyScheduleDto
pub fn schedule_to_dto(schedule: DailySchedule, currently_active: bool) -> DailyScheduleDto {
    DailyScheduleDto {
        id: schedule.id,
        device_id: schedule.device_id,
        channel_id: schedule.channel_id,
        on_hour: schedule.on_hour,
        on_minute: schedule.on_minute,
        off_hour: schedule.off_hour,
        off_minute: schedule.off_minute,
        is_active: schedule.is_active,
        last_applied_at_ms: schedule.last_applied_at_ms,
        currently_active,
    }
}

pub fn apply_report_to_dto(report: ApplyReport) -> ApplySchedulesDto {
    ApplySchedulesDto {
        schedules: report.schedules,
        hardware_applied: report.hardware_applied,
        hardware_error: report.hardware_error,
        durable_jobs: report.durable_jobs,
        fallback_jobs: report.fallback_jobs,
    }
}
