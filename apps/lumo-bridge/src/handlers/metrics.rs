//! Telemetry 指标快照。
//!
//! - GET /api/metrics

use crate::AppState;
use api_contract::{ApiResponse, MetricsSnapshotDto};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lumo_telemetry::metrics;

pub async fn get_metrics(State(state): State<AppState>) -> Response {
    let snapshot = metrics().snapshot();
    (
        StatusCode::OK,
        Json(ApiResponse::success(MetricsSnapshotDto {
            commands_sent: snapshot.commands_sent,
            command_failures: snapshot.command_failures,
            command_timeouts: snapshot.command_timeouts,
            link_reconnects: snapshot.link_reconnects,
            unsolicited_lines: snapshot.unsolicited_lines,
            status_decoded: snapshot.status_decoded,
            snapshots_published: snapshot.snapshots_published,
            observer_delivery_failures: snapshot.observer_delivery_failures,
            jobs_enqueued_durable: snapshot.jobs_enqueued_durable,
            jobs_enqueued_fallback: snapshot.jobs_enqueued_fallback,
            queue_failures: snapshot.queue_failures,
            jobs_fired: snapshot.jobs_fired,
            hardware_schedules_applied: snapshot.hardware_schedules_applied,
            observers: state.controller.broadcaster().observer_count(),
        })),
    )
        .into_response()
}
