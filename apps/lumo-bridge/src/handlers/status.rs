//! 设备状态 handlers
//!
//! - GET /health
//! - GET /api/status
//! - POST /api/status/refresh
//! - GET /api/status/stream

use crate::AppState;
use crate::utils::response::{control_error, link_state_label, snapshot_to_dto};
use api_contract::{ApiResponse, HealthDto};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use domain::DeviceSnapshot;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

/// SSE 观察者的缓冲；慢客户端只会错过中间快照
const STREAM_BUFFER: usize = 8;

pub async fn health(State(state): State<AppState>) -> Response {
    let link = *state.link_state.borrow();
    let dto = HealthDto {
        ok: true,
        device_id: state.controller.device_id().to_string(),
        link: link_state_label(link).to_string(),
    };
    (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
}

/// 返回最近一次解码的快照，不触发设备通信
pub async fn get_status(State(state): State<AppState>) -> Response {
    let snapshot = state.controller.snapshot();
    let dto = snapshot_to_dto(state.controller.device_id(), &snapshot);
    (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
}

pub async fn refresh_status(State(state): State<AppState>) -> Response {
    match state.controller.query_status().await {
        Ok(snapshot) => {
            let dto = snapshot_to_dto(state.controller.device_id(), &snapshot);
            (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
        }
        Err(err) => control_error(err),
    }
}

/// 快照推送；首个事件为当前最新快照，客户端断开后观察者自动移除
pub async fn stream_status(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let (tx, rx) = mpsc::channel::<Arc<DeviceSnapshot>>(STREAM_BUFFER);
    let observer_id = state.controller.broadcaster().subscribe(Arc::new(tx));
    info!(target: "lumo.bridge", observer_id = observer_id, "status_stream_opened");
    let device_id = state.controller.device_id().to_string();
    let stream = ReceiverStream::new(rx).map(move |snapshot| {
        Event::default()
            .event("status")
            .json_data(snapshot_to_dto(&device_id, &snapshot))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{TestApp, read_json};

    #[tokio::test]
    async fn health_reports_link_state() {
        let app = TestApp::new();
        let response = health(State(app.state())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["data"]["link"], "open");
        assert_eq!(body["data"]["deviceId"], "controller-1");
    }

    #[tokio::test]
    async fn refresh_replaces_snapshot() {
        let app = TestApp::new();
        app.link.set_status("STATUS;PIR:1;B0:128;");
        let response = refresh_status(State(app.state())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["data"]["motionSensorEnabled"], true);
        assert_eq!(body["data"]["channels"][0]["brightness"], 128);

        let response = get_status(State(app.state())).await;
        let body = read_json(response).await;
        assert_eq!(body["data"]["channels"][0]["brightness"], 128);
        assert_eq!(body["data"]["channels"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn refresh_timeout_maps_to_gateway_timeout() {
        let app = TestApp::new();
        app.link
            .fail_with(Some(lumo_protocol::LinkError::CommandTimeout("Q".to_string())));
        let response = refresh_status(State(app.state())).await;
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
