//! 控制请求 handler
//!
//! - POST /api/control

use crate::AppState;
use crate::utils::response::{control_error, snapshot_to_dto};
use api_contract::ApiResponse;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lumo_control::ControlRequest;

/// 转发控制请求，返回执行后重新查询得到的快照
pub async fn post_control(
    State(state): State<AppState>,
    Json(request): Json<ControlRequest>,
) -> Response {
    match state.controller.handle_request(request).await {
        Ok(snapshot) => {
            let dto = snapshot_to_dto(state.controller.device_id(), &snapshot);
            (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
        }
        Err(err) => control_error(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{TestApp, read_json};
    use lumo_protocol::LinkError;

    fn request(json: &str) -> ControlRequest {
        serde_json::from_str(json).expect("request")
    }

    #[tokio::test]
    async fn manual_on_sends_command_then_requeries() {
        let app = TestApp::new();
        app.link.set_status("STATUS;PIR:0;LM1:1;B1:255;");
        let response = post_control(
            State(app.state()),
            Json(request(r#"{"action":"manual_on","channel":1}"#)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(app.link.sent(), vec!["S11".to_string(), "Q".to_string()]);
        let body = read_json(response).await;
        assert_eq!(body["data"]["channels"][1]["manualOverride"], true);
    }

    #[tokio::test]
    async fn invalid_channel_is_bad_request_without_io() {
        let app = TestApp::new();
        let response = post_control(
            State(app.state()),
            Json(request(r#"{"action":"set_brightness","channel":7,"brightness":10}"#)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(app.link.sent().is_empty());
    }

    #[tokio::test]
    async fn rejected_command_is_bad_gateway() {
        let app = TestApp::new();
        app.link
            .fail_with(Some(LinkError::Rejected("ERR: busy".to_string())));
        let response = post_control(
            State(app.state()),
            Json(request(r#"{"action":"reset_energy"}"#)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = read_json(response).await;
        assert_eq!(body["error"]["code"], "DEVICE.REJECTED");
    }
}
