//! 每日调度 handlers
//!
//! - GET /api/schedules
//! - POST /api/schedules
//! - PUT /api/schedules/{id}
//! - DELETE /api/schedules/{id}
//! - POST /api/schedules/apply

use crate::AppState;
use crate::utils::response::{apply_report_to_dto, schedule_error, schedule_to_dto};
use api_contract::{
    ApiResponse, CreateDailyScheduleRequest, DailyScheduleDto, UpdateDailyScheduleRequest,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::{DailySchedule, DailyScheduleUpdate, NewDailySchedule};

#[derive(serde::Deserialize)]
pub struct SchedulePath {
    schedule_id: i64,
}

fn to_dto(state: &AppState, schedule: DailySchedule) -> DailyScheduleDto {
    let currently_active = state.executor.is_currently_active(&schedule);
    schedule_to_dto(schedule, currently_active)
}

pub async fn list_schedules(State(state): State<AppState>) -> Response {
    match state.executor.list_schedules().await {
        Ok(items) => {
            let data: Vec<DailyScheduleDto> = items
                .into_iter()
                .map(|schedule| to_dto(&state, schedule))
                .collect();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => schedule_error(err),
    }
}

pub async fn create_schedule(
    State(state): State<AppState>,
    Json(req): Json<CreateDailyScheduleRequest>,
) -> Response {
    let schedule = NewDailySchedule {
        device_id: state.executor.device_id().to_string(),
        channel_id: req.channel_id,
        on_hour: req.on_hour,
        on_minute: req.on_minute,
        off_hour: req.off_hour,
        off_minute: req.off_minute,
        is_active: req.is_active.unwrap_or(true),
    };
    match state.executor.create_schedule(schedule).await {
        Ok(created) => (
            StatusCode::OK,
            Json(ApiResponse::success(to_dto(&state, created))),
        )
            .into_response(),
        Err(err) => schedule_error(err),
    }
}

pub async fn update_schedule(
    State(state): State<AppState>,
    Path(path): Path<SchedulePath>,
    Json(req): Json<UpdateDailyScheduleRequest>,
) -> Response {
    let update = DailyScheduleUpdate {
        on_hour: req.on_hour,
        on_minute: req.on_minute,
        off_hour: req.off_hour,
        off_minute: req.off_minute,
        is_active: req.is_active,
    };
    match state.executor.update_schedule(path.schedule_id, update).await {
        Ok(updated) => (
            StatusCode::OK,
            Json(ApiResponse::success(to_dto(&state, updated))),
        )
            .into_response(),
        Err(err) => schedule_error(err),
    }
}

pub async fn delete_schedule(
    State(state): State<AppState>,
    Path(path): Path<SchedulePath>,
) -> Response {
    match state.executor.delete_schedule(path.schedule_id).await {
        Ok(_) => (StatusCode::OK, Json(ApiResponse::success(()))).into_response(),
        Err(err) => schedule_error(err),
    }
}

/// 清空控制器调度后重新下发全部启用调度
pub async fn apply_schedules(State(state): State<AppState>) -> Response {
    match state.executor.apply_all_schedules().await {
        Ok(report) => (
            StatusCode::OK,
            Json(ApiResponse::success(apply_report_to_dto(report))),
        )
            .into_response(),
        Err(err) => schedule_error(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{TestApp, read_json};

    fn create_request(channel_id: u8, on_hour: u8) -> CreateDailyScheduleRequest {
        CreateDailyScheduleRequest {
            channel_id,
            on_hour,
            on_minute: 0,
            off_hour: 20,
            off_minute: 30,
            is_active: None,
        }
    }

    #[tokio::test]
    async fn create_pushes_to_controller_and_lists() {
        let app = TestApp::new();
        let response = create_schedule(State(app.state()), Json(create_request(2, 8))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["data"]["channelId"], 2);
        assert_eq!(body["data"]["isActive"], true);
        assert!(body["data"]["currentlyActive"].is_boolean());
        assert!(app.link.sent().contains(&"T208002030".to_string()));

        let response = list_schedules(State(app.state())).await;
        let body = read_json(response).await;
        assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
        assert!(body["data"][0]["lastAppliedAtMs"].is_number());
    }

    #[tokio::test]
    async fn invalid_time_and_conflict_are_rejected() {
        let app = TestApp::new();
        let response = create_schedule(State(app.state()), Json(create_request(1, 24))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = create_schedule(State(app.state()), Json(create_request(1, 8))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = create_schedule(State(app.state()), Json(create_request(1, 9))).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn update_and_delete_by_id() {
        let app = TestApp::new();
        let response = create_schedule(State(app.state()), Json(create_request(0, 7))).await;
        let id = read_json(response).await["data"]["id"]
            .as_i64()
            .expect("id");

        let response = update_schedule(
            State(app.state()),
            Path(SchedulePath { schedule_id: id }),
            Json(UpdateDailyScheduleRequest {
                is_active: Some(false),
                ..Default::default()
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["data"]["isActive"], false);
        assert_eq!(body["data"]["currentlyActive"], false);

        let response =
            delete_schedule(State(app.state()), Path(SchedulePath { schedule_id: id })).await;
        assert_eq!(response.status(), StatusCode::OK);
        let response =
            delete_schedule(State(app.state()), Path(SchedulePath { schedule_id: id })).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn apply_reports_hardware_and_fallback_jobs() {
        let app = TestApp::new();
        create_schedule(State(app.state()), Json(create_request(0, 6))).await;
        create_schedule(State(app.state()), Json(create_request(1, 7))).await;

        let response = apply_schedules(State(app.state())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["data"]["schedules"], 2);
        assert_eq!(body["data"]["hardwareApplied"], 2);
        assert_eq!(body["data"]["fallbackJobs"], 4);
        assert_eq!(body["data"]["durableJobs"], 0);
    }
}
