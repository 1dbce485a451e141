//! 路由定义
//!
//! - 健康检查：/health
//! - 设备状态：/api/status, /api/status/refresh, /api/status/stream (SSE)
//! - 控制请求：/api/control
//! - 每日调度：/api/schedules/*
//! - 指标：/api/metrics

use super::AppState;
use super::handlers::*;
use axum::{
    Router,
    routing::{get, post, put},
};

/// 创建 API 路由
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(get_status))
        .route("/api/status/refresh", post(refresh_status))
        .route("/api/status/stream", get(stream_status))
        .route("/api/control", post(post_control))
        .route("/api/schedules", get(list_schedules).post(create_schedule))
        .route("/api/schedules/apply", post(apply_schedules))
        .route(
            "/api/schedules/:schedule_id",
            put(update_schedule).delete(delete_schedule),
        )
        .route("/api/metrics", get(get_metrics))
}
