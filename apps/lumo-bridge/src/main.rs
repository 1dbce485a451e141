//! 灯光控制器桥接服务入口。
//!
//! 启动顺序：配置 → 日志 → 调度表 / 作业队列 → 控制器链路 → 控制器与广播器 →
//! 主动上报处理 → 调度执行器 → HTTP。ctrl-c 时按相反顺序停止。

mod handlers;
mod middleware;
mod routes;
mod utils;

use axum::Router;
use lumo_config::AppConfig;
use lumo_control::{ControllerConfig, DeviceController, StatusBroadcaster, spawn_line_watcher};
use lumo_protocol::{ControllerLink, LinkConnector, LinkState};
use lumo_schedule::{ExecutorConfig, ScheduleError, ScheduleExecutor, SystemClock};
use lumo_storage::{
    DailyScheduleStore, DurableJobQueue, InMemoryDailyScheduleStore, PgDailyScheduleStore,
    RedisJobQueue,
};
use lumo_telemetry::init_tracing;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<DeviceController>,
    pub executor: ScheduleExecutor,
    pub link_state: watch::Receiver<LinkState>,
}

/// 运行中的链路、控制器与调度组件
struct Bridge {
    state: AppState,
    link: Arc<ControllerLink>,
    watcher: JoinHandle<()>,
    worker: Option<JoinHandle<()>>,
}

impl Bridge {
    async fn stop(self) {
        self.state.executor.shutdown();
        if let Some(worker) = self.worker {
            let _ = worker.await;
        }
        self.state.controller.broadcaster().close();
        self.link.close().await;
        self.watcher.abort();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    let store = connect_schedule_store(&config).await?;
    let queue = connect_job_queue(&config)?;
    let connector: Arc<dyn LinkConnector> = Arc::from(config.link_endpoint.connector());
    let bridge = start_bridge(&config, store, queue, connector).await?;
    let app = build_app(bridge.state.clone());

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(
        target: "lumo.bridge",
        http_addr = %config.http_addr,
        device_id = %config.device_id,
        endpoint = %bridge.link.endpoint(),
        "bridge_started"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    bridge.stop().await;
    info!(target: "lumo.bridge", "bridge_stopped");
    Ok(())
}

/// 控制器不可达不阻止启动：链路在后台重连，主机侧调度照常从调度表恢复。
async fn start_bridge(
    config: &AppConfig,
    store: Arc<dyn DailyScheduleStore>,
    queue: Option<Arc<dyn DurableJobQueue>>,
    connector: Arc<dyn LinkConnector>,
) -> Result<Bridge, ScheduleError> {
    // 控制器链路：主动上报经通道交给 line watcher
    let (lines_tx, lines_rx) = mpsc::unbounded_channel::<String>();
    let link = Arc::new(
        ControllerLink::start(connector, config.link.clone(), Arc::new(lines_tx)).await,
    );

    let broadcaster = StatusBroadcaster::new(config.observer_timeout);
    let controller = Arc::new(DeviceController::new(
        link.clone(),
        broadcaster,
        ControllerConfig {
            device_id: config.device_id.clone(),
            channel_count: config.channel_count,
            max_power_w: config.max_power_w,
        },
    ));
    let watcher = spawn_line_watcher(
        Arc::downgrade(&controller),
        lines_rx,
        config.info_requery_delay,
    );
    if let Err(err) = controller.query_status().await {
        warn!(target: "lumo.bridge", error = %err, "initial_status_query_failed");
    }

    let executor = ScheduleExecutor::new(
        store,
        queue,
        controller.clone(),
        Arc::new(SystemClock),
        ExecutorConfig {
            device_id: config.device_id.clone(),
            queue_timeout: config.queue_timeout,
            poll_interval: config.queue_poll_interval,
            ..ExecutorConfig::default()
        },
    );
    // 下发全部调度同时会重建主机侧作业
    if config.apply_on_start {
        executor.apply_all_schedules().await?;
    } else {
        executor.restore_from_store().await?;
    }
    let worker = executor.spawn_queue_worker();

    Ok(Bridge {
        state: AppState {
            controller,
            executor,
            link_state: link.watch_state(),
        },
        link,
        watcher,
        worker,
    })
}

fn build_app(state: AppState) -> Router {
    routes::create_api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // 注入 request_id/trace_id
        .layer(axum::middleware::from_fn(middleware::request_context))
}

/// 配置了数据库则使用 Postgres 调度表，否则退回内存表（重启即丢失）
async fn connect_schedule_store(
    config: &AppConfig,
) -> Result<Arc<dyn DailyScheduleStore>, Box<dyn std::error::Error>> {
    match &config.database_url {
        Some(url) => {
            let store = PgDailyScheduleStore::connect(url).await?;
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
        None => {
            warn!(target: "lumo.bridge", "schedule_store_in_memory");
            Ok(Arc::new(InMemoryDailyScheduleStore::new()))
        }
    }
}

fn connect_job_queue(
    config: &AppConfig,
) -> Result<Option<Arc<dyn DurableJobQueue>>, Box<dyn std::error::Error>> {
    match &config.redis_url {
        Some(url) => {
            let queue = RedisJobQueue::connect(url, &config.redis_namespace)?;
            Ok(Some(Arc::new(queue)))
        }
        None => {
            warn!(target: "lumo.bridge", "durable_queue_disabled");
            Ok(None)
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(target: "lumo.bridge", error = %err, "shutdown_signal_failed");
        std::future::pending::<()>().await;
    }
    info!(target: "lumo.bridge", "shutdown_requested");
}
