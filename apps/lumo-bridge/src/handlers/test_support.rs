//! handler 测试用的假链路与应用状态

use crate::AppState;
use async_trait::async_trait;
use axum::response::Response;
use http_body_util::BodyExt;
use lumo_control::{ControllerConfig, DeviceController, StatusBroadcaster};
use lumo_protocol::{CommandLink, LinkError, LinkState};
use lumo_schedule::{ExecutorConfig, ScheduleExecutor, SystemClock};
use lumo_storage::InMemoryDailyScheduleStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

pub struct FakeLink {
    sent: Mutex<Vec<String>>,
    status: Mutex<String>,
    failure: Mutex<Option<LinkError>>,
}

impl FakeLink {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("lock").clone()
    }

    pub fn set_status(&self, status: &str) {
        *self.status.lock().expect("lock") = status.to_string();
    }

    pub fn fail_with(&self, err: Option<LinkError>) {
        *self.failure.lock().expect("lock") = err;
    }
}

#[async_trait]
impl CommandLink for FakeLink {
    async fn send(&self, command_line: &str, expected_prefix: &str) -> Result<String, LinkError> {
        self.sent.lock().expect("lock").push(command_line.to_string());
        if let Some(err) = self.failure.lock().expect("lock").clone() {
            return Err(err);
        }
        if expected_prefix == "STATUS" {
            Ok(self.status.lock().expect("lock").clone())
        } else {
            Ok(format!("ACK: {command_line}"))
        }
    }
}

pub struct TestApp {
    pub link: Arc<FakeLink>,
    pub controller: Arc<DeviceController>,
    pub executor: ScheduleExecutor,
    link_state: watch::Receiver<LinkState>,
    _link_state_tx: watch::Sender<LinkState>,
}

impl TestApp {
    pub fn new() -> Self {
        let link = Arc::new(FakeLink {
            sent: Mutex::new(Vec::new()),
            status: Mutex::new("STATUS;PIR:0;".to_string()),
            failure: Mutex::new(None),
        });
        let controller = Arc::new(DeviceController::new(
            link.clone(),
            StatusBroadcaster::new(Duration::from_millis(200)),
            ControllerConfig::default(),
        ));
        let executor = ScheduleExecutor::new(
            Arc::new(InMemoryDailyScheduleStore::new()),
            None,
            controller.clone(),
            Arc::new(SystemClock),
            ExecutorConfig::default(),
        );
        let (link_state_tx, link_state) = watch::channel(LinkState::Open);
        Self {
            link,
            controller,
            executor,
            link_state,
            _link_state_tx: link_state_tx,
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            controller: self.controller.clone(),
            executor: self.executor.clone(),
            link_state: self.link_state.clone(),
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.executor.shutdown();
    }
}

pub async fn read_json(response: Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json")
}
