use async_trait::async_trait;
use domain::DeviceSnapshot;
use lumo_control::{
    ControlError, ControlRequest, ControllerConfig, DeviceController, StatusBroadcaster,
};
use lumo_protocol::{CommandLink, LinkError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// 记录发出的指令；`STATUS` 查询返回预置状态行，其余回 `ACK`。
struct FakeLink {
    sent: Mutex<Vec<String>>,
    status: Mutex<String>,
    failure: Mutex<Option<LinkError>>,
}

impl FakeLink {
    fn new(status: &str) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            status: Mutex::new(status.to_string()),
            failure: Mutex::new(None),
        })
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("lock").clone()
    }

    fn fail_with(&self, err: Option<LinkError>) {
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

fn controller(link: Arc<FakeLink>) -> DeviceController {
    DeviceController::new(
        link,
        StatusBroadcaster::new(Duration::from_millis(200)),
        ControllerConfig::default(),
    )
}

async fn next_snapshot(rx: &mut mpsc::Receiver<Arc<DeviceSnapshot>>) -> Arc<DeviceSnapshot> {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("delivery")
        .expect("open")
}

#[tokio::test]
async fn validation_happens_before_any_io() {
    let link = FakeLink::new("STATUS;");
    let controller = controller(link.clone());

    assert_eq!(
        controller.set_channel_manual_on(3).await.unwrap_err(),
        ControlError::InvalidChannel(3)
    );
    assert_eq!(
        controller.set_channel_brightness(0, 256).await.unwrap_err(),
        ControlError::InvalidBrightness(256)
    );
    assert_eq!(
        controller.set_channel_timed_on(0, 0).await.unwrap_err(),
        ControlError::InvalidDuration(0)
    );
    let err = controller
        .set_daily_schedule(1, 24, 0, 7, 30)
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::InvalidTime(_)));
    assert!(err.is_validation());
    assert!(link.sent().is_empty());
}

#[tokio::test]
async fn state_change_is_followed_by_status_query() {
    let link = FakeLink::new("STATUS;PIR:1;LM1:1;B1:255;");
    let controller = controller(link.clone());

    let snapshot = controller.set_channel_manual_on(1).await.expect("manual on");
    assert_eq!(link.sent(), vec!["S11".to_string(), "Q".to_string()]);
    let channel = snapshot.channel(1).expect("channel");
    assert!(channel.manual_override);
    assert_eq!(channel.brightness, 255);
    assert!(snapshot.motion_sensor_enabled);
    assert_eq!(snapshot.channels.len(), 3);
    assert!(Arc::ptr_eq(&snapshot, &controller.snapshot()));
}

#[tokio::test]
async fn every_operation_emits_its_wire_form() {
    let link = FakeLink::new("STATUS;PIR:0;");
    let controller = controller(link.clone());

    controller.set_motion_enabled(true).await.expect("E");
    controller.set_channel_motion_config(2, true).await.expect("C");
    controller.set_channel_manual_off(0).await.expect("S");
    controller.set_channel_brightness(1, 128).await.expect("B");
    controller.set_channel_auto(1).await.expect("A");
    controller.set_channel_timed_on(2, 30).await.expect("T");
    controller.set_daily_schedule(1, 5, 30, 7, 30).await.expect("T");
    controller.clear_all_daily_schedules().await.expect("C");
    controller.reset_energy().await.expect("R");

    let commands: Vec<String> = link
        .sent()
        .into_iter()
        .filter(|line| line != "Q")
        .collect();
    assert_eq!(
        commands,
        vec!["E", "C21", "S00", "B1:128", "A1", "T2:30", "T105300730", "C", "R"]
    );
}

#[tokio::test]
async fn failed_command_leaves_snapshot_unchanged() {
    let link = FakeLink::new("STATUS;PIR:1;B0:40;");
    let controller = controller(link.clone());
    let before = controller.query_status().await.expect("query");

    link.fail_with(Some(LinkError::CommandTimeout("B0:200".to_string())));
    let err = controller.set_channel_brightness(0, 200).await.unwrap_err();
    assert_eq!(
        err,
        ControlError::Link(LinkError::CommandTimeout("B0:200".to_string()))
    );
    assert!(Arc::ptr_eq(&before, &controller.snapshot()));
    // 本层不自动重试
    assert_eq!(link.sent(), vec!["Q".to_string(), "B0:200".to_string()]);
}

#[tokio::test]
async fn turning_on_an_already_on_channel_still_broadcasts() {
    let link = FakeLink::new("STATUS;PIR:1;LM0:1;B0:255;");
    let controller = controller(link.clone());
    let (tx, mut rx) = mpsc::channel(8);
    controller.broadcaster().subscribe(Arc::new(tx));

    controller.set_channel_manual_on(0).await.expect("first");
    let first = next_snapshot(&mut rx).await;
    controller.set_channel_manual_on(0).await.expect("second");
    let second = next_snapshot(&mut rx).await;

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.channels, second.channels);
}

#[tokio::test]
async fn handle_request_dispatches_to_operation() {
    let link = FakeLink::new("STATUS;PIR:1;B2:200;");
    let controller = controller(link.clone());

    let snapshot = controller
        .handle_request(ControlRequest::SetBrightness {
            channel: 2,
            brightness: 200,
        })
        .await
        .expect("request");
    assert_eq!(snapshot.channel(2).map(|c| c.brightness), Some(200));
    assert_eq!(link.sent(), vec!["B2:200".to_string(), "Q".to_string()]);

    let err = controller
        .handle_request(ControlRequest::ManualOn { channel: 9 })
        .await
        .unwrap_err();
    assert_eq!(err, ControlError::InvalidChannel(9));
}
