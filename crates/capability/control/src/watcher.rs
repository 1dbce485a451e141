//! 主动上报处理
//!
//! 链路把未匹配挂起请求的行转交到这里：`INFO:` 表示控制器自行改变了状态
//! （例如定时点亮到期），稍作延迟后重新查询；诊断行只记录日志。

use crate::controller::DeviceController;
use lumo_protocol::{ControllerLine, classify_line};
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 启动上报处理任务；控制器释放或发送端关闭后退出。
pub fn spawn_line_watcher(
    controller: Weak<DeviceController>,
    mut lines: mpsc::UnboundedReceiver<String>,
    requery_delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(line) = lines.recv().await {
            if !handle_line(&controller, &line) {
                continue;
            }
            tokio::time::sleep(requery_delay).await;
            // 延迟期间到达的上报合并为一次查询
            while let Ok(line) = lines.try_recv() {
                handle_line(&controller, &line);
            }
            let Some(controller) = controller.upgrade() else {
                return;
            };
            match controller.query_status().await {
                Ok(snapshot) => {
                    debug!(
                        target: "lumo.control",
                        captured_at_ms = snapshot.captured_at_ms,
                        "status_requeried_after_info"
                    );
                }
                Err(err) => {
                    warn!(target: "lumo.control", error = %err, "status_requery_failed");
                }
            }
        }
    })
}

/// 返回是否需要重新查询状态
fn handle_line(controller: &Weak<DeviceController>, line: &str) -> bool {
    match classify_line(line) {
        ControllerLine::Info(message) => {
            info!(target: "lumo.control", message = %message, "controller_info");
            true
        }
        ControllerLine::Status(status) => {
            if let Some(controller) = controller.upgrade()
                && let Err(err) = controller.apply_status_line(&status)
            {
                warn!(target: "lumo.control", error = %err, "unsolicited_status_invalid");
            }
            false
        }
        ControllerLine::Diagnostic(report) => {
            for reading in &report.readings {
                info!(
                    target: "lumo.control",
                    kind = ?report.kind,
                    channel = reading.channel,
                    value = reading.value,
                    secondary = ?reading.secondary,
                    "controller_diagnostic"
                );
            }
            false
        }
        ControllerLine::Error(message) => {
            warn!(target: "lumo.control", message = %message, "controller_error_unsolicited");
            false
        }
        ControllerLine::Ack(message) | ControllerLine::Confirm(message) => {
            debug!(target: "lumo.control", message = %message, "late_acknowledgement");
            false
        }
        ControllerLine::Other(line) => {
            debug!(target: "lumo.control", line = %line, "unrecognized_line");
            false
        }
    }
}
