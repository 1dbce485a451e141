//! 状态广播
//!
//! 每个观察者拥有独立的投递任务和一个只保留最新值的 `watch` 通道：
//! 慢观察者只会错过中间快照，不会拖慢其他观察者，也不会让发布方等待。

use async_trait::async_trait;
use domain::DeviceSnapshot;
use lumo_telemetry::{record_observer_delivery_failure, record_snapshot_published};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// 观察者投递错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObserverError {
    /// 观察者已离开，广播器会将其移除
    #[error("observer disconnected")]
    Disconnected,
    #[error("observer failed: {0}")]
    Failed(String),
}

/// 快照观察者
#[async_trait]
pub trait StatusObserver: Send + Sync {
    async fn on_snapshot(&self, snapshot: Arc<DeviceSnapshot>) -> Result<(), ObserverError>;
}

/// 通道观察者：接收端关闭即视为离开。
#[async_trait]
impl StatusObserver for mpsc::Sender<Arc<DeviceSnapshot>> {
    async fn on_snapshot(&self, snapshot: Arc<DeviceSnapshot>) -> Result<(), ObserverError> {
        self.send(snapshot)
            .await
            .map_err(|_| ObserverError::Disconnected)
    }
}

pub type ObserverId = u64;

struct ObserverSlot {
    sender: watch::Sender<Option<Arc<DeviceSnapshot>>>,
}

/// 状态广播器
pub struct StatusBroadcaster {
    latest: RwLock<Option<Arc<DeviceSnapshot>>>,
    observers: Mutex<HashMap<ObserverId, ObserverSlot>>,
    next_id: AtomicU64,
    delivery_timeout: Duration,
}

impl StatusBroadcaster {
    pub fn new(delivery_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            latest: RwLock::new(None),
            observers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            delivery_timeout,
        })
    }

    /// 最近一次发布的快照
    pub fn latest(&self) -> Option<Arc<DeviceSnapshot>> {
        self.latest
            .read()
            .map(|latest| latest.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().map(|map| map.len()).unwrap_or_default()
    }

    /// 订阅；已有快照时立即投递一次。
    ///
    /// 登记与取初值在观察者表的锁内完成，与 `publish` 互斥，不会漏掉并发发布的快照。
    pub fn subscribe(self: &Arc<Self>, observer: Arc<dyn StatusObserver>) -> ObserverId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = watch::channel(None);
        if let Ok(mut map) = self.observers.lock() {
            if let Some(latest) = self.latest() {
                sender.send_replace(Some(latest));
            }
            map.insert(id, ObserverSlot { sender });
        }
        tokio::spawn(deliver(
            id,
            observer,
            receiver,
            self.delivery_timeout,
            Arc::downgrade(self),
        ));
        info!(target: "lumo.broadcast", observer_id = id, "observer_subscribed");
        id
    }

    /// 取消订阅；投递任务在当前投递结束后退出。
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let removed = self
            .observers
            .lock()
            .map(|mut map| map.remove(&id).is_some())
            .unwrap_or(false);
        if removed {
            info!(target: "lumo.broadcast", observer_id = id, "observer_unsubscribed");
        }
        removed
    }

    /// 发布新快照
    pub fn publish(&self, snapshot: Arc<DeviceSnapshot>) {
        let observers = self.observers.lock();
        match self.latest.write() {
            Ok(mut latest) => *latest = Some(snapshot.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(snapshot.clone()),
        }
        let observers = match observers {
            Ok(map) => {
                for slot in map.values() {
                    slot.sender.send_replace(Some(snapshot.clone()));
                }
                map.len()
            }
            Err(_) => 0,
        };
        record_snapshot_published();
        debug!(
            target: "lumo.broadcast",
            observers = observers,
            captured_at_ms = snapshot.captured_at_ms,
            "snapshot_published"
        );
    }

    /// 移除全部观察者
    pub fn close(&self) {
        if let Ok(mut map) = self.observers.lock() {
            map.clear();
        }
    }
}

async fn deliver(
    id: ObserverId,
    observer: Arc<dyn StatusObserver>,
    mut receiver: watch::Receiver<Option<Arc<DeviceSnapshot>>>,
    delivery_timeout: Duration,
    broadcaster: Weak<StatusBroadcaster>,
) {
    while receiver.changed().await.is_ok() {
        let Some(snapshot) = receiver.borrow_and_update().clone() else {
            continue;
        };
        match tokio::time::timeout(delivery_timeout, observer.on_snapshot(snapshot)).await {
            Ok(Ok(())) => {}
            Ok(Err(ObserverError::Disconnected)) => {
                if let Some(broadcaster) = broadcaster.upgrade() {
                    broadcaster.unsubscribe(id);
                }
                return;
            }
            Ok(Err(err)) => {
                record_observer_delivery_failure();
                warn!(
                    target: "lumo.broadcast",
                    observer_id = id,
                    error = %err,
                    "observer_delivery_failed"
                );
            }
            Err(_) => {
                record_observer_delivery_failure();
                warn!(
                    target: "lumo.broadcast",
                    observer_id = id,
                    timeout_ms = delivery_timeout.as_millis() as u64,
                    "observer_delivery_timeout"
                );
            }
        }
    }
}
