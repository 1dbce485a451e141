//! # 设备控制能力模块
//!
//! - [`DeviceController`]：唯一发出协议指令的组件，维护最新快照
//! - [`StatusBroadcaster`]：把快照扇出给订阅者，单个观察者的失败不影响其他
//! - [`ControlRequest`]：观察者发起的控制请求，经 `DeviceController::handle_request` 执行
//! - [`spawn_line_watcher`]：处理控制器主动上报（`INFO:` 触发重新查询）

mod broadcast;
mod controller;
mod error;
mod request;
mod watcher;

pub use broadcast::{ObserverError, ObserverId, StatusBroadcaster, StatusObserver};
pub use controller::{ControllerConfig, DeviceController, MAX_TIMED_ON_SECONDS};
pub use error::ControlError;
pub use request::ControlRequest;
pub use watcher::spawn_line_watcher;
