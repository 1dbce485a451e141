//! 设备状态控制器
//!
//! 唯一发出协议指令的组件。每个改变状态的操作成功后都会无条件重新查询完整状态，
//! 因为手动覆盖等字段只有控制器自己知道；快照整体替换后再交给广播器。

use crate::broadcast::StatusBroadcaster;
use crate::error::ControlError;
use crate::request::ControlRequest;
use domain::{DeviceSnapshot, now_epoch_ms, validate_time};
use lumo_protocol::{CommandLink, ControllerCommand, STATUS_PREFIX, StatusDecoder};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// 定时点亮的最长时长（秒）
pub const MAX_TIMED_ON_SECONDS: u32 = 86_400;

/// 控制器配置
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub device_id: String,
    /// 启动时确定的通道数量，快照长度恒等于该值
    pub channel_count: u8,
    /// 功率字段缺失时推算用的满亮度功率
    pub max_power_w: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_id: "controller-1".to_string(),
            channel_count: 3,
            max_power_w: 5.0,
        }
    }
}

pub struct DeviceController {
    link: Arc<dyn CommandLink>,
    decoder: StatusDecoder,
    snapshot: RwLock<Arc<DeviceSnapshot>>,
    broadcaster: Arc<StatusBroadcaster>,
    config: ControllerConfig,
}

impl DeviceController {
    pub fn new(
        link: Arc<dyn CommandLink>,
        broadcaster: Arc<StatusBroadcaster>,
        config: ControllerConfig,
    ) -> Self {
        let decoder = StatusDecoder::new(config.channel_count, config.max_power_w);
        let initial = Arc::new(DeviceSnapshot::empty(config.channel_count, 0));
        Self {
            link,
            decoder,
            snapshot: RwLock::new(initial),
            broadcaster,
            config,
        }
    }

    /// 当前快照；读方永远拿到完整的一份。
    pub fn snapshot(&self) -> Arc<DeviceSnapshot> {
        self.snapshot
            .read()
            .map(|snapshot| snapshot.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn channel_count(&self) -> u8 {
        self.config.channel_count
    }

    pub fn device_id(&self) -> &str {
        &self.config.device_id
    }

    pub fn broadcaster(&self) -> &Arc<StatusBroadcaster> {
        &self.broadcaster
    }

    pub async fn set_motion_enabled(
        &self,
        enabled: bool,
    ) -> Result<Arc<DeviceSnapshot>, ControlError> {
        let command = if enabled {
            ControllerCommand::EnableMotionSensor
        } else {
            ControllerCommand::DisableMotionSensor
        };
        self.execute(command).await
    }

    pub async fn set_channel_motion_config(
        &self,
        channel: u8,
        enabled: bool,
    ) -> Result<Arc<DeviceSnapshot>, ControlError> {
        self.check_channel(channel)?;
        self.execute(ControllerCommand::SetChannelMotion { channel, enabled })
            .await
    }

    pub async fn set_channel_manual_on(
        &self,
        channel: u8,
    ) -> Result<Arc<DeviceSnapshot>, ControlError> {
        self.check_channel(channel)?;
        self.execute(ControllerCommand::SetChannelManual { channel, on: true })
            .await
    }

    pub async fn set_channel_manual_off(
        &self,
        channel: u8,
    ) -> Result<Arc<DeviceSnapshot>, ControlError> {
        self.check_channel(channel)?;
        self.execute(ControllerCommand::SetChannelManual { channel, on: false })
            .await
    }

    pub async fn set_channel_brightness(
        &self,
        channel: u8,
        brightness: u16,
    ) -> Result<Arc<DeviceSnapshot>, ControlError> {
        self.check_channel(channel)?;
        let brightness =
            u8::try_from(brightness).map_err(|_| ControlError::InvalidBrightness(brightness))?;
        self.execute(ControllerCommand::SetBrightness {
            channel,
            brightness,
        })
        .await
    }

    /// 交还感应逻辑控制
    pub async fn set_channel_auto(&self, channel: u8) -> Result<Arc<DeviceSnapshot>, ControlError> {
        self.check_channel(channel)?;
        self.execute(ControllerCommand::ReleaseToAuto { channel })
            .await
    }

    /// 定时点亮，到期后由控制器自行熄灭并上报 `INFO:`
    pub async fn set_channel_timed_on(
        &self,
        channel: u8,
        seconds: u32,
    ) -> Result<Arc<DeviceSnapshot>, ControlError> {
        self.check_channel(channel)?;
        if seconds == 0 || seconds > MAX_TIMED_ON_SECONDS {
            return Err(ControlError::InvalidDuration(seconds));
        }
        self.execute(ControllerCommand::TimedOn { channel, seconds })
            .await
    }

    /// 写入控制器 RTC 每日调度
    pub async fn set_daily_schedule(
        &self,
        channel: u8,
        on_hour: u8,
        on_minute: u8,
        off_hour: u8,
        off_minute: u8,
    ) -> Result<Arc<DeviceSnapshot>, ControlError> {
        self.check_channel(channel)?;
        validate_time(on_hour, on_minute)?;
        validate_time(off_hour, off_minute)?;
        self.execute(ControllerCommand::SetDailySchedule {
            channel,
            on_hour,
            on_minute,
            off_hour,
            off_minute,
        })
        .await
    }

    pub async fn clear_all_daily_schedules(&self) -> Result<Arc<DeviceSnapshot>, ControlError> {
        self.execute(ControllerCommand::ClearDailySchedules).await
    }

    pub async fn reset_energy(&self) -> Result<Arc<DeviceSnapshot>, ControlError> {
        self.execute(ControllerCommand::ResetEnergy).await
    }

    /// 查询完整状态并替换快照
    pub async fn query_status(&self) -> Result<Arc<DeviceSnapshot>, ControlError> {
        let line = ControllerCommand::QueryStatus.encode()?;
        let reply = self
            .link
            .send(&line, STATUS_PREFIX)
            .await
            .inspect_err(|err| {
                warn!(target: "lumo.control", error = %err, "status_query_failed");
            })?;
        self.apply_status_line(&reply)
    }

    /// 解码一行 `STATUS` 并替换快照（也用于控制器主动推送的状态行）
    pub fn apply_status_line(&self, line: &str) -> Result<Arc<DeviceSnapshot>, ControlError> {
        let snapshot = Arc::new(self.decoder.decode(line, now_epoch_ms())?);
        lumo_telemetry::record_status_decoded();
        match self.snapshot.write() {
            Ok(mut current) => *current = snapshot.clone(),
            Err(poisoned) => *poisoned.into_inner() = snapshot.clone(),
        }
        self.broadcaster.publish(snapshot.clone());
        Ok(snapshot)
    }

    /// 执行一条控制请求
    pub async fn handle_request(
        &self,
        request: ControlRequest,
    ) -> Result<Arc<DeviceSnapshot>, ControlError> {
        debug!(target: "lumo.control", request = ?request, "control_request_received");
        match request {
            ControlRequest::SetMotionSensor { enabled } => self.set_motion_enabled(enabled).await,
            ControlRequest::SetChannelMotion { channel, enabled } => {
                self.set_channel_motion_config(channel, enabled).await
            }
            ControlRequest::ManualOn { channel } => self.set_channel_manual_on(channel).await,
            ControlRequest::ManualOff { channel } => self.set_channel_manual_off(channel).await,
            ControlRequest::SetBrightness {
                channel,
                brightness,
            } => self.set_channel_brightness(channel, brightness).await,
            ControlRequest::Auto { channel } => self.set_channel_auto(channel).await,
            ControlRequest::TimedOn { channel, seconds } => {
                self.set_channel_timed_on(channel, seconds).await
            }
            ControlRequest::SetDailySchedule {
                channel,
                on_hour,
                on_minute,
                off_hour,
                off_minute,
            } => {
                self.set_daily_schedule(channel, on_hour, on_minute, off_hour, off_minute)
                    .await
            }
            ControlRequest::ClearDailySchedules => self.clear_all_daily_schedules().await,
            ControlRequest::ResetEnergy => self.reset_energy().await,
            ControlRequest::QueryStatus => self.query_status().await,
        }
    }

    fn check_channel(&self, channel: u8) -> Result<(), ControlError> {
        if channel < self.config.channel_count {
            Ok(())
        } else {
            Err(ControlError::InvalidChannel(channel))
        }
    }

    async fn execute(
        &self,
        command: ControllerCommand,
    ) -> Result<Arc<DeviceSnapshot>, ControlError> {
        let line = command.encode()?;
        let reply = self
            .link
            .send(&line, command.expected_response_prefix())
            .await
            .inspect_err(|err| {
                warn!(target: "lumo.control", command = %line, error = %err, "command_failed");
            })?;
        info!(target: "lumo.control", command = %line, reply = %reply, "command_acknowledged");
        if command.is_state_changing() {
            self.query_status().await
        } else {
            self.apply_status_line(&reply)
        }
    }
}
