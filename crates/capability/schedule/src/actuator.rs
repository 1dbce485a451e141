//! 调度作业落到设备上的动作

use async_trait::async_trait;
use domain::DailySchedule;
use lumo_control::{ControlError, DeviceController};

/// 调度器对设备的最小依赖面
#[async_trait]
pub trait ChannelActuator: Send + Sync {
    /// 主机侧作业到期：手动开或关通道（幂等）
    async fn switch_channel(&self, channel: u8, on: bool) -> Result<(), ControlError>;

    /// 写入控制器 RTC 每日调度
    async fn push_daily_schedule(&self, schedule: &DailySchedule) -> Result<(), ControlError>;

    /// 清除控制器上全部每日调度
    async fn clear_daily_schedules(&self) -> Result<(), ControlError>;

    fn channel_count(&self) -> u8;
}

#[async_trait]
impl ChannelActuator for DeviceController {
    async fn switch_channel(&self, channel: u8, on: bool) -> Result<(), ControlError> {
        if on {
            self.set_channel_manual_on(channel).await?;
        } else {
            self.set_channel_manual_off(channel).await?;
        }
        Ok(())
    }

    async fn push_daily_schedule(&self, schedule: &DailySchedule) -> Result<(), ControlError> {
        self.set_daily_schedule(
            schedule.channel_id,
            schedule.on_hour,
            schedule.on_minute,
            schedule.off_hour,
            schedule.off_minute,
        )
        .await?;
        Ok(())
    }

    async fn clear_daily_schedules(&self) -> Result<(), ControlError> {
        self.clear_all_daily_schedules().await?;
        Ok(())
    }

    fn channel_count(&self) -> u8 {
        DeviceController::channel_count(self)
    }
}
