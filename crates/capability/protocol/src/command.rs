//! 控制指令编码
//!
//! 控制器固件的指令格式是固定的 ASCII 行：
//!
//! ```text
//! E / D                      开启 / 关闭人体感应
//! Q                          查询完整状态
//! C<id><0|1>                 通道感应配置（3 字符）
//! S<id><0|1>                 手动常开 / 常关
//! B<id>:<0-255>              设置亮度
//! A<id>                      交还自动（感应）模式
//! T<id>:<seconds>            定时点亮 N 秒
//! T<id><HH><MM><HH><MM>      设置每日调度（10 字符，无冒号）
//! C                          清除全部每日调度（1 字符）
//! R                          能耗计数清零
//! ```
//!
//! `C` 按长度区分两种含义，这里用枚举变体在编码时决定，不从字符串形状反推。

use crate::error::CodecError;

/// 单个数字可表示的通道数量上限
pub const MAX_WIRE_CHANNELS: u8 = 10;

/// 状态应答前缀
pub const STATUS_PREFIX: &str = "STATUS";

/// 控制类指令的确认前缀
pub const ACK_PREFIX: &str = "ACK";

/// 控制器指令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerCommand {
    EnableMotionSensor,
    DisableMotionSensor,
    QueryStatus,
    SetChannelMotion {
        channel: u8,
        enabled: bool,
    },
    SetChannelManual {
        channel: u8,
        on: bool,
    },
    SetBrightness {
        channel: u8,
        brightness: u8,
    },
    ReleaseToAuto {
        channel: u8,
    },
    TimedOn {
        channel: u8,
        seconds: u32,
    },
    SetDailySchedule {
        channel: u8,
        on_hour: u8,
        on_minute: u8,
        off_hour: u8,
        off_minute: u8,
    },
    ClearDailySchedules,
    ResetEnergy,
}

impl ControllerCommand {
    /// 编码为不含换行符的指令行
    pub fn encode(&self) -> Result<String, CodecError> {
        let line = match *self {
            ControllerCommand::EnableMotionSensor => "E".to_string(),
            ControllerCommand::DisableMotionSensor => "D".to_string(),
            ControllerCommand::QueryStatus => "Q".to_string(),
            ControllerCommand::SetChannelMotion { channel, enabled } => {
                format!("C{}{}", wire_channel(channel)?, flag(enabled))
            }
            ControllerCommand::SetChannelManual { channel, on } => {
                format!("S{}{}", wire_channel(channel)?, flag(on))
            }
            ControllerCommand::SetBrightness {
                channel,
                brightness,
            } => format!("B{}:{}", wire_channel(channel)?, brightness),
            ControllerCommand::ReleaseToAuto { channel } => format!("A{}", wire_channel(channel)?),
            ControllerCommand::TimedOn { channel, seconds } => {
                format!("T{}:{}", wire_channel(channel)?, seconds)
            }
            ControllerCommand::SetDailySchedule {
                channel,
                on_hour,
                on_minute,
                off_hour,
                off_minute,
            } => format!(
                "T{}{:02}{:02}{:02}{:02}",
                wire_channel(channel)?,
                on_hour,
                on_minute,
                off_hour,
                off_minute
            ),
            ControllerCommand::ClearDailySchedules => "C".to_string(),
            ControllerCommand::ResetEnergy => "R".to_string(),
        };
        Ok(line)
    }

    /// 该指令期望的应答前缀
    pub fn expected_response_prefix(&self) -> &'static str {
        match self {
            ControllerCommand::QueryStatus => STATUS_PREFIX,
            _ => ACK_PREFIX,
        }
    }

    /// 是否改变控制器状态（执行后需要重新查询状态）
    pub fn is_state_changing(&self) -> bool {
        !matches!(self, ControllerCommand::QueryStatus)
    }
}

fn wire_channel(channel: u8) -> Result<u8, CodecError> {
    if channel >= MAX_WIRE_CHANNELS {
        return Err(CodecError::ChannelNotEncodable(channel));
    }
    Ok(channel)
}

fn flag(value: bool) -> char {
    if value { '1' } else { '0' }
}
