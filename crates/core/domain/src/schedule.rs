//! 每日开关调度模型。
//!
//! `DailySchedule` 由外部应用持久化；`ScheduledJob` 是从调度派生的临时触发作业，
//! 每次创建、更新、重新下发调度时重新计算，不单独持久化。

use std::fmt;

/// 时间字段校验错误。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeValidationError {
    pub field: &'static str,
    pub value: u8,
}

impl fmt::Display for TimeValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} out of range: {}", self.field, self.value)
    }
}

impl std::error::Error for TimeValidationError {}

/// 校验小时（0-23）与分钟（0-59）。
pub fn validate_time(hour: u8, minute: u8) -> Result<(), TimeValidationError> {
    if hour > 23 {
        return Err(TimeValidationError {
            field: "hour",
            value: hour,
        });
    }
    if minute > 59 {
        return Err(TimeValidationError {
            field: "minute",
            value: minute,
        });
    }
    Ok(())
}

/// 判断一天中的某分钟是否落在开关窗口内（均为当日分钟数）。
///
/// - `on == off`：窗口为空，始终关闭
/// - `on < off`：窗口为 `[on, off)`
/// - `on > off`：窗口跨零点，除 `[off, on)` 外均处于开启
pub fn time_is_between(now_minute: u16, on_minute: u16, off_minute: u16) -> bool {
    if on_minute == off_minute {
        return false;
    }
    if on_minute < off_minute {
        now_minute >= on_minute && now_minute < off_minute
    } else {
        now_minute >= on_minute || now_minute < off_minute
    }
}

/// 调度边沿：开或关。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduleEdge {
    On,
    Off,
}

impl ScheduleEdge {
    pub const BOTH: [ScheduleEdge; 2] = [ScheduleEdge::On, ScheduleEdge::Off];

    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleEdge::On => "on",
            ScheduleEdge::Off => "off",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "on" => Some(ScheduleEdge::On),
            "off" => Some(ScheduleEdge::Off),
            _ => None,
        }
    }

    /// 触发时通道应切换到的开关状态。
    pub fn switches_on(self) -> bool {
        matches!(self, ScheduleEdge::On)
    }
}

/// 持久化的每日开关调度。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySchedule {
    pub id: i64,
    pub device_id: String,
    pub channel_id: u8,
    pub on_hour: u8,
    pub on_minute: u8,
    pub off_hour: u8,
    pub off_minute: u8,
    pub is_active: bool,
    pub last_applied_at_ms: Option<i64>,
}

impl DailySchedule {
    /// 边沿对应的墙钟时间（小时, 分钟）。
    pub fn edge_time(&self, edge: ScheduleEdge) -> (u8, u8) {
        match edge {
            ScheduleEdge::On => (self.on_hour, self.on_minute),
            ScheduleEdge::Off => (self.off_hour, self.off_minute),
        }
    }

    pub fn job_id(&self, edge: ScheduleEdge) -> String {
        ScheduledJob::job_id_for(self.channel_id, edge, self.id)
    }

    /// 给定墙钟时间时通道是否应处于点亮窗口内。
    pub fn is_active_at(&self, hour: u8, minute: u8) -> bool {
        let now = hour as u16 * 60 + minute as u16;
        let on = self.on_hour as u16 * 60 + self.on_minute as u16;
        let off = self.off_hour as u16 * 60 + self.off_minute as u16;
        time_is_between(now, on, off)
    }

    pub fn validate(&self) -> Result<(), TimeValidationError> {
        validate_time(self.on_hour, self.on_minute)?;
        validate_time(self.off_hour, self.off_minute)
    }
}

/// 新建调度请求。
#[derive(Debug, Clone)]
pub struct NewDailySchedule {
    pub device_id: String,
    pub channel_id: u8,
    pub on_hour: u8,
    pub on_minute: u8,
    pub off_hour: u8,
    pub off_minute: u8,
    pub is_active: bool,
}

impl NewDailySchedule {
    pub fn validate(&self) -> Result<(), TimeValidationError> {
        validate_time(self.on_hour, self.on_minute)?;
        validate_time(self.off_hour, self.off_minute)
    }
}

/// 调度更新（未设置的字段保持原值）。
#[derive(Debug, Clone, Default)]
pub struct DailyScheduleUpdate {
    pub on_hour: Option<u8>,
    pub on_minute: Option<u8>,
    pub off_hour: Option<u8>,
    pub off_minute: Option<u8>,
    pub is_active: Option<bool>,
}

impl DailyScheduleUpdate {
    /// 合并到已有调度，返回合并后的副本。
    pub fn apply_to(&self, schedule: &DailySchedule) -> DailySchedule {
        DailySchedule {
            on_hour: self.on_hour.unwrap_or(schedule.on_hour),
            on_minute: self.on_minute.unwrap_or(schedule.on_minute),
            off_hour: self.off_hour.unwrap_or(schedule.off_hour),
            off_minute: self.off_minute.unwrap_or(schedule.off_minute),
            is_active: self.is_active.unwrap_or(schedule.is_active),
            ..schedule.clone()
        }
    }
}

/// 派生的单次触发作业。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    /// `<channelId>-<edge>-<scheduleId>`，同 ID 的作业只允许存在一个
    pub job_id: String,
    pub schedule_id: i64,
    pub channel_id: u8,
    pub edge: ScheduleEdge,
    pub due_at_ms: i64,
}

impl ScheduledJob {
    pub fn new(schedule: &DailySchedule, edge: ScheduleEdge, due_at_ms: i64) -> Self {
        Self {
            job_id: schedule.job_id(edge),
            schedule_id: schedule.id,
            channel_id: schedule.channel_id,
            edge,
            due_at_ms,
        }
    }

    pub fn job_id_for(channel_id: u8, edge: ScheduleEdge, schedule_id: i64) -> String {
        format!("{}-{}-{}", channel_id, edge.as_str(), schedule_id)
    }
}
