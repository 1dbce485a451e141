//! 墙钟与下一触发时刻

use chrono::{DateTime, Days, Local, TimeDelta, TimeZone};

/// 本地墙钟
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// 计算 `now` 之后（含）第一个墙钟时间为 `hour:minute` 的时刻。
///
/// 今天的时刻已过去则取明天。夏令时跳过的时刻顺延一小时，重复的时刻取较早者。
/// 结果与 `now` 相差不超过 25 小时：秋季回拨当天比平时多一小时。
pub fn next_due<Tz: TimeZone>(now: &DateTime<Tz>, hour: u8, minute: u8) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let today = now.date_naive();
    for offset in 0..=1 {
        let date = today.checked_add_days(Days::new(offset))?;
        let naive = date.and_hms_opt(hour as u32, minute as u32, 0)?;
        let resolved = tz.from_local_datetime(&naive).earliest().or_else(|| {
            tz.from_local_datetime(&(naive + TimeDelta::hours(1)))
                .earliest()
        });
        if let Some(candidate) = resolved
            && candidate >= *now
        {
            return Some(candidate);
        }
    }
    None
}

/// 距离到期还有多久（已过期为零）
pub(crate) fn delay_until(due_at_ms: i64, now: &DateTime<Local>) -> std::time::Duration {
    let remaining = due_at_ms.saturating_sub(now.timestamp_millis()).max(0);
    std::time::Duration::from_millis(remaining as u64)
}
