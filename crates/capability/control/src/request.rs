//! 观察者发起的控制请求
//!
//! JSON 形如 `{"action":"set_brightness","channel":1,"brightness":200}`。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ControlRequest {
    SetMotionSensor {
        enabled: bool,
    },
    SetChannelMotion {
        channel: u8,
        enabled: bool,
    },
    ManualOn {
        channel: u8,
    },
    ManualOff {
        channel: u8,
    },
    SetBrightness {
        channel: u8,
        brightness: u16,
    },
    Auto {
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
    QueryStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_requests() {
        let request: ControlRequest =
            serde_json::from_str(r#"{"action":"set_brightness","channel":1,"brightness":200}"#)
                .expect("parse");
        assert_eq!(
            request,
            ControlRequest::SetBrightness {
                channel: 1,
                brightness: 200
            }
        );

        let request: ControlRequest = serde_json::from_str(
            r#"{"action":"set_daily_schedule","channel":2,"onHour":8,"onMinute":0,"offHour":20,"offMinute":30}"#,
        )
        .expect("parse");
        assert!(matches!(
            request,
            ControlRequest::SetDailySchedule {
                channel: 2,
                off_minute: 30,
                ..
            }
        ));

        let request: ControlRequest =
            serde_json::from_str(r#"{"action":"clear_daily_schedules"}"#).expect("parse");
        assert_eq!(request, ControlRequest::ClearDailySchedules);
    }

    #[test]
    fn rejects_unknown_action() {
        assert!(serde_json::from_str::<ControlRequest>(r#"{"action":"explode"}"#).is_err());
    }
}
