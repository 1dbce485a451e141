//! 控制器上行行解码
//!
//! 解码是防御式的：未知字段、越界通道、无法解析的值一律忽略，
//! 固件只会追加字段，旧主机必须能继续工作。

use crate::command::STATUS_PREFIX;
use crate::error::CodecError;
use domain::{ChannelState, DeviceSnapshot};

/// 上行行分类
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerLine {
    Status(String),
    Ack(String),
    Confirm(String),
    Error(String),
    Info(String),
    Diagnostic(DiagnosticReport),
    Other(String),
}

/// 按前缀分类一行上行数据
pub fn classify_line(line: &str) -> ControllerLine {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.starts_with(STATUS_PREFIX) {
        return ControllerLine::Status(line.to_string());
    }
    if let Some(rest) = line.strip_prefix("ACK:") {
        return ControllerLine::Ack(rest.trim().to_string());
    }
    if let Some(rest) = line.strip_prefix("CMD:") {
        return ControllerLine::Confirm(rest.trim().to_string());
    }
    if let Some(rest) = line.strip_prefix("ERR:") {
        return ControllerLine::Error(rest.trim().to_string());
    }
    if let Some(rest) = line.strip_prefix("INFO:") {
        return ControllerLine::Info(rest.trim().to_string());
    }
    if let Some(report) = decode_diagnostic(line) {
        return ControllerLine::Diagnostic(report);
    }
    ControllerLine::Other(line.to_string())
}

/// 是否为错误应答
pub fn is_error_line(line: &str) -> bool {
    line.starts_with("ERR:")
}

/// 是否为控制器主动上报的事件
pub fn is_info_line(line: &str) -> bool {
    line.starts_with("INFO:")
}

/// `STATUS` 行解码器
///
/// 通道数在启动时确定；功率字段缺失时按 `max_power_w * brightness / 255` 推算。
#[derive(Debug, Clone, Copy)]
pub struct StatusDecoder {
    channel_count: u8,
    max_power_w: f64,
}

impl StatusDecoder {
    pub fn new(channel_count: u8, max_power_w: f64) -> Self {
        Self {
            channel_count,
            max_power_w,
        }
    }

    pub fn channel_count(&self) -> u8 {
        self.channel_count
    }

    /// 解码完整状态行为新快照
    pub fn decode(&self, line: &str, captured_at_ms: i64) -> Result<DeviceSnapshot, CodecError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut fields = line.split(';');
        if fields.next() != Some(STATUS_PREFIX) {
            return Err(CodecError::UnexpectedLine(line.to_string()));
        }

        let mut snapshot = DeviceSnapshot::empty(self.channel_count, captured_at_ms);
        let mut power_reported = vec![false; self.channel_count as usize];

        for field in fields {
            let Some((key, value)) = field.split_once(':') else {
                continue;
            };
            let (name, index) = split_key(key.trim());
            let value = value.trim();

            if name == "PIR" && index.is_none() {
                if let Some(flag) = parse_flag(value) {
                    snapshot.motion_sensor_enabled = flag;
                }
                continue;
            }

            let Some(index) = index else { continue };
            let Some(channel) = snapshot.channels.get_mut(index) else {
                continue;
            };
            if apply_channel_field(channel, name, value) && name == "PW" {
                power_reported[index] = true;
            }
        }

        for (channel, reported) in snapshot.channels.iter_mut().zip(power_reported) {
            if !reported {
                channel.current_power_w = self.derived_power_w(channel.brightness);
            }
        }
        Ok(snapshot)
    }

    fn derived_power_w(&self, brightness: u8) -> f64 {
        self.max_power_w * brightness as f64 / 255.0
    }
}

/// 写入单个通道字段，返回是否成功应用
fn apply_channel_field(channel: &mut ChannelState, name: &str, value: &str) -> bool {
    match name {
        "LM" => parse_flag(value).map(|flag| channel.manual_override = flag),
        "MC" => parse_flag(value).map(|flag| channel.motion_enabled = flag),
        "TS" => parse_flag(value).map(|flag| channel.timed_schedule_active = flag),
        "TR" => value
            .parse::<u32>()
            .ok()
            .map(|seconds| channel.timed_remaining_seconds = seconds),
        "B" => value
            .parse::<u16>()
            .ok()
            .map(|brightness| channel.brightness = brightness.min(255) as u8),
        "EN" => parse_number(value).map(|wh| channel.energy_wh_today = wh),
        "PW" => parse_number(value).map(|watts| channel.current_power_w = watts),
        _ => None,
    }
    .is_some()
}

/// 拆分 `LM0` 为 (`LM`, Some(0))；无数字后缀时索引为 None
fn split_key(key: &str) -> (&str, Option<usize>) {
    let digits_at = key
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(key.len());
    let (name, digits) = key.split_at(digits_at);
    if digits.is_empty() {
        return (name, None);
    }
    (name, digits.parse::<usize>().ok())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|number| number.is_finite())
}

/// 诊断上报类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// `POWER;LED<i>:<W>W;`
    Power,
    /// `USAGE;LED<i>:<ms>;`
    Usage,
    /// `ENERGY;LED<i>:<J>J(<Wh>Wh);`
    Energy,
}

/// 单通道诊断读数
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticReading {
    pub channel: u8,
    /// 主值：W / ms / J
    pub value: f64,
    /// 能耗报告中括号内的 Wh
    pub secondary: Option<f64>,
}

/// 诊断上报
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticReport {
    pub kind: DiagnosticKind,
    pub readings: Vec<DiagnosticReading>,
}

/// 解码 `POWER` / `USAGE` / `ENERGY` 诊断行
pub fn decode_diagnostic(line: &str) -> Option<DiagnosticReport> {
    let mut fields = line.trim_end_matches(['\r', '\n']).split(';');
    let kind = match fields.next()? {
        "POWER" => DiagnosticKind::Power,
        "USAGE" => DiagnosticKind::Usage,
        "ENERGY" => DiagnosticKind::Energy,
        _ => return None,
    };

    let mut readings = Vec::new();
    for field in fields {
        let Some((key, value)) = field.split_once(':') else {
            continue;
        };
        let Some(channel) = key.trim().strip_prefix("LED").and_then(|id| id.parse::<u8>().ok())
        else {
            continue;
        };
        let value = value.trim();
        let reading = match kind {
            DiagnosticKind::Power => parse_number(value.trim_end_matches('W')).map(|watts| {
                DiagnosticReading {
                    channel,
                    value: watts,
                    secondary: None,
                }
            }),
            DiagnosticKind::Usage => parse_number(value).map(|ms| DiagnosticReading {
                channel,
                value: ms,
                secondary: None,
            }),
            DiagnosticKind::Energy => parse_energy(value).map(|(joules, wh)| DiagnosticReading {
                channel,
                value: joules,
                secondary: wh,
            }),
        };
        if let Some(reading) = reading {
            readings.push(reading);
        }
    }
    Some(DiagnosticReport { kind, readings })
}

/// 解析 `5400.0J(1.50Wh)`
fn parse_energy(value: &str) -> Option<(f64, Option<f64>)> {
    let (joules, rest) = match value.split_once('(') {
        Some((joules, rest)) => (joules, Some(rest)),
        None => (value, None),
    };
    let joules = parse_number(joules.trim().trim_end_matches('J'))?;
    let wh = rest.and_then(|rest| parse_number(rest.trim_end_matches(')').trim_end_matches("Wh")));
    Some((joules, wh))
}
