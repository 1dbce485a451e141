//! 应用运行配置加载。

use lumo_protocol::{LinkConfig, LinkEndpoint, MAX_WIRE_CHANNELS};
use std::env;
use std::time::Duration;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub device_id: String,
    /// 控制器通道数量，指令行只容纳一位通道号
    pub channel_count: u8,
    pub max_power_w: f64,
    pub link_endpoint: LinkEndpoint,
    pub link: LinkConfig,
    /// 收到 `INFO:` 后重新查询前的等待
    pub info_requery_delay: Duration,
    /// 未配置时使用内存调度表
    pub database_url: Option<String>,
    /// 未配置时只使用进程内兜底定时器
    pub redis_url: Option<String>,
    pub redis_namespace: String,
    pub queue_timeout: Duration,
    pub queue_poll_interval: Duration,
    pub observer_timeout: Duration,
    pub apply_on_start: bool,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr =
            env::var("LUMO_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let device_id = env::var("LUMO_DEVICE_ID").unwrap_or_else(|_| "controller-1".to_string());
        let channel_count = read_u8_with_default("LUMO_CHANNEL_COUNT", 3)?;
        if channel_count == 0 || channel_count > MAX_WIRE_CHANNELS {
            return Err(ConfigError::Invalid(
                "LUMO_CHANNEL_COUNT".to_string(),
                channel_count.to_string(),
            ));
        }
        let max_power_w = read_f64_with_default("LUMO_MAX_POWER_W", 5.0)?;
        let link_endpoint = read_link_endpoint()?;
        let link = LinkConfig {
            command_timeout_ms: read_u64_with_default("LUMO_COMMAND_TIMEOUT_MS", 3_000)?,
            command_retries: read_u32_with_default("LUMO_COMMAND_RETRIES", 1)?,
            connect_timeout_ms: read_u64_with_default("LUMO_CONNECT_TIMEOUT_MS", 5_000)?,
            reconnect_initial_ms: read_u64_with_default("LUMO_RECONNECT_INITIAL_MS", 500)?,
            reconnect_max_ms: read_u64_with_default("LUMO_RECONNECT_MAX_MS", 30_000)?,
            ..LinkConfig::default()
        };
        let info_requery_delay =
            Duration::from_millis(read_u64_with_default("LUMO_INFO_REQUERY_DELAY_MS", 250)?);
        let database_url = read_optional("LUMO_DATABASE_URL");
        let redis_url = read_optional("LUMO_REDIS_URL");
        let redis_namespace =
            env::var("LUMO_REDIS_NAMESPACE").unwrap_or_else(|_| "lumo".to_string());
        let queue_timeout =
            Duration::from_millis(read_u64_with_default("LUMO_QUEUE_TIMEOUT_MS", 1_500)?);
        let queue_poll_interval =
            Duration::from_millis(read_u64_with_default("LUMO_QUEUE_POLL_INTERVAL_MS", 1_000)?);
        let observer_timeout =
            Duration::from_millis(read_u64_with_default("LUMO_OBSERVER_TIMEOUT_MS", 2_000)?);
        let apply_on_start = read_bool_with_default("LUMO_APPLY_ON_START", true);

        Ok(Self {
            http_addr,
            device_id,
            channel_count,
            max_power_w,
            link_endpoint,
            link,
            info_requery_delay,
            database_url,
            redis_url,
            redis_namespace,
            queue_timeout,
            queue_poll_interval,
            observer_timeout,
            apply_on_start,
        })
    }
}

/// TCP 网桥优先，其次本地串口；两者都未配置时报缺失。
fn read_link_endpoint() -> Result<LinkEndpoint, ConfigError> {
    if let Some(addr) = read_optional("LUMO_LINK_TCP_ADDR") {
        return Ok(LinkEndpoint::Tcp { addr });
    }
    match read_optional("LUMO_LINK_SERIAL_PATH") {
        Some(path) => Ok(LinkEndpoint::Serial {
            path,
            baud_rate: read_u32_with_default("LUMO_LINK_BAUD_RATE", 9_600)?,
        }),
        None => Err(ConfigError::Missing(
            "LUMO_LINK_TCP_ADDR or LUMO_LINK_SERIAL_PATH".to_string(),
        )),
    }
}

fn read_u8_with_default(key: &str, default: u8) -> Result<u8, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u8>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u32_with_default(key: &str, default: u32) -> Result<u32, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u32>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_f64_with_default(key: &str, default: f64) -> Result<f64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    match value.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() && parsed >= 0.0 => Ok(parsed),
        _ => Err(ConfigError::Invalid(key.to_string(), value)),
    }
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
