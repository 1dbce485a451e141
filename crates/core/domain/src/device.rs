//! 控制器状态快照。
//!
//! 快照只由状态解码整体替换，调用方不会逐字段修改。

/// 单个灯光通道的状态。
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelState {
    /// 通道编号（0..N-1，与快照数组下标一致）
    pub id: u8,
    /// 亮度 0-255
    pub brightness: u8,
    /// 是否启用人体感应自动点亮
    pub motion_enabled: bool,
    /// 是否处于手动接管（手动或调度命令控制，屏蔽感应逻辑）
    pub manual_override: bool,
    /// 一次性定时点亮是否进行中
    pub timed_schedule_active: bool,
    /// 一次性定时点亮剩余秒数
    pub timed_remaining_seconds: u32,
    /// 当日累计能耗（Wh，本地零点清零）
    pub energy_wh_today: f64,
    /// 当前功率（W）
    pub current_power_w: f64,
}

impl ChannelState {
    /// 未收到任何字段时的通道默认状态。
    pub fn idle(id: u8) -> Self {
        Self {
            id,
            brightness: 0,
            motion_enabled: false,
            manual_override: false,
            timed_schedule_active: false,
            timed_remaining_seconds: 0,
            energy_wh_today: 0.0,
            current_power_w: 0.0,
        }
    }

    pub fn is_lit(&self) -> bool {
        self.brightness > 0
    }
}

/// 控制器完整状态快照（不可变，整体替换）。
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSnapshot {
    pub motion_sensor_enabled: bool,
    /// 长度恒等于启动时确定的通道数，下标即通道编号
    pub channels: Vec<ChannelState>,
    pub captured_at_ms: i64,
}

impl DeviceSnapshot {
    /// 构造全部通道为默认状态的快照。
    pub fn empty(channel_count: u8, captured_at_ms: i64) -> Self {
        Self {
            motion_sensor_enabled: false,
            channels: (0..channel_count).map(ChannelState::idle).collect(),
            captured_at_ms,
        }
    }

    pub fn channel(&self, id: u8) -> Option<&ChannelState> {
        self.channels.get(id as usize)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
