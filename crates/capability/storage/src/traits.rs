//! 存储接口 Trait 定义
//!
//! - DailyScheduleStore：每日开关调度
//! - DurableJobQueue：跨重启保留的单次触发作业队列

use crate::error::StorageError;
use async_trait::async_trait;
use domain::{DailySchedule, DailyScheduleUpdate, NewDailySchedule, ScheduledJob};

/// 每日调度存储接口
///
/// 同一设备的同一通道最多只允许一条启用中的调度，违反时返回冲突错误。
#[async_trait]
pub trait DailyScheduleStore: Send + Sync {
    /// 列出设备的全部调度（按通道、ID 排序）
    async fn list_schedules(&self, device_id: &str) -> Result<Vec<DailySchedule>, StorageError>;

    /// 列出设备启用中的调度
    async fn list_active_schedules(
        &self,
        device_id: &str,
    ) -> Result<Vec<DailySchedule>, StorageError>;

    async fn find_schedule(
        &self,
        device_id: &str,
        schedule_id: i64,
    ) -> Result<Option<DailySchedule>, StorageError>;

    async fn create_schedule(
        &self,
        schedule: NewDailySchedule,
    ) -> Result<DailySchedule, StorageError>;

    /// 更新调度，不存在时返回 `None`
    async fn update_schedule(
        &self,
        device_id: &str,
        schedule_id: i64,
        update: DailyScheduleUpdate,
    ) -> Result<Option<DailySchedule>, StorageError>;

    async fn delete_schedule(&self, device_id: &str, schedule_id: i64)
    -> Result<bool, StorageError>;

    /// 记录调度已下发到设备
    async fn mark_applied(
        &self,
        device_id: &str,
        schedule_ids: &[i64],
        applied_at_ms: i64,
    ) -> Result<(), StorageError>;
}

/// 持久作业队列接口
///
/// 作业按 `job_id` 去重：重复入队视为替换。
#[async_trait]
pub trait DurableJobQueue: Send + Sync {
    /// 入队或替换同 ID 作业
    async fn enqueue(&self, job: &ScheduledJob) -> Result<(), StorageError>;

    /// 取消作业，返回是否确实存在
    async fn cancel(&self, job_id: &str) -> Result<bool, StorageError>;

    /// 认领已到期的作业；被认领的作业从队列移除，同一作业只会被认领一次
    async fn claim_due(&self, now_ms: i64, limit: usize)
    -> Result<Vec<ScheduledJob>, StorageError>;
}
