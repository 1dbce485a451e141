//! 每日调度内存存储

use crate::error::StorageError;
use crate::traits::DailyScheduleStore;
use domain::{DailySchedule, DailyScheduleUpdate, NewDailySchedule};
use std::collections::BTreeMap;
use std::sync::RwLock;

struct ScheduleTable {
    next_id: i64,
    rows: BTreeMap<i64, DailySchedule>,
}

impl ScheduleTable {
    fn active_conflict(&self, device_id: &str, channel_id: u8, except_id: Option<i64>) -> bool {
        self.rows.values().any(|row| {
            row.is_active
                && row.device_id == device_id
                && row.channel_id == channel_id
                && Some(row.id) != except_id
        })
    }
}

/// 每日调度内存存储
///
/// 使用 RwLock + BTreeMap，ID 自增，保持与数据库实现一致的冲突语义。
pub struct InMemoryDailyScheduleStore {
    table: RwLock<ScheduleTable>,
}

impl InMemoryDailyScheduleStore {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(ScheduleTable {
                next_id: 1,
                rows: BTreeMap::new(),
            }),
        }
    }

    fn sorted(mut items: Vec<DailySchedule>) -> Vec<DailySchedule> {
        items.sort_by_key(|item| (item.channel_id, item.id));
        items
    }
}

impl Default for InMemoryDailyScheduleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DailyScheduleStore for InMemoryDailyScheduleStore {
    async fn list_schedules(&self, device_id: &str) -> Result<Vec<DailySchedule>, StorageError> {
        let items = self
            .table
            .read()
            .map(|table| {
                table
                    .rows
                    .values()
                    .filter(|row| row.device_id == device_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self::sorted(items))
    }

    async fn list_active_schedules(
        &self,
        device_id: &str,
    ) -> Result<Vec<DailySchedule>, StorageError> {
        let items = self
            .table
            .read()
            .map(|table| {
                table
                    .rows
                    .values()
                    .filter(|row| row.device_id == device_id && row.is_active)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self::sorted(items))
    }

    async fn find_schedule(
        &self,
        device_id: &str,
        schedule_id: i64,
    ) -> Result<Option<DailySchedule>, StorageError> {
        let item = self
            .table
            .read()
            .ok()
            .and_then(|table| table.rows.get(&schedule_id).cloned())
            .filter(|row| row.device_id == device_id);
        Ok(item)
    }

    async fn create_schedule(
        &self,
        schedule: NewDailySchedule,
    ) -> Result<DailySchedule, StorageError> {
        let mut table = self
            .table
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if schedule.is_active
            && table.active_conflict(&schedule.device_id, schedule.channel_id, None)
        {
            return Err(StorageError::conflict(format!(
                "channel {} already has an active schedule",
                schedule.channel_id
            )));
        }
        let id = table.next_id;
        table.next_id += 1;
        let record = DailySchedule {
            id,
            device_id: schedule.device_id,
            channel_id: schedule.channel_id,
            on_hour: schedule.on_hour,
            on_minute: schedule.on_minute,
            off_hour: schedule.off_hour,
            off_minute: schedule.off_minute,
            is_active: schedule.is_active,
            last_applied_at_ms: None,
        };
        table.rows.insert(id, record.clone());
        Ok(record)
    }

    async fn update_schedule(
        &self,
        device_id: &str,
        schedule_id: i64,
        update: DailyScheduleUpdate,
    ) -> Result<Option<DailySchedule>, StorageError> {
        let mut table = self
            .table
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let merged = match table.rows.get(&schedule_id) {
            Some(row) if row.device_id == device_id => update.apply_to(row),
            _ => return Ok(None),
        };
        if merged.is_active && table.active_conflict(device_id, merged.channel_id, Some(schedule_id))
        {
            return Err(StorageError::conflict(format!(
                "channel {} already has an active schedule",
                merged.channel_id
            )));
        }
        table.rows.insert(schedule_id, merged.clone());
        Ok(Some(merged))
    }

    async fn delete_schedule(
        &self,
        device_id: &str,
        schedule_id: i64,
    ) -> Result<bool, StorageError> {
        let mut table = self
            .table
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        match table.rows.get(&schedule_id) {
            Some(row) if row.device_id == device_id => {
                table.rows.remove(&schedule_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_applied(
        &self,
        device_id: &str,
        schedule_ids: &[i64],
        applied_at_ms: i64,
    ) -> Result<(), StorageError> {
        let mut table = self
            .table
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        for id in schedule_ids {
            if let Some(row) = table.rows.get_mut(id)
                && row.device_id == device_id
            {
                row.last_applied_at_ms = Some(applied_at_ms);
            }
        }
        Ok(())
    }
}
