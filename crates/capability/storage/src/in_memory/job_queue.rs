//! 持久作业队列内存实现
//!
//! 不跨进程重启保留，仅用于测试和无 Redis 的本地运行。
//! `set_available(false)` 可模拟队列后端不可用。

use crate::error::StorageError;
use crate::traits::DurableJobQueue;
use domain::ScheduledJob;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct InMemoryJobQueue {
    jobs: RwLock<HashMap<String, ScheduledJob>>,
    available: AtomicBool,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// 当前排队中的作业（按到期时间排序）
    pub fn pending(&self) -> Vec<ScheduledJob> {
        let mut items: Vec<ScheduledJob> = self
            .jobs
            .read()
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default();
        items.sort_by(|a, b| {
            a.due_at_ms
                .cmp(&b.due_at_ms)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        items
    }

    fn ensure_available(&self) -> Result<(), StorageError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::new("job queue unavailable"))
        }
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DurableJobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: &ScheduledJob) -> Result<(), StorageError> {
        self.ensure_available()?;
        let mut map = self
            .jobs
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        map.insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn cancel(&self, job_id: &str) -> Result<bool, StorageError> {
        self.ensure_available()?;
        let mut map = self
            .jobs
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(map.remove(job_id).is_some())
    }

    async fn claim_due(
        &self,
        now_ms: i64,
        limit: usize,
    ) -> Result<Vec<ScheduledJob>, StorageError> {
        self.ensure_available()?;
        let mut map = self
            .jobs
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut due: Vec<ScheduledJob> = map
            .values()
            .filter(|job| job.due_at_ms <= now_ms)
            .cloned()
            .collect();
        due.sort_by_key(|job| job.due_at_ms);
        due.truncate(limit);
        for job in &due {
            map.remove(&job.job_id);
        }
        Ok(due)
    }
}
