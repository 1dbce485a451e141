//! 进程内兜底定时器
//!
//! 持久队列不可达时使用，按 `job_id` 唯一：替换时先取消旧定时器。
//! 不做持久化，重启后由调度表重新计算。

use domain::ScheduledJob;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;

struct FallbackTimer {
    generation: u64,
    job: ScheduledJob,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub(crate) struct FallbackScheduler {
    timers: Mutex<HashMap<String, FallbackTimer>>,
    generation: AtomicU64,
}

impl FallbackScheduler {
    /// 安排定时任务，返回是否替换了同 ID 的旧定时器。
    ///
    /// `make` 收到本次安排的代号，到期时应先调用 [`release`](Self::release)
    /// 确认自己仍是当前定时器。
    pub(crate) fn replace<F, Fut>(&self, job: ScheduledJob, make: F) -> bool
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let Ok(mut timers) = self.timers.lock() else {
            return false;
        };
        let handle = tokio::spawn(make(generation));
        let job_id = job.job_id.clone();
        let previous = timers.insert(
            job_id,
            FallbackTimer {
                generation,
                job,
                handle,
            },
        );
        match previous {
            Some(previous) => {
                previous.handle.abort();
                true
            }
            None => false,
        }
    }

    /// 到期的定时器移除自身登记（不中止任务），代号不匹配说明已被替换。
    pub(crate) fn release(&self, job_id: &str, generation: u64) -> bool {
        let Ok(mut timers) = self.timers.lock() else {
            return false;
        };
        match timers.get(job_id) {
            Some(timer) if timer.generation == generation => {
                timers.remove(job_id);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn cancel(&self, job_id: &str) -> bool {
        let removed = self
            .timers
            .lock()
            .ok()
            .and_then(|mut timers| timers.remove(job_id));
        match removed {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    pub(crate) fn cancel_all(&self) -> usize {
        let Ok(mut timers) = self.timers.lock() else {
            return 0;
        };
        let count = timers.len();
        for (_, timer) in timers.drain() {
            timer.handle.abort();
        }
        count
    }

    pub(crate) fn contains(&self, job_id: &str) -> bool {
        self.timers
            .lock()
            .map(|timers| timers.contains_key(job_id))
            .unwrap_or(false)
    }

    /// 当前挂起的作业（按 job_id 排序）
    pub(crate) fn pending(&self) -> Vec<ScheduledJob> {
        let mut jobs: Vec<ScheduledJob> = self
            .timers
            .lock()
            .map(|timers| timers.values().map(|timer| timer.job.clone()).collect())
            .unwrap_or_default();
        jobs.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::ScheduleEdge;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn job(due_at_ms: i64) -> ScheduledJob {
        ScheduledJob {
            job_id: "2-on-1".to_string(),
            schedule_id: 1,
            channel_id: 2,
            edge: ScheduleEdge::On,
            due_at_ms,
        }
    }

    #[tokio::test]
    async fn replacing_cancels_exactly_the_prior_timer() {
        let scheduler = FallbackScheduler::default();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let first = tx.clone();
        assert!(!scheduler.replace(job(1), move |_| async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            let _ = first.send("first");
        }));
        let second = tx.clone();
        assert!(scheduler.replace(job(2), move |_| async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            let _ = second.send("second");
        }));
        drop(tx);

        assert_eq!(scheduler.pending().len(), 1);
        assert_eq!(scheduler.pending()[0].due_at_ms, 2);
        assert_eq!(rx.recv().await, Some("second"));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn release_only_matches_current_generation() {
        let scheduler = FallbackScheduler::default();
        let mut generations = Vec::new();
        for due in [1, 2] {
            let (tx, rx) = std::sync::mpsc::channel();
            scheduler.replace(job(due), move |generation| {
                let _ = tx.send(generation);
                async {}
            });
            generations.push(rx.recv().expect("generation"));
        }
        assert!(!scheduler.release("2-on-1", generations[0]));
        assert!(scheduler.contains("2-on-1"));
        assert!(scheduler.release("2-on-1", generations[1]));
        assert!(!scheduler.contains("2-on-1"));
    }

    #[tokio::test]
    async fn cancel_all_clears_timers() {
        let scheduler = FallbackScheduler::default();
        scheduler.replace(job(1), |_| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        assert_eq!(scheduler.cancel_all(), 1);
        assert!(scheduler.pending().is_empty());
        assert!(!scheduler.cancel("2-on-1"));
    }
}
