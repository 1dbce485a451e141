//! 调度执行器
//!
//! 每条启用中的调度每天产生一次开、一次关，三条路径相互独立：
//! - 持久队列：可达时按 `job_id` 入队（替换语义），由队列 worker 认领执行
//! - 兜底定时器：队列不可达或超时时在进程内定时
//! - 控制器 RTC：调度下发到控制器自身，主机离线也能照常开关
//!
//! 各路径最终都落到幂等的开关动作上，重复触发无害。

use crate::actuator::ChannelActuator;
use crate::clock::{Clock, delay_until, next_due};
use crate::error::{QueueError, ScheduleError};
use crate::fallback::FallbackScheduler;
use chrono::{DateTime, Local, Timelike};
use domain::{DailySchedule, DailyScheduleUpdate, NewDailySchedule, ScheduleEdge, ScheduledJob};
use lumo_storage::{DailyScheduleStore, DurableJobQueue};
use lumo_telemetry::{
    record_hardware_schedule_applied, record_job_enqueued_durable, record_job_enqueued_fallback,
    record_job_fired, record_queue_failure,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedMutexGuard, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// 执行器配置
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub device_id: String,
    /// 单次持久队列操作的超时，超时即转兜底定时器
    pub queue_timeout: Duration,
    /// 队列 worker 轮询间隔
    pub poll_interval: Duration,
    /// 每次轮询最多认领的作业数
    pub claim_batch: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            device_id: "controller-1".to_string(),
            queue_timeout: Duration::from_millis(1_500),
            poll_interval: Duration::from_secs(1),
            claim_batch: 32,
        }
    }
}

/// 作业最终落在哪条路径
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPath {
    Durable,
    Fallback,
}

/// `apply_all_schedules` 的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub schedules: usize,
    pub hardware_applied: usize,
    pub hardware_error: Option<String>,
    pub durable_jobs: usize,
    pub fallback_jobs: usize,
}

/// `restore_from_store` 的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub schedules: usize,
    pub durable_jobs: usize,
    pub fallback_jobs: usize,
}

#[derive(Default)]
struct JobCounts {
    durable: usize,
    fallback: usize,
}

impl JobCounts {
    fn add(&mut self, path: JobPath) {
        match path {
            JobPath::Durable => self.durable += 1,
            JobPath::Fallback => self.fallback += 1,
        }
    }
}

/// 每个 `job_id` 最近一次安排和最近一次执行的到期时刻
#[derive(Debug, Default, Clone, Copy)]
struct JobMark {
    scheduled_due_ms: Option<i64>,
    fired_due_ms: Option<i64>,
}

#[derive(Clone)]
pub struct ScheduleExecutor {
    inner: Arc<ExecutorInner>,
}

struct ExecutorInner {
    store: Arc<dyn DailyScheduleStore>,
    queue: Option<Arc<dyn DurableJobQueue>>,
    actuator: Arc<dyn ChannelActuator>,
    clock: Arc<dyn Clock>,
    fallback: FallbackScheduler,
    job_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    job_marks: Mutex<HashMap<String, JobMark>>,
    shutdown: watch::Sender<bool>,
    config: ExecutorConfig,
}

impl ScheduleExecutor {
    /// `queue` 为 `None` 时所有主机侧作业都走兜底定时器。
    pub fn new(
        store: Arc<dyn DailyScheduleStore>,
        queue: Option<Arc<dyn DurableJobQueue>>,
        actuator: Arc<dyn ChannelActuator>,
        clock: Arc<dyn Clock>,
        config: ExecutorConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(ExecutorInner {
                store,
                queue,
                actuator,
                clock,
                fallback: FallbackScheduler::default(),
                job_locks: Mutex::new(HashMap::new()),
                job_marks: Mutex::new(HashMap::new()),
                shutdown,
                config,
            }),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.inner.config.device_id
    }

    pub fn now(&self) -> DateTime<Local> {
        self.inner.clock.now()
    }

    /// 调度此刻是否处于点亮窗口
    pub fn is_currently_active(&self, schedule: &DailySchedule) -> bool {
        let now = self.inner.clock.now();
        schedule.is_active && schedule.is_active_at(now.hour() as u8, now.minute() as u8)
    }

    pub async fn list_schedules(&self) -> Result<Vec<DailySchedule>, ScheduleError> {
        Ok(self
            .inner
            .store
            .list_schedules(&self.inner.config.device_id)
            .await?)
    }

    pub async fn create_schedule(
        &self,
        schedule: NewDailySchedule,
    ) -> Result<DailySchedule, ScheduleError> {
        self.inner.check_channel(schedule.channel_id)?;
        schedule.validate()?;
        let created = self.inner.store.create_schedule(schedule).await?;
        info!(
            target: "lumo.schedule",
            schedule_id = created.id,
            channel = created.channel_id,
            on = %format!("{:02}:{:02}", created.on_hour, created.on_minute),
            off = %format!("{:02}:{:02}", created.off_hour, created.off_minute),
            active = created.is_active,
            "schedule_created"
        );
        if created.is_active {
            self.inner.schedule_jobs_for(&created).await?;
            self.inner.push_to_hardware(&created).await;
        }
        Ok(created)
    }

    /// 更新调度：启用则重新计算并替换作业，停用则取消作业。
    pub async fn update_schedule(
        &self,
        schedule_id: i64,
        update: DailyScheduleUpdate,
    ) -> Result<DailySchedule, ScheduleError> {
        let device_id = self.inner.config.device_id.as_str();
        let existing = self
            .inner
            .store
            .find_schedule(device_id, schedule_id)
            .await?
            .ok_or(ScheduleError::NotFound(schedule_id))?;
        update.apply_to(&existing).validate()?;
        let updated = self
            .inner
            .store
            .update_schedule(device_id, schedule_id, update)
            .await?
            .ok_or(ScheduleError::NotFound(schedule_id))?;
        info!(
            target: "lumo.schedule",
            schedule_id = updated.id,
            channel = updated.channel_id,
            active = updated.is_active,
            "schedule_updated"
        );
        if updated.is_active {
            self.inner.schedule_jobs_for(&updated).await?;
            self.inner.push_to_hardware(&updated).await;
        } else {
            self.inner.cancel_jobs_for(&updated).await;
            if existing.is_active {
                self.inner.resync_hardware().await;
            }
        }
        Ok(updated)
    }

    /// 删除调度并取消其作业；持久队列不可达时记录日志后继续本地清理。
    pub async fn delete_schedule(&self, schedule_id: i64) -> Result<DailySchedule, ScheduleError> {
        let device_id = self.inner.config.device_id.as_str();
        let existing = self
            .inner
            .store
            .find_schedule(device_id, schedule_id)
            .await?
            .ok_or(ScheduleError::NotFound(schedule_id))?;
        self.inner.cancel_jobs_for(&existing).await;
        if !self
            .inner
            .store
            .delete_schedule(device_id, schedule_id)
            .await?
        {
            return Err(ScheduleError::NotFound(schedule_id));
        }
        info!(
            target: "lumo.schedule",
            schedule_id = schedule_id,
            channel = existing.channel_id,
            "schedule_deleted"
        );
        if existing.is_active {
            self.inner.resync_hardware().await;
        }
        Ok(existing)
    }

    /// 重新下发全部调度：先一次性清空控制器上的调度，再逐条写入，
    /// 同时重新安排主机侧作业。控制器不可达不影响主机侧作业。
    pub async fn apply_all_schedules(&self) -> Result<ApplyReport, ScheduleError> {
        let device_id = self.inner.config.device_id.as_str();
        let schedules = self.inner.store.list_active_schedules(device_id).await?;
        let mut report = ApplyReport {
            schedules: schedules.len(),
            ..ApplyReport::default()
        };

        let applied_ids = match self.inner.apply_hardware(&schedules).await {
            Ok(ids) => ids,
            Err((ids, err)) => {
                report.hardware_error = Some(err);
                ids
            }
        };
        report.hardware_applied = applied_ids.len();

        let mut counts = JobCounts::default();
        for schedule in &schedules {
            for path in self.inner.schedule_jobs_for(schedule).await? {
                counts.add(path);
            }
        }
        report.durable_jobs = counts.durable;
        report.fallback_jobs = counts.fallback;

        if !applied_ids.is_empty() {
            let now_ms = self.inner.clock.now().timestamp_millis();
            self.inner
                .store
                .mark_applied(device_id, &applied_ids, now_ms)
                .await?;
        }
        info!(
            target: "lumo.schedule",
            schedules = report.schedules,
            hardware_applied = report.hardware_applied,
            hardware_error = ?report.hardware_error,
            durable_jobs = report.durable_jobs,
            fallback_jobs = report.fallback_jobs,
            "schedules_applied"
        );
        Ok(report)
    }

    /// 启动时从调度表重建主机侧作业
    pub async fn restore_from_store(&self) -> Result<RestoreReport, ScheduleError> {
        let schedules = self
            .inner
            .store
            .list_active_schedules(&self.inner.config.device_id)
            .await?;
        let mut counts = JobCounts::default();
        for schedule in &schedules {
            for path in self.inner.schedule_jobs_for(schedule).await? {
                counts.add(path);
            }
        }
        let report = RestoreReport {
            schedules: schedules.len(),
            durable_jobs: counts.durable,
            fallback_jobs: counts.fallback,
        };
        info!(
            target: "lumo.schedule",
            schedules = report.schedules,
            durable_jobs = report.durable_jobs,
            fallback_jobs = report.fallback_jobs,
            "schedules_restored"
        );
        Ok(report)
    }

    /// 认领并执行已到期的持久作业，返回执行数量
    pub async fn run_due_jobs(&self) -> usize {
        self.inner.run_due_jobs().await
    }

    /// 启动持久队列 worker；未配置队列时返回 `None`。
    pub fn spawn_queue_worker(&self) -> Option<JoinHandle<()>> {
        self.inner.queue.as_ref()?;
        let inner = self.inner.clone();
        let mut shutdown = inner.shutdown.subscribe();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                target: "lumo.schedule",
                poll_interval_ms = inner.config.poll_interval.as_millis() as u64,
                "queue_worker_started"
            );
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {}
                }
                inner.run_due_jobs().await;
            }
            info!(target: "lumo.schedule", "queue_worker_stopped");
        }))
    }

    /// 兜底定时器中挂起的作业
    pub fn pending_fallback_jobs(&self) -> Vec<ScheduledJob> {
        self.inner.fallback.pending()
    }

    /// 停止 worker 并取消全部兜底定时器；调度状态可从调度表重建。
    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
        let cancelled = self.inner.fallback.cancel_all();
        info!(
            target: "lumo.schedule",
            fallback_timers = cancelled,
            "schedule_executor_stopped"
        );
    }
}

impl ExecutorInner {
    fn check_channel(&self, channel: u8) -> Result<(), ScheduleError> {
        if channel < self.actuator.channel_count() {
            Ok(())
        } else {
            Err(ScheduleError::InvalidChannel(channel))
        }
    }

    /// 同一 `job_id` 的入队、替换、取消互斥
    async fn lock_job(&self, job_id: &str) -> OwnedMutexGuard<()> {
        let lock = match self.job_locks.lock() {
            Ok(mut locks) => locks.entry(job_id.to_string()).or_default().clone(),
            Err(_) => Arc::new(tokio::sync::Mutex::new(())),
        };
        lock.lock_owned().await
    }

    /// 作业已取消：释放该 `job_id` 的锁和执行记录（仍有等待者时保留锁）
    fn forget_job(&self, job_id: &str, guard: &OwnedMutexGuard<()>) {
        if let Ok(mut marks) = self.job_marks.lock() {
            marks.remove(job_id);
        }
        if let Ok(mut locks) = self.job_locks.lock() {
            let idle = locks.get(job_id).is_some_and(|lock| {
                Arc::ptr_eq(lock, OwnedMutexGuard::mutex(guard)) && Arc::strong_count(lock) == 2
            });
            if idle {
                locks.remove(job_id);
            }
        }
    }

    fn mark_scheduled(&self, job: &ScheduledJob) {
        if let Ok(mut marks) = self.job_marks.lock() {
            marks.entry(job.job_id.clone()).or_default().scheduled_due_ms = Some(job.due_at_ms);
        }
    }

    /// 登记一次执行；同一边沿已执行过或已被更晚的作业取代时返回跳过原因。
    /// 调用方须持有该 `job_id` 的锁。
    fn begin_firing(&self, job: &ScheduledJob) -> Option<&'static str> {
        let Ok(mut marks) = self.job_marks.lock() else {
            return None;
        };
        let mark = marks.entry(job.job_id.clone()).or_default();
        if mark.fired_due_ms.is_some_and(|fired| fired >= job.due_at_ms) {
            return Some("already_fired");
        }
        if mark
            .scheduled_due_ms
            .is_some_and(|scheduled| scheduled > job.due_at_ms)
        {
            return Some("superseded");
        }
        mark.fired_due_ms = Some(job.due_at_ms);
        None
    }

    fn build_job(
        schedule: &DailySchedule,
        edge: ScheduleEdge,
        after: &DateTime<Local>,
    ) -> Result<ScheduledJob, ScheduleError> {
        let (hour, minute) = schedule.edge_time(edge);
        let due = next_due(after, hour, minute).ok_or_else(|| {
            ScheduleError::InvalidTime(format!("{hour:02}:{minute:02} has no next occurrence"))
        })?;
        Ok(ScheduledJob::new(schedule, edge, due.timestamp_millis()))
    }

    async fn schedule_jobs_for(
        self: &Arc<Self>,
        schedule: &DailySchedule,
    ) -> Result<Vec<JobPath>, ScheduleError> {
        let now = self.clock.now();
        let mut paths = Vec::with_capacity(2);
        for edge in ScheduleEdge::BOTH {
            let job = Self::build_job(schedule, edge, &now)?;
            paths.push(self.schedule_job(job).await);
        }
        Ok(paths)
    }

    async fn schedule_job(self: &Arc<Self>, job: ScheduledJob) -> JobPath {
        let _guard = self.lock_job(&job.job_id).await;
        self.schedule_job_locked(job).await
    }

    /// 调用方须持有该 `job_id` 的锁
    async fn schedule_job_locked(self: &Arc<Self>, job: ScheduledJob) -> JobPath {
        self.mark_scheduled(&job);
        match self.enqueue_durable(&job).await {
            Ok(()) => {
                // 持久队列接管后撤销残留的兜底定时器
                self.fallback.cancel(&job.job_id);
                record_job_enqueued_durable();
                info!(
                    target: "lumo.schedule",
                    job_id = %job.job_id,
                    due_at_ms = job.due_at_ms,
                    "job_enqueued_durable"
                );
                JobPath::Durable
            }
            Err(err) => {
                if self.queue.is_some() {
                    record_queue_failure();
                    warn!(
                        target: "lumo.schedule",
                        job_id = %job.job_id,
                        error = %err,
                        "durable_enqueue_failed"
                    );
                }
                self.arm_fallback(job);
                JobPath::Fallback
            }
        }
    }

    async fn enqueue_durable(&self, job: &ScheduledJob) -> Result<(), QueueError> {
        let Some(queue) = &self.queue else {
            return Err(QueueError::Unavailable("not configured".to_string()));
        };
        match tokio::time::timeout(self.config.queue_timeout, queue.enqueue(job)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(QueueError::Unavailable(err.to_string())),
            Err(_) => Err(QueueError::Unavailable("timed out".to_string())),
        }
    }

    fn arm_fallback(self: &Arc<Self>, job: ScheduledJob) {
        let delay = delay_until(job.due_at_ms, &self.clock.now());
        let weak = Arc::downgrade(self);
        let job_id = job.job_id.clone();
        let due_at_ms = job.due_at_ms;
        let timer_job = job.clone();
        let replaced = self.fallback.replace(job, move |generation| async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.fallback.release(&timer_job.job_id, generation) {
                return;
            }
            inner.fire(timer_job).await;
        });
        record_job_enqueued_fallback();
        info!(
            target: "lumo.schedule",
            job_id = %job_id,
            due_at_ms = due_at_ms,
            delay_ms = delay.as_millis() as u64,
            replaced = replaced,
            "job_scheduled_fallback"
        );
    }

    async fn cancel_jobs_for(&self, schedule: &DailySchedule) {
        for edge in ScheduleEdge::BOTH {
            let job_id = schedule.job_id(edge);
            let guard = self.lock_job(&job_id).await;
            let local = self.fallback.cancel(&job_id);
            let durable = match &self.queue {
                Some(queue) => {
                    match tokio::time::timeout(self.config.queue_timeout, queue.cancel(&job_id))
                        .await
                    {
                        Ok(Ok(removed)) => removed,
                        Ok(Err(err)) => {
                            record_queue_failure();
                            warn!(
                                target: "lumo.schedule",
                                job_id = %job_id,
                                error = %err,
                                "durable_cancel_failed"
                            );
                            false
                        }
                        Err(_) => {
                            record_queue_failure();
                            warn!(
                                target: "lumo.schedule",
                                job_id = %job_id,
                                "durable_cancel_timeout"
                            );
                            false
                        }
                    }
                }
                None => false,
            };
            self.forget_job(&job_id, &guard);
            debug!(
                target: "lumo.schedule",
                job_id = %job_id,
                fallback = local,
                durable = durable,
                "job_cancelled"
            );
        }
    }

    /// 单条调度写入控制器；失败只记录，主机侧作业仍然有效
    async fn push_to_hardware(&self, schedule: &DailySchedule) {
        match self.actuator.push_daily_schedule(schedule).await {
            Ok(()) => {
                record_hardware_schedule_applied();
                let now_ms = self.clock.now().timestamp_millis();
                if let Err(err) = self
                    .store
                    .mark_applied(&self.config.device_id, &[schedule.id], now_ms)
                    .await
                {
                    warn!(
                        target: "lumo.schedule",
                        schedule_id = schedule.id,
                        error = %err,
                        "mark_applied_failed"
                    );
                }
            }
            Err(err) => {
                warn!(
                    target: "lumo.schedule",
                    schedule_id = schedule.id,
                    channel = schedule.channel_id,
                    error = %err,
                    "hardware_schedule_push_failed"
                );
            }
        }
    }

    /// 控制器只能整体清除调度：清空后重新写入仍启用的调度
    async fn resync_hardware(&self) {
        let schedules = match self
            .store
            .list_active_schedules(&self.config.device_id)
            .await
        {
            Ok(schedules) => schedules,
            Err(err) => {
                warn!(target: "lumo.schedule", error = %err, "hardware_resync_failed");
                return;
            }
        };
        let applied = match self.apply_hardware(&schedules).await {
            Ok(ids) => ids,
            Err((ids, _)) => ids,
        };
        if !applied.is_empty() {
            let now_ms = self.clock.now().timestamp_millis();
            if let Err(err) = self
                .store
                .mark_applied(&self.config.device_id, &applied, now_ms)
                .await
            {
                warn!(target: "lumo.schedule", error = %err, "mark_applied_failed");
            }
        }
    }

    /// 清空并逐条写入；返回写入成功的调度 ID（失败时附带首个错误）
    async fn apply_hardware(
        &self,
        schedules: &[DailySchedule],
    ) -> Result<Vec<i64>, (Vec<i64>, String)> {
        if let Err(err) = self.actuator.clear_daily_schedules().await {
            warn!(target: "lumo.schedule", error = %err, "hardware_schedule_clear_failed");
            return Err((Vec::new(), err.to_string()));
        }
        let mut applied = Vec::with_capacity(schedules.len());
        let mut first_error = None;
        for schedule in schedules {
            match self.actuator.push_daily_schedule(schedule).await {
                Ok(()) => {
                    record_hardware_schedule_applied();
                    applied.push(schedule.id);
                }
                Err(err) => {
                    warn!(
                        target: "lumo.schedule",
                        schedule_id = schedule.id,
                        channel = schedule.channel_id,
                        error = %err,
                        "hardware_schedule_push_failed"
                    );
                    first_error.get_or_insert_with(|| err.to_string());
                }
            }
        }
        match first_error {
            None => Ok(applied),
            Some(err) => Err((applied, err)),
        }
    }

    async fn run_due_jobs(self: &Arc<Self>) -> usize {
        let Some(queue) = &self.queue else {
            return 0;
        };
        let now_ms = self.clock.now().timestamp_millis();
        let claimed = match tokio::time::timeout(
            self.config.queue_timeout,
            queue.claim_due(now_ms, self.config.claim_batch),
        )
        .await
        {
            Ok(Ok(jobs)) => jobs,
            Ok(Err(err)) => {
                record_queue_failure();
                warn!(target: "lumo.schedule", error = %err, "queue_claim_failed");
                return 0;
            }
            Err(_) => {
                record_queue_failure();
                warn!(target: "lumo.schedule", "queue_claim_timeout");
                return 0;
            }
        };
        let mut fired = 0;
        for job in claimed {
            if self.fallback.contains(&job.job_id) {
                // 队列故障期间已改由兜底定时器负责
                debug!(target: "lumo.schedule", job_id = %job.job_id, "durable_job_superseded");
                continue;
            }
            if self.fire(job).await {
                fired += 1;
            }
        }
        fired
    }

    /// 执行到期作业，并为仍启用的调度安排下一天的同一边沿。
    ///
    /// 全程持有该 `job_id` 的锁，同一边沿的并发更新、取消和另一条路径的触发排在其后。
    /// 返回是否实际执行了开关。
    async fn fire(self: &Arc<Self>, job: ScheduledJob) -> bool {
        let _guard = self.lock_job(&job.job_id).await;
        if let Some(reason) = self.begin_firing(&job) {
            debug!(
                target: "lumo.schedule",
                job_id = %job.job_id,
                due_at_ms = job.due_at_ms,
                reason = reason,
                "job_fire_skipped"
            );
            return false;
        }
        let Some(schedule) = self.load_active(&job).await else {
            return false;
        };

        let on = job.edge.switches_on();
        match self.actuator.switch_channel(schedule.channel_id, on).await {
            Ok(()) => {
                record_job_fired();
                info!(
                    target: "lumo.schedule",
                    job_id = %job.job_id,
                    channel = schedule.channel_id,
                    on = on,
                    "job_fired"
                );
            }
            Err(err) => {
                warn!(
                    target: "lumo.schedule",
                    job_id = %job.job_id,
                    channel = schedule.channel_id,
                    error = %err,
                    "job_fire_failed"
                );
            }
        }

        // 开关期间调度可能已被更新或停用，下一次按调度表中的最新内容计算
        let Some(current) = self.load_active(&job).await else {
            return true;
        };
        let now = self.clock.now();
        let after_fired = DateTime::from_timestamp_millis(job.due_at_ms.saturating_add(1_000))
            .map(|at| at.with_timezone(&Local))
            .unwrap_or(now);
        let base = now.max(after_fired);
        match Self::build_job(&current, job.edge, &base) {
            Ok(next) => {
                self.schedule_job_locked(next).await;
            }
            Err(err) => {
                warn!(
                    target: "lumo.schedule",
                    job_id = %job.job_id,
                    error = %err,
                    "job_reschedule_failed"
                );
            }
        }
        true
    }

    async fn load_active(&self, job: &ScheduledJob) -> Option<DailySchedule> {
        match self
            .store
            .find_schedule(&self.config.device_id, job.schedule_id)
            .await
        {
            Ok(Some(schedule)) if schedule.is_active => Some(schedule),
            Ok(_) => {
                info!(target: "lumo.schedule", job_id = %job.job_id, "job_stale_skipped");
                None
            }
            Err(err) => {
                warn!(
                    target: "lumo.schedule",
                    job_id = %job.job_id,
                    error = %err,
                    "job_schedule_lookup_failed"
                );
                None
            }
        }
    }
}
