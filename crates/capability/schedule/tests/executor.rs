use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, TimeZone};
use domain::{DailySchedule, DailyScheduleUpdate, NewDailySchedule, ScheduledJob};
use lumo_control::ControlError;
use lumo_protocol::LinkError;
use lumo_schedule::{ChannelActuator, Clock, ExecutorConfig, ScheduleError, ScheduleExecutor};
use lumo_storage::{
    DailyScheduleStore, DurableJobQueue, InMemoryDailyScheduleStore, InMemoryJobQueue,
    StorageError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

fn local(day: u32, hour: u32, minute: u32, second: u32, millis: i64) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2026, 7, day, hour, minute, second)
        .single()
        .expect("local time")
        + TimeDelta::milliseconds(millis)
}

struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    fn new(now: DateTime<Local>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    fn set(&self, now: DateTime<Local>) {
        *self.now.lock().expect("lock") = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().expect("lock")
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Switch(u8, bool),
    Push(u8, u8, u8, u8, u8),
    Clear,
}

struct RecordingActuator {
    actions: Mutex<Vec<Action>>,
    notify: mpsc::UnboundedSender<Action>,
    hardware_down: AtomicBool,
    /// 关闭时开关动作记录后停在原地，直到重新打开
    gate: watch::Sender<bool>,
}

impl RecordingActuator {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Action>) {
        let (notify, rx) = mpsc::unbounded_channel();
        let actuator = Arc::new(Self {
            actions: Mutex::new(Vec::new()),
            notify,
            hardware_down: AtomicBool::new(false),
            gate: watch::channel(true).0,
        });
        (actuator, rx)
    }

    fn record(&self, action: Action) {
        self.actions.lock().expect("lock").push(action.clone());
        let _ = self.notify.send(action);
    }

    fn actions(&self) -> Vec<Action> {
        self.actions.lock().expect("lock").clone()
    }

    fn clear_log(&self) {
        self.actions.lock().expect("lock").clear();
    }

    fn close_gate(&self) {
        self.gate.send_replace(false);
    }

    fn open_gate(&self) {
        self.gate.send_replace(true);
    }

    fn hardware_result(&self) -> Result<(), ControlError> {
        if self.hardware_down.load(Ordering::SeqCst) {
            Err(ControlError::Link(LinkError::Lost))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChannelActuator for RecordingActuator {
    async fn switch_channel(&self, channel: u8, on: bool) -> Result<(), ControlError> {
        self.record(Action::Switch(channel, on));
        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
        Ok(())
    }

    async fn push_daily_schedule(&self, schedule: &DailySchedule) -> Result<(), ControlError> {
        self.hardware_result()?;
        self.record(Action::Push(
            schedule.channel_id,
            schedule.on_hour,
            schedule.on_minute,
            schedule.off_hour,
            schedule.off_minute,
        ));
        Ok(())
    }

    async fn clear_daily_schedules(&self) -> Result<(), ControlError> {
        self.hardware_result()?;
        self.record(Action::Clear);
        Ok(())
    }

    fn channel_count(&self) -> u8 {
        3
    }
}

/// 操作可以挂起的队列；挂起的入队仍会先写入底层队列，即超时后实际已成功的写入
struct StallingQueue {
    inner: InMemoryJobQueue,
    stall_enqueue: AtomicBool,
    stall_claim: AtomicBool,
}

impl StallingQueue {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryJobQueue::new(),
            stall_enqueue: AtomicBool::new(false),
            stall_claim: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl DurableJobQueue for StallingQueue {
    async fn enqueue(&self, job: &ScheduledJob) -> Result<(), StorageError> {
        self.inner.enqueue(job).await?;
        if self.stall_enqueue.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn cancel(&self, job_id: &str) -> Result<bool, StorageError> {
        self.inner.cancel(job_id).await
    }

    async fn claim_due(
        &self,
        now_ms: i64,
        limit: usize,
    ) -> Result<Vec<ScheduledJob>, StorageError> {
        if self.stall_claim.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.inner.claim_due(now_ms, limit).await
    }
}

struct Harness {
    store: Arc<InMemoryDailyScheduleStore>,
    queue: Arc<InMemoryJobQueue>,
    actuator: Arc<RecordingActuator>,
    actions: mpsc::UnboundedReceiver<Action>,
    clock: Arc<ManualClock>,
    executor: ScheduleExecutor,
}

fn config() -> ExecutorConfig {
    ExecutorConfig {
        device_id: "controller-1".to_string(),
        queue_timeout: Duration::from_millis(200),
        poll_interval: Duration::from_millis(20),
        claim_batch: 8,
    }
}

fn harness(now: DateTime<Local>) -> Harness {
    let store = Arc::new(InMemoryDailyScheduleStore::new());
    let queue = Arc::new(InMemoryJobQueue::new());
    let (actuator, actions) = RecordingActuator::new();
    let clock = ManualClock::new(now);
    let executor = ScheduleExecutor::new(
        store.clone(),
        Some(queue.clone() as Arc<dyn DurableJobQueue>),
        actuator.clone(),
        clock.clone(),
        config(),
    );
    Harness {
        store,
        queue,
        actuator,
        actions,
        clock,
        executor,
    }
}

fn daily(channel_id: u8, on: (u8, u8), off: (u8, u8)) -> NewDailySchedule {
    NewDailySchedule {
        device_id: "controller-1".to_string(),
        channel_id,
        on_hour: on.0,
        on_minute: on.1,
        off_hour: off.0,
        off_minute: off.1,
        is_active: true,
    }
}

async fn wait_for_switch(actions: &mut mpsc::UnboundedReceiver<Action>) -> Action {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let action = actions.recv().await.expect("open");
            if matches!(action, Action::Switch(..)) {
                return action;
            }
        }
    })
    .await
    .expect("switch fired")
}

#[tokio::test]
async fn create_enqueues_both_edges_on_durable_queue() {
    let h = harness(local(1, 7, 0, 0, 0));
    let created = h
        .executor
        .create_schedule(daily(2, (8, 0), (20, 0)))
        .await
        .expect("create");

    let pending = h.queue.pending();
    let ids: Vec<&str> = pending.iter().map(|job| job.job_id.as_str()).collect();
    assert_eq!(ids, vec!["2-on-1", "2-off-1"]);
    assert_eq!(pending[0].due_at_ms, local(1, 8, 0, 0, 0).timestamp_millis());
    assert_eq!(pending[1].due_at_ms, local(1, 20, 0, 0, 0).timestamp_millis());
    assert!(h.executor.pending_fallback_jobs().is_empty());

    assert_eq!(h.actuator.actions(), vec![Action::Push(2, 8, 0, 20, 0)]);
    let stored = h
        .store
        .find_schedule("controller-1", created.id)
        .await
        .expect("find")
        .expect("exists");
    assert!(stored.last_applied_at_ms.is_some());
}

#[tokio::test]
async fn queue_outage_falls_back_to_timers_and_survives_restart() {
    let mut h = harness(local(1, 7, 59, 59, 850));
    h.queue.set_available(false);

    h.executor
        .create_schedule(daily(2, (8, 0), (20, 0)))
        .await
        .expect("create");
    let pending = h.executor.pending_fallback_jobs();
    assert_eq!(pending.len(), 2);
    assert!(h.queue.pending().is_empty());
    // 控制器 RTC 路径同样收到调度
    assert_eq!(h.actuator.actions(), vec![Action::Push(2, 8, 0, 20, 0)]);

    assert_eq!(wait_for_switch(&mut h.actions).await, Action::Switch(2, true));

    // 触发后安排到第二天 08:00
    let tomorrow_on = local(2, 8, 0, 0, 0).timestamp_millis();
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            let rescheduled = h
                .executor
                .pending_fallback_jobs()
                .into_iter()
                .any(|job| job.job_id == "2-on-1" && job.due_at_ms == tomorrow_on);
            if rescheduled {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("rescheduled");
    h.executor.shutdown();
    assert!(h.executor.pending_fallback_jobs().is_empty());

    // 08:05 重启：从调度表重建
    h.clock.set(local(1, 8, 5, 0, 0));
    let restarted = ScheduleExecutor::new(
        h.store.clone(),
        Some(h.queue.clone() as Arc<dyn DurableJobQueue>),
        h.actuator.clone(),
        h.clock.clone(),
        config(),
    );
    let report = restarted.restore_from_store().await.expect("restore");
    assert_eq!(report.schedules, 1);
    assert_eq!(report.fallback_jobs, 2);
    let jobs = restarted.pending_fallback_jobs();
    let on = jobs.iter().find(|job| job.job_id == "2-on-1").expect("on");
    let off = jobs.iter().find(|job| job.job_id == "2-off-1").expect("off");
    assert_eq!(on.due_at_ms, tomorrow_on);
    assert_eq!(off.due_at_ms, local(1, 20, 0, 0, 0).timestamp_millis());
    restarted.shutdown();
}

#[tokio::test]
async fn updates_replace_jobs_without_duplicates() {
    let h = harness(local(1, 6, 0, 0, 0));
    h.queue.set_available(false);
    let created = h
        .executor
        .create_schedule(daily(1, (8, 0), (20, 0)))
        .await
        .expect("create");

    for on_hour in [9, 10] {
        h.executor
            .update_schedule(
                created.id,
                DailyScheduleUpdate {
                    on_hour: Some(on_hour),
                    ..Default::default()
                },
            )
            .await
            .expect("update");
    }
    let jobs = h.executor.pending_fallback_jobs();
    assert_eq!(jobs.len(), 2);
    let on = jobs.iter().find(|job| job.job_id == "1-on-1").expect("on");
    assert_eq!(on.due_at_ms, local(1, 10, 0, 0, 0).timestamp_millis());

    // 队列恢复后由持久队列接管，本地定时器撤销
    h.queue.set_available(true);
    h.executor
        .update_schedule(created.id, DailyScheduleUpdate::default())
        .await
        .expect("update");
    assert!(h.executor.pending_fallback_jobs().is_empty());
    assert_eq!(h.queue.pending().len(), 2);

    // 停用即取消
    h.executor
        .update_schedule(
            created.id,
            DailyScheduleUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .expect("deactivate");
    assert!(h.queue.pending().is_empty());
    h.executor.shutdown();
}

#[tokio::test]
async fn delete_proceeds_when_queue_is_unreachable() {
    let h = harness(local(1, 7, 0, 0, 0));
    let created = h
        .executor
        .create_schedule(daily(2, (8, 0), (20, 0)))
        .await
        .expect("create");
    h.actuator.clear_log();

    h.queue.set_available(false);
    let deleted = h.executor.delete_schedule(created.id).await.expect("delete");
    assert_eq!(deleted.id, created.id);
    assert!(h.store.list_schedules("controller-1").await.expect("list").is_empty());
    assert!(h.executor.pending_fallback_jobs().is_empty());
    // 控制器上的调度被整体清除
    assert_eq!(h.actuator.actions(), vec![Action::Clear]);

    // 残留在队列里的作业到期后被识别为过期，不再开关通道
    h.queue.set_available(true);
    h.clock.set(local(1, 20, 0, 1, 0));
    h.executor.run_due_jobs().await;
    assert!(
        !h.actuator
            .actions()
            .iter()
            .any(|action| matches!(action, Action::Switch(..)))
    );
    assert!(h.queue.pending().is_empty());

    let err = h.executor.delete_schedule(created.id).await.unwrap_err();
    assert!(matches!(err, ScheduleError::NotFound(id) if id == created.id));
}

#[tokio::test]
async fn durable_job_fires_and_reenqueues_next_day() {
    let h = harness(local(1, 7, 0, 0, 0));
    h.executor
        .create_schedule(daily(2, (8, 0), (20, 0)))
        .await
        .expect("create");

    h.clock.set(local(1, 8, 0, 0, 500));
    assert_eq!(h.executor.run_due_jobs().await, 1);
    assert!(h.actuator.actions().contains(&Action::Switch(2, true)));

    let pending = h.queue.pending();
    let on = pending.iter().find(|job| job.job_id == "2-on-1").expect("on");
    let off = pending.iter().find(|job| job.job_id == "2-off-1").expect("off");
    assert_eq!(on.due_at_ms, local(2, 8, 0, 0, 0).timestamp_millis());
    assert_eq!(off.due_at_ms, local(1, 20, 0, 0, 0).timestamp_millis());
}

#[tokio::test]
async fn queue_worker_polls_until_shutdown() {
    let mut h = harness(local(1, 7, 0, 0, 0));
    h.executor
        .create_schedule(daily(0, (7, 30), (22, 0)))
        .await
        .expect("create");
    h.clock.set(local(1, 22, 0, 0, 0));

    let worker = h.executor.spawn_queue_worker().expect("worker");
    let first = wait_for_switch(&mut h.actions).await;
    let second = wait_for_switch(&mut h.actions).await;
    let mut fired = vec![first, second];
    fired.sort_by_key(|action| format!("{action:?}"));
    assert_eq!(fired, vec![Action::Switch(0, false), Action::Switch(0, true)]);

    h.executor.shutdown();
    tokio::time::timeout(Duration::from_secs(1), worker)
        .await
        .expect("stopped")
        .expect("join");
}

#[tokio::test]
async fn apply_all_clears_then_pushes_every_active_schedule() {
    let h = harness(local(1, 7, 0, 0, 0));
    h.executor
        .create_schedule(daily(0, (6, 0), (7, 0)))
        .await
        .expect("create");
    h.executor
        .create_schedule(daily(1, (22, 0), (6, 0)))
        .await
        .expect("create");
    h.actuator.clear_log();

    let report = h.executor.apply_all_schedules().await.expect("apply");
    assert_eq!(report.schedules, 2);
    assert_eq!(report.hardware_applied, 2);
    assert_eq!(report.hardware_error, None);
    assert_eq!(report.durable_jobs, 4);
    assert_eq!(report.fallback_jobs, 0);
    assert_eq!(
        h.actuator.actions(),
        vec![
            Action::Clear,
            Action::Push(0, 6, 0, 7, 0),
            Action::Push(1, 22, 0, 6, 0),
        ]
    );
    assert_eq!(h.queue.pending().len(), 4);

    // 控制器不可达时主机侧作业照常安排
    h.actuator.hardware_down.store(true, Ordering::SeqCst);
    h.queue.set_available(false);
    let report = h.executor.apply_all_schedules().await.expect("apply");
    assert_eq!(report.hardware_applied, 0);
    assert!(report.hardware_error.is_some());
    assert_eq!(report.fallback_jobs, 4);
    h.executor.shutdown();
}

#[tokio::test]
async fn invalid_and_conflicting_schedules_are_rejected() {
    let h = harness(local(1, 7, 0, 0, 0));
    let err = h
        .executor
        .create_schedule(daily(5, (8, 0), (20, 0)))
        .await
        .unwrap_err();
    assert!(matches!(err, ScheduleError::InvalidChannel(5)));
    let err = h
        .executor
        .create_schedule(daily(0, (24, 0), (20, 0)))
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert!(h.store.list_schedules("controller-1").await.expect("list").is_empty());

    h.executor
        .create_schedule(daily(0, (8, 0), (20, 0)))
        .await
        .expect("create");
    let err = h
        .executor
        .create_schedule(daily(0, (9, 0), (21, 0)))
        .await
        .unwrap_err();
    assert!(matches!(err, ScheduleError::Conflict(_)));
    assert_eq!(h.queue.pending().len(), 2);
}

#[tokio::test]
async fn currently_active_follows_wall_clock() {
    let h = harness(local(1, 23, 30, 0, 0));
    let overnight = h
        .executor
        .create_schedule(daily(1, (22, 0), (6, 0)))
        .await
        .expect("create");
    assert!(h.executor.is_currently_active(&overnight));
    h.clock.set(local(1, 12, 0, 0, 0));
    assert!(!h.executor.is_currently_active(&overnight));
}

#[tokio::test]
async fn update_during_switch_keeps_the_new_due_time() {
    let mut h = harness(local(1, 7, 0, 0, 0));
    let created = h
        .executor
        .create_schedule(daily(2, (8, 0), (20, 0)))
        .await
        .expect("create");
    h.actuator.close_gate();
    h.clock.set(local(1, 8, 0, 0, 0));

    let run = {
        let executor = h.executor.clone();
        tokio::spawn(async move { executor.run_due_jobs().await })
    };
    assert_eq!(wait_for_switch(&mut h.actions).await, Action::Switch(2, true));

    let update = {
        let executor = h.executor.clone();
        tokio::spawn(async move {
            executor
                .update_schedule(
                    created.id,
                    DailyScheduleUpdate {
                        on_hour: Some(9),
                        ..Default::default()
                    },
                )
                .await
        })
    };
    // 更新写入调度表后再放行开关
    tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            let stored = h
                .store
                .find_schedule("controller-1", created.id)
                .await
                .expect("find")
                .expect("exists");
            if stored.on_hour == 9 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("updated");
    h.actuator.open_gate();

    assert_eq!(run.await.expect("join"), 1);
    update.await.expect("join").expect("update");

    let pending = h.queue.pending();
    assert_eq!(pending.len(), 2);
    let on = pending.iter().find(|job| job.job_id == "2-on-1").expect("on");
    assert_eq!(on.due_at_ms, local(1, 9, 0, 0, 0).timestamp_millis());
}

#[tokio::test]
async fn stalled_queue_fails_over_and_fires_each_edge_once() {
    let store = Arc::new(InMemoryDailyScheduleStore::new());
    let queue = StallingQueue::new();
    let (actuator, mut actions) = RecordingActuator::new();
    let clock = ManualClock::new(local(1, 7, 59, 59, 700));
    let executor = ScheduleExecutor::new(
        store,
        Some(queue.clone() as Arc<dyn DurableJobQueue>),
        actuator.clone(),
        clock.clone(),
        config(),
    );
    queue.stall_enqueue.store(true, Ordering::SeqCst);
    actuator.close_gate();

    let started = Instant::now();
    executor
        .create_schedule(daily(2, (8, 0), (20, 0)))
        .await
        .expect("create");
    let elapsed = started.elapsed();
    // 每条边沿只等一个队列超时
    assert!(elapsed >= Duration::from_millis(400), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
    assert_eq!(executor.pending_fallback_jobs().len(), 2);
    // 超时的写入实际已落到队列，两条路径各有一份
    assert_eq!(queue.inner.pending().len(), 2);

    assert_eq!(wait_for_switch(&mut actions).await, Action::Switch(2, true));

    // 兜底定时器开关期间，worker 认领到同一边沿的持久副本
    clock.set(local(1, 8, 0, 0, 500));
    let run = {
        let executor = executor.clone();
        tokio::spawn(async move { executor.run_due_jobs().await })
    };
    tokio::time::timeout(Duration::from_secs(1), async {
        while queue.inner.pending().len() != 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("claimed");
    actuator.open_gate();

    assert_eq!(run.await.expect("join"), 0);
    let switches = actuator
        .actions()
        .into_iter()
        .filter(|action| matches!(action, Action::Switch(..)))
        .count();
    assert_eq!(switches, 1);

    // 认领同样受队列超时约束
    queue.stall_claim.store(true, Ordering::SeqCst);
    let started = Instant::now();
    assert_eq!(executor.run_due_jobs().await, 0);
    assert!(started.elapsed() < Duration::from_secs(1));
    executor.shutdown();
}
