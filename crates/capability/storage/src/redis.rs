//! Redis 持久作业队列
//!
//! 两个键配合使用：
//! - `<ns>:jobs:due`：有序集合，成员为 job_id，分值为到期毫秒时间戳
//! - `<ns>:jobs:payload`：哈希，job_id -> JSON 作业内容
//!
//! 认领在一个 Lua 脚本内完成（取到期成员、移出有序集合、取出并删除内容），
//! 与同 ID 的入队、取消互不交错；多个 worker 并发轮询时同一作业只会被执行一次。

use crate::error::StorageError;
use crate::traits::DurableJobQueue;
use domain::{ScheduleEdge, ScheduledJob};

/// KEYS[1] 到期集合，KEYS[2] 内容哈希，ARGV[1] 当前毫秒，ARGV[2] 数量上限。
/// 返回 `[job_id, payload, ...]`，内容缺失时 payload 为空串。
const CLAIM_DUE_SCRIPT: &str = r#"
local ids = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, tonumber(ARGV[2]))
local claimed = {}
for _, id in ipairs(ids) do
  redis.call('ZREM', KEYS[1], id)
  local payload = redis.call('HGET', KEYS[2], id)
  redis.call('HDEL', KEYS[2], id)
  table.insert(claimed, id)
  table.insert(claimed, payload or '')
end
return claimed
"#;

#[derive(serde::Serialize, serde::Deserialize)]
struct JobPayload {
    job_id: String,
    schedule_id: i64,
    channel_id: u8,
    edge: String,
    due_at_ms: i64,
}

impl JobPayload {
    fn from_job(job: &ScheduledJob) -> Self {
        Self {
            job_id: job.job_id.clone(),
            schedule_id: job.schedule_id,
            channel_id: job.channel_id,
            edge: job.edge.as_str().to_string(),
            due_at_ms: job.due_at_ms,
        }
    }

    fn into_job(self) -> Result<ScheduledJob, StorageError> {
        let edge = ScheduleEdge::parse(&self.edge)
            .ok_or_else(|| StorageError::new(format!("unknown edge: {}", self.edge)))?;
        Ok(ScheduledJob {
            job_id: self.job_id,
            schedule_id: self.schedule_id,
            channel_id: self.channel_id,
            edge,
            due_at_ms: self.due_at_ms,
        })
    }
}

/// Redis 作业队列
pub struct RedisJobQueue {
    client: redis::Client,
    due_key: String,
    payload_key: String,
}

impl RedisJobQueue {
    pub fn new(client: redis::Client, namespace: &str) -> Self {
        Self {
            client,
            due_key: format!("{namespace}:jobs:due"),
            payload_key: format!("{namespace}:jobs:payload"),
        }
    }

    pub fn connect(redis_url: &str, namespace: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self::new(client, namespace))
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StorageError> {
        Ok(self.client.get_multiplexed_tokio_connection().await?)
    }
}

#[async_trait::async_trait]
impl DurableJobQueue for RedisJobQueue {
    async fn enqueue(&self, job: &ScheduledJob) -> Result<(), StorageError> {
        let mut connection = self.connection().await?;
        let data = serde_json::to_string(&JobPayload::from_job(job))
            .map_err(|err| StorageError::new(err.to_string()))?;
        let _: () = redis::pipe()
            .atomic()
            .zadd(&self.due_key, &job.job_id, job.due_at_ms)
            .ignore()
            .hset(&self.payload_key, &job.job_id, data)
            .ignore()
            .query_async(&mut connection)
            .await?;
        Ok(())
    }

    async fn cancel(&self, job_id: &str) -> Result<bool, StorageError> {
        let mut connection = self.connection().await?;
        let (removed, _): (i64, i64) = redis::pipe()
            .atomic()
            .zrem(&self.due_key, job_id)
            .hdel(&self.payload_key, job_id)
            .query_async(&mut connection)
            .await?;
        Ok(removed > 0)
    }

    async fn claim_due(
        &self,
        now_ms: i64,
        limit: usize,
    ) -> Result<Vec<ScheduledJob>, StorageError> {
        let mut connection = self.connection().await?;
        let claimed: Vec<String> = redis::Script::new(CLAIM_DUE_SCRIPT)
            .key(&self.due_key)
            .key(&self.payload_key)
            .arg(now_ms)
            .arg(limit)
            .invoke_async(&mut connection)
            .await?;
        decode_claimed(claimed)
    }
}

/// 解析认领脚本返回的 `[job_id, payload, ...]`
fn decode_claimed(claimed: Vec<String>) -> Result<Vec<ScheduledJob>, StorageError> {
    let mut jobs = Vec::with_capacity(claimed.len() / 2);
    let mut entries = claimed.into_iter();
    while let (Some(job_id), Some(data)) = (entries.next(), entries.next()) {
        if data.is_empty() {
            tracing::warn!(target: "lumo.schedule", job_id = %job_id, "job_payload_missing");
            continue;
        }
        let payload: JobPayload =
            serde_json::from_str(&data).map_err(|err| StorageError::new(err.to_string()))?;
        jobs.push(payload.into_job()?);
    }
    Ok(jobs)
}
