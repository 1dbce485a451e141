//! Postgres 每日调度存储

use crate::error::StorageError;
use crate::traits::DailyScheduleStore;
use domain::{DailySchedule, DailyScheduleUpdate, NewDailySchedule};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const SELECT_COLUMNS: &str = "select id, device_id, channel_id, on_hour, on_minute, off_hour, \
     off_minute, is_active, last_applied_at_ms from daily_schedules";

pub struct PgDailyScheduleStore {
    pub pool: PgPool,
}

impl PgDailyScheduleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }

    /// 建表（幂等）
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            "create table if not exists daily_schedules ( \
               id bigserial primary key, \
               device_id text not null, \
               channel_id smallint not null, \
               on_hour smallint not null, \
               on_minute smallint not null, \
               off_hour smallint not null, \
               off_minute smallint not null, \
               is_active boolean not null default true, \
               last_applied_at_ms bigint, \
               created_at timestamptz not null default now(), \
               updated_at timestamptz not null default now())",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "create unique index if not exists uq_daily_schedules_active_channel \
             on daily_schedules (device_id, channel_id) where is_active",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn small_to_u8(row: &PgRow, column: &str) -> Result<u8, StorageError> {
    let value: i16 = row.try_get(column)?;
    u8::try_from(value).map_err(|_| StorageError::new(format!("{column} out of range: {value}")))
}

fn row_to_schedule(row: &PgRow) -> Result<DailySchedule, StorageError> {
    Ok(DailySchedule {
        id: row.try_get("id")?,
        device_id: row.try_get("device_id")?,
        channel_id: small_to_u8(row, "channel_id")?,
        on_hour: small_to_u8(row, "on_hour")?,
        on_minute: small_to_u8(row, "on_minute")?,
        off_hour: small_to_u8(row, "off_hour")?,
        off_minute: small_to_u8(row, "off_minute")?,
        is_active: row.try_get("is_active")?,
        last_applied_at_ms: row.try_get("last_applied_at_ms")?,
    })
}

fn rows_to_schedules(rows: Vec<PgRow>) -> Result<Vec<DailySchedule>, StorageError> {
    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        items.push(row_to_schedule(&row)?);
    }
    Ok(items)
}

#[async_trait::async_trait]
impl DailyScheduleStore for PgDailyScheduleStore {
    async fn list_schedules(&self, device_id: &str) -> Result<Vec<DailySchedule>, StorageError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} where device_id = $1 order by channel_id, id"
        ))
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;
        rows_to_schedules(rows)
    }

    async fn list_active_schedules(
        &self,
        device_id: &str,
    ) -> Result<Vec<DailySchedule>, StorageError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} where device_id = $1 and is_active order by channel_id, id"
        ))
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;
        rows_to_schedules(rows)
    }

    async fn find_schedule(
        &self,
        device_id: &str,
        schedule_id: i64,
    ) -> Result<Option<DailySchedule>, StorageError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} where device_id = $1 and id = $2"))
            .bind(device_id)
            .bind(schedule_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(row_to_schedule(&row)?))
    }

    async fn create_schedule(
        &self,
        schedule: NewDailySchedule,
    ) -> Result<DailySchedule, StorageError> {
        let row = sqlx::query(
            "insert into daily_schedules \
             (device_id, channel_id, on_hour, on_minute, off_hour, off_minute, is_active) \
             values ($1, $2, $3, $4, $5, $6, $7) \
             returning id, device_id, channel_id, on_hour, on_minute, off_hour, off_minute, \
             is_active, last_applied_at_ms",
        )
        .bind(&schedule.device_id)
        .bind(schedule.channel_id as i16)
        .bind(schedule.on_hour as i16)
        .bind(schedule.on_minute as i16)
        .bind(schedule.off_hour as i16)
        .bind(schedule.off_minute as i16)
        .bind(schedule.is_active)
        .fetch_one(&self.pool)
        .await?;
        row_to_schedule(&row)
    }

    async fn update_schedule(
        &self,
        device_id: &str,
        schedule_id: i64,
        update: DailyScheduleUpdate,
    ) -> Result<Option<DailySchedule>, StorageError> {
        let Some(existing) = self.find_schedule(device_id, schedule_id).await? else {
            return Ok(None);
        };
        let merged = update.apply_to(&existing);
        let row = sqlx::query(
            "update daily_schedules set on_hour = $3, on_minute = $4, off_hour = $5, \
             off_minute = $6, is_active = $7, updated_at = now() \
             where device_id = $1 and id = $2 \
             returning id, device_id, channel_id, on_hour, on_minute, off_hour, off_minute, \
             is_active, last_applied_at_ms",
        )
        .bind(device_id)
        .bind(schedule_id)
        .bind(merged.on_hour as i16)
        .bind(merged.on_minute as i16)
        .bind(merged.off_hour as i16)
        .bind(merged.off_minute as i16)
        .bind(merged.is_active)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(row_to_schedule(&row)?))
    }

    async fn delete_schedule(
        &self,
        device_id: &str,
        schedule_id: i64,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query("delete from daily_schedules where device_id = $1 and id = $2")
            .bind(device_id)
            .bind(schedule_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_applied(
        &self,
        device_id: &str,
        schedule_ids: &[i64],
        applied_at_ms: i64,
    ) -> Result<(), StorageError> {
        if schedule_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "update daily_schedules set last_applied_at_ms = $1 \
             where device_id = $2 and id = any($3)",
        )
        .bind(applied_at_ms)
        .bind(device_id)
        .bind(schedule_ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
