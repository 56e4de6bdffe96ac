use chrono::Utc;
use sqlx::Row;

use tailor_core::domain::schedule::{DayAvailability, Schedule, TailorId, DAYS_PER_WEEK};

use super::{RepositoryError, ScheduleRepository};
use crate::DbPool;

pub struct SqlScheduleRepository {
    pool: DbPool,
}

impl SqlScheduleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_schedule(row: &sqlx::sqlite::SqliteRow) -> Result<Schedule, RepositoryError> {
    let tailor_id: String =
        row.try_get("tailor_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let per_day_json: String =
        row.try_get("per_day").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let slot_duration: i64 =
        row.try_get("slot_duration_minutes").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let buffer: i64 =
        row.try_get("buffer_minutes").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let advance: i64 =
        row.try_get("advance_booking_days").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let per_day: Vec<DayAvailability> = serde_json::from_str(&per_day_json)
        .map_err(|e| RepositoryError::Decode(format!("per_day: {e}")))?;
    let per_day: [DayAvailability; DAYS_PER_WEEK] = per_day
        .try_into()
        .map_err(|_| RepositoryError::Decode("per_day must hold seven entries".to_string()))?;

    Ok(Schedule {
        tailor_id: TailorId(tailor_id),
        per_day,
        slot_duration_minutes: decode_u16("slot_duration_minutes", slot_duration)?,
        buffer_minutes: decode_u16("buffer_minutes", buffer)?,
        advance_booking_days: decode_u16("advance_booking_days", advance)?,
    })
}

fn decode_u16(column: &str, value: i64) -> Result<u16, RepositoryError> {
    u16::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("{column} out of range: {value}")))
}

#[async_trait::async_trait]
impl ScheduleRepository for SqlScheduleRepository {
    async fn find_by_tailor(&self, id: &TailorId) -> Result<Option<Schedule>, RepositoryError> {
        let row = sqlx::query(
            "SELECT tailor_id, per_day, slot_duration_minutes, buffer_minutes,
                    advance_booking_days
             FROM tailor_schedule WHERE tailor_id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_schedule(r)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, schedule: &Schedule) -> Result<(), RepositoryError> {
        let per_day_json = serde_json::to_string(&schedule.per_day)
            .map_err(|e| RepositoryError::Decode(format!("per_day: {e}")))?;

        sqlx::query(
            "INSERT INTO tailor_schedule (tailor_id, per_day, slot_duration_minutes,
                                          buffer_minutes, advance_booking_days, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(tailor_id) DO UPDATE SET
                 per_day = excluded.per_day,
                 slot_duration_minutes = excluded.slot_duration_minutes,
                 buffer_minutes = excluded.buffer_minutes,
                 advance_booking_days = excluded.advance_booking_days,
                 updated_at = excluded.updated_at",
        )
        .bind(&schedule.tailor_id.0)
        .bind(&per_day_json)
        .bind(i64::from(schedule.slot_duration_minutes))
        .bind(i64::from(schedule.buffer_minutes))
        .bind(i64::from(schedule.advance_booking_days))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tailor_core::domain::schedule::{DayAvailability, Schedule, TailorId, TimeWindow};

    use super::SqlScheduleRepository;
    use crate::repositories::ScheduleRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_schedule(tailor_id: &str) -> Schedule {
        let mut schedule = Schedule::closed(TailorId(tailor_id.to_string()));
        schedule.per_day[0] = DayAvailability {
            is_open: true,
            windows: vec![TimeWindow { start: 540, end: 720 }],
        };
        schedule.slot_duration_minutes = 60;
        schedule.advance_booking_days = 30;
        schedule
    }

    #[tokio::test]
    async fn upsert_and_find_round_trip() {
        let pool = setup().await;
        let repo = SqlScheduleRepository::new(pool);
        let schedule = sample_schedule("tailor-1");

        repo.upsert(&schedule).await.expect("upsert");
        let found = repo
            .find_by_tailor(&TailorId("tailor-1".to_string()))
            .await
            .expect("find")
            .expect("should exist");

        assert_eq!(found, schedule);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_schedule() {
        let pool = setup().await;
        let repo = SqlScheduleRepository::new(pool);

        repo.upsert(&sample_schedule("tailor-1")).await.expect("first upsert");

        let mut updated = sample_schedule("tailor-1");
        updated.slot_duration_minutes = 45;
        updated.per_day[2] = DayAvailability {
            is_open: true,
            windows: vec![TimeWindow { start: 600, end: 900 }],
        };
        repo.upsert(&updated).await.expect("second upsert");

        let found = repo
            .find_by_tailor(&TailorId("tailor-1".to_string()))
            .await
            .expect("find")
            .expect("should exist");
        assert_eq!(found.slot_duration_minutes, 45);
        assert!(found.per_day[2].is_open);
    }

    #[tokio::test]
    async fn missing_schedule_yields_none() {
        let pool = setup().await;
        let repo = SqlScheduleRepository::new(pool);

        let found =
            repo.find_by_tailor(&TailorId("tailor-missing".to_string())).await.expect("find");
        assert!(found.is_none());
    }
}
