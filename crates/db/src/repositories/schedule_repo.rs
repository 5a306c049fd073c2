//! Read-only repository over the schedule tables.
//!
//! The scheduler elsewhere owns these rows; the sync core only reads them
//! for conflict checks and event projection.

use chrono::NaiveDate;
use domain::Schedule;
use shared::types::{ScheduleId, UserId};
use sqlx::PgPool;

use crate::models::{assemble_schedules, ScheduleBlockRow, ScheduleRow};

pub struct ScheduleRepository;

impl ScheduleRepository {
    /// Schedule for one user and date, with blocks
    pub async fn find_by_user_and_date(
        pool: &PgPool,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<Option<Schedule>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ScheduleRow>(
            "SELECT id, user_id, date FROM schedules WHERE user_id = $1 AND date = $2",
        )
        .bind(user_id.as_uuid())
        .bind(date)
        .fetch_all(pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }
        let blocks = Self::blocks_for(pool, &rows).await?;
        Ok(assemble_schedules(rows, blocks).into_iter().next())
    }

    /// Schedules overlapping a date range, with blocks
    pub async fn find_by_user_date_range(
        pool: &PgPool,
        user_id: UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Schedule>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ScheduleRow>(
            r#"
            SELECT id, user_id, date FROM schedules
            WHERE user_id = $1 AND date >= $2 AND date <= $3
            ORDER BY date
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let blocks = Self::blocks_for(pool, &rows).await?;
        Ok(assemble_schedules(rows, blocks))
    }

    /// Schedule by id, with blocks
    pub async fn find_by_id(
        pool: &PgPool,
        id: ScheduleId,
    ) -> Result<Option<Schedule>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ScheduleRow>(
            "SELECT id, user_id, date FROM schedules WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_all(pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }
        let blocks = Self::blocks_for(pool, &rows).await?;
        Ok(assemble_schedules(rows, blocks).into_iter().next())
    }

    async fn blocks_for(
        pool: &PgPool,
        schedules: &[ScheduleRow],
    ) -> Result<Vec<ScheduleBlockRow>, sqlx::Error> {
        let ids: Vec<uuid::Uuid> = schedules.iter().map(|s| *s.id.as_uuid()).collect();
        sqlx::query_as::<_, ScheduleBlockRow>(
            r#"
            SELECT * FROM schedule_blocks
            WHERE schedule_id = ANY($1)
            ORDER BY start_time
            "#,
        )
        .bind(&ids)
        .fetch_all(pool)
        .await
    }
}
