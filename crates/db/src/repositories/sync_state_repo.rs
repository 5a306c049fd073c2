//! Repository for per-calendar sync state

use chrono::{DateTime, Utc};
use domain::SyncState;
use shared::types::UserId;
use sqlx::PgPool;

use crate::models::SyncStateRow;

pub struct SyncStateRepository;

impl SyncStateRepository {
    /// Insert or update the sync state for (user, external calendar)
    pub async fn upsert(pool: &PgPool, state: &SyncState) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO calendar_sync_state (
                id, user_id, external_calendar_id, provider, sync_token,
                last_synced_at, last_sync_hash, sync_errors, last_error,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (user_id, external_calendar_id) DO UPDATE
            SET sync_token = EXCLUDED.sync_token,
                last_synced_at = EXCLUDED.last_synced_at,
                last_sync_hash = EXCLUDED.last_sync_hash,
                sync_errors = EXCLUDED.sync_errors,
                last_error = EXCLUDED.last_error,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(state.id.as_uuid())
        .bind(state.user_id.as_uuid())
        .bind(&state.external_calendar_id)
        .bind(state.provider)
        .bind(&state.sync_token)
        .bind(state.last_synced_at)
        .bind(&state.last_sync_hash)
        .bind(state.consecutive_errors)
        .bind(&state.last_error)
        .bind(state.created_at)
        .bind(state.updated_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Find the sync state for one calendar
    pub async fn find_by_calendar(
        pool: &PgPool,
        user_id: UserId,
        external_calendar_id: &str,
    ) -> Result<Option<SyncStateRow>, sqlx::Error> {
        sqlx::query_as::<_, SyncStateRow>(
            r#"
            SELECT * FROM calendar_sync_state
            WHERE user_id = $1 AND external_calendar_id = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(external_calendar_id)
        .fetch_optional(pool)
        .await
    }

    /// Calendars due for an import cycle: never synced or synced before the
    /// cutoff, still under the error threshold, oldest first.
    pub async fn find_pending(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
        max_errors: i32,
        limit: i64,
    ) -> Result<Vec<SyncStateRow>, sqlx::Error> {
        sqlx::query_as::<_, SyncStateRow>(
            r#"
            SELECT * FROM calendar_sync_state
            WHERE (last_synced_at IS NULL OR last_synced_at < $1)
              AND sync_errors < $2
            ORDER BY last_synced_at NULLS FIRST
            LIMIT $3
            "#,
        )
        .bind(cutoff)
        .bind(max_errors)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Delete the sync state rows for a user's calendar
    pub async fn delete_by_calendar(
        pool: &PgPool,
        user_id: UserId,
        external_calendar_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM calendar_sync_state
            WHERE user_id = $1 AND external_calendar_id = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(external_calendar_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
