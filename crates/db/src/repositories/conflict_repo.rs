//! Repository for recorded calendar conflicts

use domain::{Conflict, ConflictStatus};
use shared::types::{ConflictId, UserId};
use sqlx::PgPool;

use crate::models::ConflictRow;

pub struct ConflictRepository;

impl ConflictRepository {
    /// Persist a detected conflict
    pub async fn insert(pool: &PgPool, conflict: &Conflict) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO calendar_conflicts (
                id, user_id, kind, block_id, block_title, block_start,
                block_end, external_event_id, external_start, external_end,
                status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(conflict.id.as_uuid())
        .bind(conflict.user_id.as_uuid())
        .bind(conflict.kind.to_string())
        .bind(conflict.block_id.as_uuid())
        .bind(&conflict.block_title)
        .bind(conflict.block_range.start)
        .bind(conflict.block_range.end)
        .bind(&conflict.external_event_id)
        .bind(conflict.external_range.start)
        .bind(conflict.external_range.end)
        .bind(conflict.status.to_string())
        .bind(conflict.created_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Conflicts for a user in a given status, newest first
    pub async fn find_by_user_status(
        pool: &PgPool,
        user_id: UserId,
        status: ConflictStatus,
    ) -> Result<Vec<ConflictRow>, sqlx::Error> {
        sqlx::query_as::<_, ConflictRow>(
            r#"
            SELECT * FROM calendar_conflicts
            WHERE user_id = $1 AND status = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(status.to_string())
        .fetch_all(pool)
        .await
    }

    /// Move a conflict to a new status
    pub async fn update_status(
        pool: &PgPool,
        id: ConflictId,
        user_id: UserId,
        status: ConflictStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE calendar_conflicts
            SET status = $3
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(status.to_string())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
