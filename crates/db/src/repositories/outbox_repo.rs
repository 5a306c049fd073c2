//! Transactional outbox for domain events.
//!
//! Messages are written in the same transaction as the state change they
//! describe; an external dispatcher drains them with at-least-once
//! delivery.

use chrono::{DateTime, Utc};
use shared::types::MessageId;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::OutboxMessage;

pub struct OutboxRepository;

impl OutboxRepository {
    /// Stage a batch of messages inside the caller's transaction
    pub async fn save_batch(
        tx: &mut Transaction<'_, Postgres>,
        messages: &[OutboxMessage],
    ) -> Result<(), sqlx::Error> {
        for message in messages {
            sqlx::query(
                r#"
                INSERT INTO outbox_messages (id, routing_key, payload, created_at)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(message.id.as_uuid())
            .bind(&message.routing_key)
            .bind(&message.payload)
            .bind(message.created_at)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    /// Undispatched messages in publication order, for the dispatcher
    pub async fn fetch_undispatched(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<OutboxMessage>, sqlx::Error> {
        sqlx::query_as::<_, OutboxMessage>(
            r#"
            SELECT * FROM outbox_messages
            WHERE dispatched_at IS NULL
            ORDER BY created_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Mark messages as handed to the broker
    pub async fn mark_dispatched(
        pool: &PgPool,
        ids: &[MessageId],
        dispatched_at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let uuids: Vec<uuid::Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let result = sqlx::query(
            r#"
            UPDATE outbox_messages
            SET dispatched_at = $2
            WHERE id = ANY($1) AND dispatched_at IS NULL
            "#,
        )
        .bind(&uuids)
        .bind(dispatched_at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
