//! Repository for connected calendars

use domain::ConnectedCalendar;
use shared::types::{CalendarId, ProviderKind, UserId};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::ConnectedCalendarRow;

pub struct CalendarRepository;

impl CalendarRepository {
    /// Insert a freshly connected calendar. Stores version 1.
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        calendar: &ConnectedCalendar,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO connected_calendars (
                id, user_id, provider, external_calendar_id, name,
                is_primary, is_enabled, sync_push, sync_pull, config,
                last_sync_at, created_at, updated_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 1)
            "#,
        )
        .bind(calendar.id().as_uuid())
        .bind(calendar.user_id().as_uuid())
        .bind(calendar.provider())
        .bind(calendar.external_calendar_id())
        .bind(calendar.name())
        .bind(calendar.is_primary())
        .bind(calendar.is_enabled())
        .bind(calendar.sync_push())
        .bind(calendar.sync_pull())
        .bind(Json(calendar.config().clone()))
        .bind(calendar.last_sync_at())
        .bind(calendar.created_at())
        .bind(calendar.updated_at())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Update a calendar, gated on its loaded version.
    ///
    /// Returns `false` when the stored version no longer matches, meaning a
    /// concurrent writer got there first.
    pub async fn update(
        tx: &mut Transaction<'_, Postgres>,
        calendar: &ConnectedCalendar,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE connected_calendars
            SET name = $3, is_primary = $4, is_enabled = $5, sync_push = $6,
                sync_pull = $7, config = $8, last_sync_at = $9,
                updated_at = $10, version = version + 1
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(calendar.id().as_uuid())
        .bind(calendar.version())
        .bind(calendar.name())
        .bind(calendar.is_primary())
        .bind(calendar.is_enabled())
        .bind(calendar.sync_push())
        .bind(calendar.sync_pull())
        .bind(Json(calendar.config().clone()))
        .bind(calendar.last_sync_at())
        .bind(calendar.updated_at())
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Find calendar by id
    pub async fn find_by_id(
        pool: &PgPool,
        id: CalendarId,
    ) -> Result<Option<ConnectedCalendarRow>, sqlx::Error> {
        sqlx::query_as::<_, ConnectedCalendarRow>(
            "SELECT * FROM connected_calendars WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(pool)
        .await
    }

    /// Find the calendar bound to (user, provider, external id)
    pub async fn find_by_binding(
        pool: &PgPool,
        user_id: UserId,
        provider: ProviderKind,
        external_calendar_id: &str,
    ) -> Result<Option<ConnectedCalendarRow>, sqlx::Error> {
        sqlx::query_as::<_, ConnectedCalendarRow>(
            r#"
            SELECT * FROM connected_calendars
            WHERE user_id = $1 AND provider = $2 AND external_calendar_id = $3
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(provider)
        .bind(external_calendar_id)
        .fetch_optional(pool)
        .await
    }

    /// All calendars for a user
    pub async fn find_by_user(
        pool: &PgPool,
        user_id: UserId,
    ) -> Result<Vec<ConnectedCalendarRow>, sqlx::Error> {
        sqlx::query_as::<_, ConnectedCalendarRow>(
            r#"
            SELECT * FROM connected_calendars
            WHERE user_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(pool)
        .await
    }

    /// All of a user's calendars for one provider
    pub async fn find_by_user_provider(
        pool: &PgPool,
        user_id: UserId,
        provider: ProviderKind,
    ) -> Result<Vec<ConnectedCalendarRow>, sqlx::Error> {
        sqlx::query_as::<_, ConnectedCalendarRow>(
            r#"
            SELECT * FROM connected_calendars
            WHERE user_id = $1 AND provider = $2
            ORDER BY created_at
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(provider)
        .fetch_all(pool)
        .await
    }

    /// Enabled calendars with push sync turned on
    pub async fn find_enabled_push(
        pool: &PgPool,
        user_id: UserId,
    ) -> Result<Vec<ConnectedCalendarRow>, sqlx::Error> {
        sqlx::query_as::<_, ConnectedCalendarRow>(
            r#"
            SELECT * FROM connected_calendars
            WHERE user_id = $1 AND is_enabled = true AND sync_push = true
            ORDER BY created_at
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(pool)
        .await
    }

    /// The user's primary calendar, if one is set
    pub async fn find_primary(
        pool: &PgPool,
        user_id: UserId,
    ) -> Result<Option<ConnectedCalendarRow>, sqlx::Error> {
        sqlx::query_as::<_, ConnectedCalendarRow>(
            r#"
            SELECT * FROM connected_calendars
            WHERE user_id = $1 AND is_primary = true
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(pool)
        .await
    }

    /// First enabled calendar with pull sync, used as the import fallback
    /// when no primary exists
    pub async fn find_first_enabled_pull(
        pool: &PgPool,
        user_id: UserId,
    ) -> Result<Option<ConnectedCalendarRow>, sqlx::Error> {
        sqlx::query_as::<_, ConnectedCalendarRow>(
            r#"
            SELECT * FROM connected_calendars
            WHERE user_id = $1 AND is_enabled = true AND sync_pull = true
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(pool)
        .await
    }

    /// Enabled pull calendars that have no sync-state row yet; the import
    /// worker seeds their state on its next cycle
    pub async fn find_pull_enabled_missing_sync_state(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<ConnectedCalendarRow>, sqlx::Error> {
        sqlx::query_as::<_, ConnectedCalendarRow>(
            r#"
            SELECT c.* FROM connected_calendars c
            LEFT JOIN calendar_sync_state s
              ON s.user_id = c.user_id
             AND s.external_calendar_id = c.external_calendar_id
            WHERE s.id IS NULL
              AND c.is_enabled = true
              AND c.sync_pull = true
            ORDER BY c.created_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Demote the user's current primary calendar, returning its id.
    ///
    /// Runs inside the connect transaction so the one-primary-per-owner
    /// invariant holds across concurrent writers.
    pub async fn clear_primary(
        tx: &mut Transaction<'_, Postgres>,
        user_id: UserId,
        except: Option<CalendarId>,
    ) -> Result<Option<CalendarId>, sqlx::Error> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE connected_calendars
            SET is_primary = false, updated_at = NOW(), version = version + 1
            WHERE user_id = $1 AND is_primary = true AND ($2::uuid IS NULL OR id <> $2)
            RETURNING id
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(except.map(|id| *id.as_uuid()))
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row.map(|(id,)| CalendarId::from_uuid(id)))
    }

    /// Delete a calendar
    pub async fn delete(
        tx: &mut Transaction<'_, Postgres>,
        id: CalendarId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM connected_calendars WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
