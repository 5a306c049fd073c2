//! Postgres-backed store implementations over the `db` repositories

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use db::models::OutboxMessage;
use db::{
    CalendarRepository, ConflictRepository, CredentialRepository, OutboxRepository,
    ScheduleRepository, SyncStateRepository,
};
use domain::{Conflict, ConnectedCalendar, Schedule, SyncState};
use shared::errors::DomainError;
use shared::types::{CalendarId, ProviderKind, ScheduleId, UserId};
use sqlx::PgPool;

use super::{CalendarStore, ConflictStore, ScheduleStore, SyncStateStore};
use crate::error::{ServiceError, ServiceResult};

/// One store over the shared pool, implementing every contract
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn messages_for(calendar: &ConnectedCalendar) -> Vec<OutboxMessage> {
        calendar
            .pending_events()
            .iter()
            .map(OutboxMessage::from_event)
            .collect()
    }
}

#[async_trait]
impl CalendarStore for PgStore {
    async fn find_by_id(&self, id: CalendarId) -> ServiceResult<Option<ConnectedCalendar>> {
        let row = CalendarRepository::find_by_id(&self.pool, id).await?;
        Ok(row.map(|r| r.into_domain()))
    }

    async fn find_by_binding(
        &self,
        user_id: UserId,
        provider: ProviderKind,
        external_calendar_id: &str,
    ) -> ServiceResult<Option<ConnectedCalendar>> {
        let row =
            CalendarRepository::find_by_binding(&self.pool, user_id, provider, external_calendar_id)
                .await?;
        Ok(row.map(|r| r.into_domain()))
    }

    async fn find_by_user(&self, user_id: UserId) -> ServiceResult<Vec<ConnectedCalendar>> {
        let rows = CalendarRepository::find_by_user(&self.pool, user_id).await?;
        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    async fn find_by_user_provider(
        &self,
        user_id: UserId,
        provider: ProviderKind,
    ) -> ServiceResult<Vec<ConnectedCalendar>> {
        let rows =
            CalendarRepository::find_by_user_provider(&self.pool, user_id, provider).await?;
        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    async fn find_enabled_push(&self, user_id: UserId) -> ServiceResult<Vec<ConnectedCalendar>> {
        let rows = CalendarRepository::find_enabled_push(&self.pool, user_id).await?;
        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    async fn find_primary(&self, user_id: UserId) -> ServiceResult<Option<ConnectedCalendar>> {
        let row = CalendarRepository::find_primary(&self.pool, user_id).await?;
        Ok(row.map(|r| r.into_domain()))
    }

    async fn find_first_enabled_pull(
        &self,
        user_id: UserId,
    ) -> ServiceResult<Option<ConnectedCalendar>> {
        let row = CalendarRepository::find_first_enabled_pull(&self.pool, user_id).await?;
        Ok(row.map(|r| r.into_domain()))
    }

    async fn find_pull_enabled_without_state(
        &self,
        limit: i64,
    ) -> ServiceResult<Vec<ConnectedCalendar>> {
        let rows =
            CalendarRepository::find_pull_enabled_missing_sync_state(&self.pool, limit).await?;
        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    async fn insert(
        &self,
        calendar: &mut ConnectedCalendar,
        demote_others: bool,
    ) -> ServiceResult<()> {
        let messages = Self::messages_for(calendar);
        let mut tx = self.pool.begin().await?;
        if demote_others {
            CalendarRepository::clear_primary(&mut tx, calendar.user_id(), Some(calendar.id()))
                .await?;
        }
        CalendarRepository::insert(&mut tx, calendar).await?;
        OutboxRepository::save_batch(&mut tx, &messages).await?;
        tx.commit().await?;

        calendar.take_events();
        Ok(())
    }

    async fn update(
        &self,
        calendar: &mut ConnectedCalendar,
        demote_others: bool,
    ) -> ServiceResult<()> {
        let messages = Self::messages_for(calendar);
        let mut tx = self.pool.begin().await?;
        if demote_others {
            CalendarRepository::clear_primary(&mut tx, calendar.user_id(), Some(calendar.id()))
                .await?;
        }
        let updated = CalendarRepository::update(&mut tx, calendar).await?;
        if !updated {
            tx.rollback().await?;
            return Err(ServiceError::Domain(DomainError::ConcurrentModification {
                expected: calendar.version(),
            }));
        }
        OutboxRepository::save_batch(&mut tx, &messages).await?;
        tx.commit().await?;

        calendar.take_events();
        Ok(())
    }

    async fn delete_with_events(
        &self,
        calendars: &mut Vec<ConnectedCalendar>,
    ) -> ServiceResult<()> {
        let mut messages = Vec::new();
        for calendar in calendars.iter() {
            messages.extend(Self::messages_for(calendar));
        }

        let mut tx = self.pool.begin().await?;
        for calendar in calendars.iter() {
            CalendarRepository::delete(&mut tx, calendar.id()).await?;
        }
        OutboxRepository::save_batch(&mut tx, &messages).await?;
        tx.commit().await?;

        for calendar in calendars.iter_mut() {
            calendar.take_events();
        }
        Ok(())
    }

    async fn remove_credentials(
        &self,
        user_id: UserId,
        provider: ProviderKind,
    ) -> ServiceResult<()> {
        CredentialRepository::delete(&self.pool, user_id, provider).await?;
        Ok(())
    }
}

#[async_trait]
impl SyncStateStore for PgStore {
    async fn find_pending(
        &self,
        cutoff: DateTime<Utc>,
        max_errors: i32,
        limit: i64,
    ) -> ServiceResult<Vec<SyncState>> {
        let rows = SyncStateRepository::find_pending(&self.pool, cutoff, max_errors, limit).await?;
        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    async fn find_by_calendar(
        &self,
        user_id: UserId,
        external_calendar_id: &str,
    ) -> ServiceResult<Option<SyncState>> {
        let row =
            SyncStateRepository::find_by_calendar(&self.pool, user_id, external_calendar_id)
                .await?;
        Ok(row.map(|r| r.into_domain()))
    }

    async fn save(&self, state: &SyncState) -> ServiceResult<()> {
        SyncStateRepository::upsert(&self.pool, state).await?;
        Ok(())
    }
}

#[async_trait]
impl ScheduleStore for PgStore {
    async fn find_by_user_and_date(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> ServiceResult<Option<Schedule>> {
        Ok(ScheduleRepository::find_by_user_and_date(&self.pool, user_id, date).await?)
    }

    async fn find_by_user_date_range(
        &self,
        user_id: UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ServiceResult<Vec<Schedule>> {
        Ok(ScheduleRepository::find_by_user_date_range(&self.pool, user_id, start, end).await?)
    }

    async fn find_by_id(&self, id: ScheduleId) -> ServiceResult<Option<Schedule>> {
        Ok(ScheduleRepository::find_by_id(&self.pool, id).await?)
    }
}

#[async_trait]
impl ConflictStore for PgStore {
    async fn save(&self, conflict: &Conflict) -> ServiceResult<()> {
        ConflictRepository::insert(&self.pool, conflict).await?;
        Ok(())
    }
}
