//! Store contracts the services operate against.
//!
//! The Postgres implementations in [`pg`] delegate to the `db` crate's
//! repositories; tests substitute mocks.

pub mod pg;

pub use pg::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use domain::{Conflict, ConnectedCalendar, Schedule, SyncState};
use shared::types::{CalendarId, ProviderKind, ScheduleId, UserId};

use crate::error::ServiceResult;

/// Persistence for connected-calendar aggregates and their domain events.
///
/// Every save is transactional: the aggregate write and the outbox batch
/// commit together, and the aggregate's event buffer is cleared only on
/// success.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CalendarStore: Send + Sync {
    async fn find_by_id(&self, id: CalendarId) -> ServiceResult<Option<ConnectedCalendar>>;

    async fn find_by_binding(
        &self,
        user_id: UserId,
        provider: ProviderKind,
        external_calendar_id: &str,
    ) -> ServiceResult<Option<ConnectedCalendar>>;

    async fn find_by_user(&self, user_id: UserId) -> ServiceResult<Vec<ConnectedCalendar>>;

    async fn find_by_user_provider(
        &self,
        user_id: UserId,
        provider: ProviderKind,
    ) -> ServiceResult<Vec<ConnectedCalendar>>;

    async fn find_enabled_push(&self, user_id: UserId) -> ServiceResult<Vec<ConnectedCalendar>>;

    async fn find_primary(&self, user_id: UserId) -> ServiceResult<Option<ConnectedCalendar>>;

    async fn find_first_enabled_pull(
        &self,
        user_id: UserId,
    ) -> ServiceResult<Option<ConnectedCalendar>>;

    /// Enabled pull calendars that have no sync-state row yet
    async fn find_pull_enabled_without_state(
        &self,
        limit: i64,
    ) -> ServiceResult<Vec<ConnectedCalendar>>;

    /// Insert a new aggregate with its buffered events. With
    /// `demote_others`, any other primary calendar of the owner is demoted
    /// in the same transaction.
    async fn insert(
        &self,
        calendar: &mut ConnectedCalendar,
        demote_others: bool,
    ) -> ServiceResult<()>;

    /// Update an aggregate with its buffered events, gated on its loaded
    /// version. Surfaces `ConcurrentModification` on a version mismatch.
    async fn update(
        &self,
        calendar: &mut ConnectedCalendar,
        demote_others: bool,
    ) -> ServiceResult<()>;

    /// Delete aggregates, staging their buffered events in the same
    /// transaction.
    async fn delete_with_events(
        &self,
        calendars: &mut Vec<ConnectedCalendar>,
    ) -> ServiceResult<()>;

    /// Drop stored credentials for (user, provider)
    async fn remove_credentials(
        &self,
        user_id: UserId,
        provider: ProviderKind,
    ) -> ServiceResult<()>;
}

/// Persistence for per-calendar sync state
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SyncStateStore: Send + Sync {
    async fn find_pending(
        &self,
        cutoff: DateTime<Utc>,
        max_errors: i32,
        limit: i64,
    ) -> ServiceResult<Vec<SyncState>>;

    async fn find_by_calendar(
        &self,
        user_id: UserId,
        external_calendar_id: &str,
    ) -> ServiceResult<Option<SyncState>>;

    async fn save(&self, state: &SyncState) -> ServiceResult<()>;
}

/// Read-only access to the local schedules
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn find_by_user_and_date(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> ServiceResult<Option<Schedule>>;

    async fn find_by_user_date_range(
        &self,
        user_id: UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ServiceResult<Vec<Schedule>>;

    async fn find_by_id(&self, id: ScheduleId) -> ServiceResult<Option<Schedule>>;
}

/// Persistence for recorded conflicts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConflictStore: Send + Sync {
    async fn save(&self, conflict: &Conflict) -> ServiceResult<()>;
}
