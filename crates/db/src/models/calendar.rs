//! Row model for connected calendars

use chrono::{DateTime, Utc};
use domain::ConnectedCalendar;
use shared::types::{CalendarId, ProviderKind, UserId};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::HashMap;

/// Persisted shape of a [`ConnectedCalendar`]
#[derive(Debug, Clone, FromRow)]
pub struct ConnectedCalendarRow {
    pub id: CalendarId,
    pub user_id: UserId,
    pub provider: ProviderKind,
    pub external_calendar_id: String,
    pub name: String,
    pub is_primary: bool,
    pub is_enabled: bool,
    pub sync_push: bool,
    pub sync_pull: bool,
    pub config: Json<HashMap<String, String>>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl ConnectedCalendarRow {
    /// Rebuild the domain aggregate from this row
    pub fn into_domain(self) -> ConnectedCalendar {
        ConnectedCalendar::hydrate(
            self.id,
            self.user_id,
            self.provider,
            self.external_calendar_id,
            self.name,
            self.is_primary,
            self.is_enabled,
            self.sync_push,
            self.sync_pull,
            self.config.0,
            self.last_sync_at,
            self.version,
            self.created_at,
            self.updated_at,
        )
    }
}
