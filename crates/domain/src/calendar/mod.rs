//! Connected-calendar aggregate: one (user, provider, calendar) binding

pub mod events;

pub use events::{routing_keys, CalendarEventKind, DomainEvent};

use chrono::{DateTime, Utc};
use shared::errors::DomainError;
use shared::types::{CalendarId, ProviderKind, UserId};
use std::collections::HashMap;

/// A user's binding to one external calendar.
///
/// Every state-changing operation appends a [`DomainEvent`] to an internal
/// buffer. The buffer is drained with [`ConnectedCalendar::take_events`] when
/// the aggregate is persisted, so no event becomes visible before the state
/// change it describes is durable.
#[derive(Debug, Clone)]
pub struct ConnectedCalendar {
    id: CalendarId,
    user_id: UserId,
    provider: ProviderKind,
    external_calendar_id: String,
    name: String,
    is_primary: bool,
    is_enabled: bool,
    sync_push: bool,
    sync_pull: bool,
    config: HashMap<String, String>,
    last_sync_at: Option<DateTime<Utc>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

impl ConnectedCalendar {
    /// Connect a new calendar. Emits `calendar.connected`.
    pub fn connect(
        user_id: UserId,
        provider: ProviderKind,
        external_calendar_id: &str,
        name: &str,
    ) -> Result<Self, DomainError> {
        let external_calendar_id = external_calendar_id.trim();
        let name = name.trim();
        if user_id.as_uuid().is_nil() {
            return Err(DomainError::EmptyUserId);
        }
        if external_calendar_id.is_empty() {
            return Err(DomainError::EmptyExternalCalendarId);
        }
        if name.is_empty() {
            return Err(DomainError::EmptyCalendarName);
        }

        let now = Utc::now();
        let mut calendar = Self {
            id: CalendarId::new(),
            user_id,
            provider,
            external_calendar_id: external_calendar_id.to_string(),
            name: name.to_string(),
            is_primary: false,
            is_enabled: true,
            sync_push: true,
            sync_pull: true,
            config: HashMap::new(),
            last_sync_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
            events: Vec::new(),
        };
        calendar.record(CalendarEventKind::Connected);
        Ok(calendar)
    }

    /// Rebuild an aggregate from persisted state. Emits nothing.
    #[allow(clippy::too_many_arguments)]
    pub fn hydrate(
        id: CalendarId,
        user_id: UserId,
        provider: ProviderKind,
        external_calendar_id: String,
        name: String,
        is_primary: bool,
        is_enabled: bool,
        sync_push: bool,
        sync_pull: bool,
        config: HashMap<String, String>,
        last_sync_at: Option<DateTime<Utc>>,
        version: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            provider,
            external_calendar_id,
            name,
            is_primary,
            is_enabled,
            sync_push,
            sync_pull,
            config,
            last_sync_at,
            version,
            created_at,
            updated_at,
            events: Vec::new(),
        }
    }

    // ============ Accessors ============

    pub fn id(&self) -> CalendarId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn external_calendar_id(&self) -> &str {
        &self.external_calendar_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_primary(&self) -> bool {
        self.is_primary
    }

    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    pub fn sync_push(&self) -> bool {
        self.sync_push
    }

    pub fn sync_pull(&self) -> bool {
        self.sync_pull
    }

    pub fn config(&self) -> &HashMap<String, String> {
        &self.config
    }

    pub fn config_value(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }

    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        self.last_sync_at
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Whether this calendar participates in push sync right now
    pub fn accepts_push(&self) -> bool {
        self.is_enabled && self.sync_push
    }

    /// Whether this calendar participates in pull sync right now
    pub fn accepts_pull(&self) -> bool {
        self.is_enabled && self.sync_pull
    }

    // ============ Mutations ============

    /// Apply initial sync flags and provider config at connect time.
    /// Part of creation, so it emits nothing.
    pub fn configure(
        &mut self,
        sync_push: bool,
        sync_pull: bool,
        config: HashMap<String, String>,
    ) {
        self.sync_push = sync_push;
        self.sync_pull = sync_pull;
        self.config = config;
        self.touch();
    }

    /// Update name, sync flags and merge configuration in one step.
    ///
    /// Emits a single `calendar.updated` listing the changed fields, or
    /// nothing when the update is a no-op.
    pub fn update_settings(
        &mut self,
        name: &str,
        sync_push: bool,
        sync_pull: bool,
        config: &HashMap<String, String>,
    ) -> Result<Vec<String>, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::EmptyCalendarName);
        }

        let mut changes = Vec::new();
        if self.name != name {
            self.name = name.to_string();
            changes.push("name".to_string());
        }
        if self.sync_push != sync_push {
            self.sync_push = sync_push;
            changes.push("sync_push".to_string());
        }
        if self.sync_pull != sync_pull {
            self.sync_pull = sync_pull;
            changes.push("sync_pull".to_string());
        }
        let mut config_changed = false;
        for (key, value) in config {
            if self.config.get(key) != Some(value) {
                self.config.insert(key.clone(), value.clone());
                config_changed = true;
            }
        }
        if config_changed {
            changes.push("config".to_string());
        }

        if !changes.is_empty() {
            self.touch();
            self.record(CalendarEventKind::Updated {
                changes: changes.clone(),
            });
        }
        Ok(changes)
    }

    /// Mark this calendar as the owner's primary. Emits `calendar.primary_set`
    /// carrying the id of the calendar it demoted, if any.
    pub fn set_primary(&mut self, previous_primary_id: Option<CalendarId>) {
        if self.is_primary {
            return;
        }
        self.is_primary = true;
        self.touch();
        self.record(CalendarEventKind::PrimarySet {
            previous_primary_id,
        });
    }

    /// Drop primary status. Emits nothing; consumers learn about the demotion
    /// from the `previous_primary_id` payload of `calendar.primary_set`.
    pub fn clear_primary(&mut self) {
        if self.is_primary {
            self.is_primary = false;
            self.touch();
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.is_enabled != enabled {
            self.is_enabled = enabled;
            self.touch();
            self.record(CalendarEventKind::Updated {
                changes: vec!["is_enabled".to_string()],
            });
        }
    }

    pub fn set_sync_push(&mut self, enabled: bool) {
        if self.sync_push != enabled {
            self.sync_push = enabled;
            self.touch();
            self.record(CalendarEventKind::Updated {
                changes: vec!["sync_push".to_string()],
            });
        }
    }

    pub fn set_sync_pull(&mut self, enabled: bool) {
        if self.sync_pull != enabled {
            self.sync_pull = enabled;
            self.touch();
            self.record(CalendarEventKind::Updated {
                changes: vec!["sync_pull".to_string()],
            });
        }
    }

    /// Record the completion of a push. Emits `calendar.synced`.
    pub fn mark_synced(&mut self, created: u32, updated: u32, deleted: u32, failed: u32) {
        self.last_sync_at = Some(Utc::now());
        self.touch();
        self.record(CalendarEventKind::Synced {
            created,
            updated,
            deleted,
            failed,
        });
    }

    /// Mark the calendar disconnected ahead of deletion.
    /// Emits `calendar.disconnected`.
    pub fn mark_disconnected(&mut self) {
        self.is_enabled = false;
        self.touch();
        self.record(CalendarEventKind::Disconnected);
    }

    // ============ Events ============

    /// Drain the buffered domain events for the outbox write.
    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drop buffered events without publishing them. Used for transient
    /// aggregates that are never persisted.
    pub fn discard_events(&mut self) {
        self.events.clear();
    }

    pub fn pending_events(&self) -> &[DomainEvent] {
        &self.events
    }

    fn record(&mut self, kind: CalendarEventKind) {
        self.events.push(DomainEvent {
            calendar_id: self.id,
            user_id: self.user_id,
            provider: self.provider,
            external_calendar_id: self.external_calendar_id.clone(),
            occurred_at: Utc::now(),
            kind,
        });
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
