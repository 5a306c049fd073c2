//! Domain events emitted by the connected-calendar aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::types::{CalendarId, ProviderKind, UserId};

/// Routing keys published by the calendar sync core
pub mod routing_keys {
    pub const CONNECTED: &str = "calendar.connected";
    pub const UPDATED: &str = "calendar.updated";
    pub const PRIMARY_SET: &str = "calendar.primary_set";
    pub const SYNCED: &str = "calendar.synced";
    pub const DISCONNECTED: &str = "calendar.disconnected";
}

/// What happened to the aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalendarEventKind {
    Connected,
    Updated { changes: Vec<String> },
    PrimarySet { previous_primary_id: Option<CalendarId> },
    Synced { created: u32, updated: u32, deleted: u32, failed: u32 },
    Disconnected,
}

impl CalendarEventKind {
    pub fn routing_key(&self) -> &'static str {
        match self {
            CalendarEventKind::Connected => routing_keys::CONNECTED,
            CalendarEventKind::Updated { .. } => routing_keys::UPDATED,
            CalendarEventKind::PrimarySet { .. } => routing_keys::PRIMARY_SET,
            CalendarEventKind::Synced { .. } => routing_keys::SYNCED,
            CalendarEventKind::Disconnected => routing_keys::DISCONNECTED,
        }
    }

    /// Kind-specific payload fields
    fn payload_fields(&self) -> serde_json::Value {
        match self {
            CalendarEventKind::Connected | CalendarEventKind::Disconnected => json!({}),
            CalendarEventKind::Updated { changes } => json!({ "changes": changes }),
            CalendarEventKind::PrimarySet { previous_primary_id } => {
                json!({ "previous_primary_id": previous_primary_id })
            }
            CalendarEventKind::Synced {
                created,
                updated,
                deleted,
                failed,
            } => json!({
                "created": created,
                "updated": updated,
                "deleted": deleted,
                "failed": failed,
            }),
        }
    }
}

/// One domain event with the envelope fields every consumer needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub calendar_id: CalendarId,
    pub user_id: UserId,
    pub provider: ProviderKind,
    pub external_calendar_id: String,
    pub occurred_at: DateTime<Utc>,
    pub kind: CalendarEventKind,
}

impl DomainEvent {
    pub fn routing_key(&self) -> &'static str {
        self.kind.routing_key()
    }

    /// Full serialized payload: envelope plus kind-specific fields
    pub fn payload(&self) -> serde_json::Value {
        let mut payload = json!({
            "calendar_id": self.calendar_id,
            "user_id": self.user_id,
            "provider": self.provider,
            "external_calendar_id": self.external_calendar_id,
            "occurred_at": self.occurred_at.to_rfc3339(),
        });
        if let (Some(obj), Some(extra)) = (
            payload.as_object_mut(),
            self.kind.payload_fields().as_object(),
        ) {
            for (k, v) in extra {
                obj.insert(k.clone(), v.clone());
            }
        }
        payload
    }
}
