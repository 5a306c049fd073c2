//! Wire types and payload building for the Microsoft Graph events API

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use domain::{EventStatus, ExternalEvent, TimeBlock};
use serde::Deserialize;
use serde_json::{json, Value};
use shared::types::BlockId;

/// Category marking events produced by this system
pub const ORIGIN_CATEGORY: &str = "Orbita";

#[derive(Debug, Deserialize)]
pub struct GraphEventList {
    pub value: Option<Vec<GraphEvent>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEvent {
    pub id: Option<String>,
    pub subject: Option<String>,
    pub body: Option<GraphBody>,
    pub location: Option<GraphLocation>,
    pub show_as: Option<String>,
    pub organizer: Option<GraphRecipient>,
    pub attendees: Option<Vec<GraphRecipient>>,
    pub start: Option<GraphDateTime>,
    pub end: Option<GraphDateTime>,
    pub is_all_day: Option<bool>,
    pub series_master_id: Option<String>,
    pub recurrence: Option<Value>,
    pub categories: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphBody {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphLocation {
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphRecipient {
    pub email_address: Option<GraphEmailAddress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEmailAddress {
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDateTime {
    pub date_time: Option<String>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GraphCalendarList {
    pub value: Option<Vec<GraphCalendar>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphCalendar {
    pub id: String,
    pub name: Option<String>,
    pub is_default_calendar: Option<bool>,
}

impl GraphEvent {
    /// Whether this event carries the originated-event category
    pub fn is_originated(&self) -> bool {
        self.categories
            .as_ref()
            .map(|c| c.iter().any(|cat| cat == ORIGIN_CATEGORY))
            .unwrap_or(false)
    }

    /// The local block id encoded in the subject prefix `[<uuid>] `.
    ///
    /// Only the prefix is required to match, so user edits appended to the
    /// subject survive.
    pub fn local_block_id(&self) -> Option<BlockId> {
        let subject = self.subject.as_deref()?;
        let rest = subject.strip_prefix('[')?;
        let close = rest.find(']')?;
        uuid::Uuid::parse_str(&rest[..close])
            .ok()
            .map(BlockId::from_uuid)
    }

    /// Normalize into an [`ExternalEvent`]
    pub fn into_external(self) -> Option<ExternalEvent> {
        let is_originated = self.is_originated();
        let start_time = parse_graph_time(self.start.as_ref()?)?;
        let end_time = parse_graph_time(self.end.as_ref()?)?;

        let status = match self.show_as.as_deref() {
            Some("free") => EventStatus::Free,
            Some("tentative") => EventStatus::Tentative,
            Some("busy") | Some("oof") | Some("workingElsewhere") => EventStatus::Confirmed,
            _ => EventStatus::Confirmed,
        };

        Some(ExternalEvent {
            external_id: self.id.unwrap_or_default(),
            summary: self.subject.unwrap_or_default(),
            description: self
                .body
                .and_then(|b| b.content)
                .unwrap_or_default(),
            location: self
                .location
                .and_then(|l| l.display_name)
                .unwrap_or_default(),
            status,
            organizer: self
                .organizer
                .and_then(|r| r.email_address)
                .and_then(|a| a.address)
                .unwrap_or_default(),
            attendees: self
                .attendees
                .unwrap_or_default()
                .into_iter()
                .filter_map(|r| r.email_address.and_then(|a| a.address))
                .collect(),
            start_time,
            end_time,
            is_all_day: self.is_all_day.unwrap_or(false),
            is_recurring: self.series_master_id.is_some() || self.recurrence.is_some(),
            is_locally_originated: is_originated,
        })
    }
}

/// Parse a Graph date-time, honoring its timeZone field. With the
/// `Prefer: outlook.timezone="UTC"` header set on reads this is always UTC.
fn parse_graph_time(time: &GraphDateTime) -> Option<DateTime<Utc>> {
    let raw = time.date_time.as_deref()?;
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    match time.time_zone.as_deref() {
        None | Some("UTC") => Some(Utc.from_utc_datetime(&naive)),
        Some(zone) => {
            let tz: chrono_tz::Tz = zone.parse().ok()?;
            tz.from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc))
        }
    }
}

/// Subject for a pushed block: `[<block-uuid>] <title>`
pub fn subject_for(block: &TimeBlock) -> String {
    format!("[{}] {}", block.id, block.title)
}

/// Remote event ids to delete under delete-missing: originated events whose
/// subject-encoded block id is not in the kept set. Events without a
/// parseable local id are never touched.
pub fn deletable_event_ids(
    existing: &[GraphEvent],
    keep: &std::collections::HashSet<BlockId>,
) -> Vec<String> {
    existing
        .iter()
        .filter(|event| event.is_originated())
        .filter_map(|event| {
            let local_id = event.local_block_id()?;
            if keep.contains(&local_id) {
                None
            } else {
                event.id.clone()
            }
        })
        .collect()
}

/// Serialize an instant the way Graph expects: seconds precision, no offset
fn graph_date_time(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Build the request body for creating or updating a block's event
pub fn event_body(block: &TimeBlock) -> Value {
    json!({
        "subject": subject_for(block),
        "body": {
            "contentType": "text",
            "content": crate::contract::block_description(block),
        },
        "start": {
            "dateTime": graph_date_time(block.start_time),
            "timeZone": "UTC",
        },
        "end": {
            "dateTime": graph_date_time(block.end_time),
            "timeZone": "UTC",
        },
        "categories": [ORIGIN_CATEGORY],
        "showAs": "busy",
    })
}
