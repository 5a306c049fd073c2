//! Wire types and payload building for the Google Calendar v3 API

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use domain::{EventStatus, ExternalEvent, TimeBlock};
use serde::Deserialize;
use serde_json::{json, Value};
use shared::types::BlockId;
use std::collections::HashMap;

/// Private extended property marking events produced by this system
pub const ORIGIN_MARKER_KEY: &str = "orbita";
pub const ORIGIN_MARKER_VALUE: &str = "1";

#[derive(Debug, Deserialize)]
pub struct GoogleEventList {
    pub items: Option<Vec<GoogleEvent>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEvent {
    pub id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
    pub transparency: Option<String>,
    pub organizer: Option<GoogleOrganizer>,
    pub attendees: Option<Vec<GoogleAttendee>>,
    pub start: Option<GoogleEventTime>,
    pub end: Option<GoogleEventTime>,
    pub recurrence: Option<Vec<String>>,
    pub recurring_event_id: Option<String>,
    pub extended_properties: Option<GoogleExtendedProperties>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleOrganizer {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleAttendee {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEventTime {
    pub date_time: Option<String>,
    pub date: Option<String>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleExtendedProperties {
    pub private: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleCalendarList {
    pub items: Option<Vec<GoogleCalendarListEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleCalendarListEntry {
    pub id: String,
    pub summary: Option<String>,
    pub primary: Option<bool>,
}

impl GoogleEvent {
    /// Whether this event carries the originated-event marker
    pub fn is_originated(&self) -> bool {
        self.extended_properties
            .as_ref()
            .and_then(|p| p.private.as_ref())
            .and_then(|p| p.get(ORIGIN_MARKER_KEY))
            .map(|v| v == ORIGIN_MARKER_VALUE)
            .unwrap_or(false)
    }

    /// The local block id encoded in the event id, for originated events
    pub fn local_block_id(&self) -> Option<BlockId> {
        let id = self.id.as_deref()?;
        uuid::Uuid::parse_str(id).ok().map(BlockId::from_uuid)
    }

    /// Normalize into an [`ExternalEvent`]. Returns `None` for cancelled
    /// events and events without a usable time range.
    pub fn into_external(self) -> Option<ExternalEvent> {
        if self.status.as_deref() == Some("cancelled") {
            return None;
        }
        let is_originated = self.is_originated();
        let (start_time, start_all_day) = parse_event_time(self.start.as_ref()?)?;
        let (end_time, _) = parse_event_time(self.end.as_ref()?)?;

        let status = if self.transparency.as_deref() == Some("transparent") {
            EventStatus::Free
        } else if self.status.as_deref() == Some("tentative") {
            EventStatus::Tentative
        } else {
            EventStatus::Confirmed
        };

        Some(ExternalEvent {
            external_id: self.id.unwrap_or_default(),
            summary: self.summary.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            location: self.location.unwrap_or_default(),
            status,
            organizer: self
                .organizer
                .and_then(|o| o.email)
                .unwrap_or_default(),
            attendees: self
                .attendees
                .unwrap_or_default()
                .into_iter()
                .filter_map(|a| a.email)
                .collect(),
            start_time,
            end_time,
            is_all_day: start_all_day,
            is_recurring: self.recurring_event_id.is_some()
                || self.recurrence.map(|r| !r.is_empty()).unwrap_or(false),
            is_locally_originated: is_originated,
        })
    }
}

/// Parse a Google event time, which is either an RFC3339 instant or a
/// date-only value for all-day events. Returns the UTC instant and the
/// all-day flag.
fn parse_event_time(time: &GoogleEventTime) -> Option<(DateTime<Utc>, bool)> {
    if let Some(date_time) = &time.date_time {
        let parsed = DateTime::parse_from_rfc3339(date_time).ok()?;
        return Some((parsed.with_timezone(&Utc), false));
    }
    let date: NaiveDate = time.date.as_deref()?.parse().ok()?;
    let midnight = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);
    Some((midnight, true))
}

/// Event id Google accepts for a local block: the uuid without dashes
pub fn event_id(block_id: BlockId) -> String {
    block_id.as_uuid().simple().to_string()
}

/// Remote event ids to delete under delete-missing: originated events whose
/// local block id is not in the kept set. Events without a parseable local
/// id are never touched.
pub fn deletable_event_ids(
    existing: &[GoogleEvent],
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

/// Build the request body for creating or updating a block's event
pub fn event_body(block: &TimeBlock, attendees: &[String], reminder_minutes: &[i64]) -> Value {
    let mut body = json!({
        "id": event_id(block.id),
        "summary": block.title,
        "description": crate::contract::block_description(block),
        "start": {
            "dateTime": block.start_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            "timeZone": "UTC",
        },
        "end": {
            "dateTime": block.end_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            "timeZone": "UTC",
        },
        "extendedProperties": {
            "private": { ORIGIN_MARKER_KEY: ORIGIN_MARKER_VALUE },
        },
    });

    let attendees: Vec<Value> = attendees
        .iter()
        .map(|email| email.trim())
        .filter(|email| !email.is_empty())
        .map(|email| json!({ "email": email }))
        .collect();
    if !attendees.is_empty() {
        body["attendees"] = Value::Array(attendees);
    }

    let overrides: Vec<Value> = reminder_minutes
        .iter()
        .filter(|minutes| **minutes > 0)
        .map(|minutes| json!({ "method": "popup", "minutes": minutes }))
        .collect();
    if !overrides.is_empty() {
        body["reminders"] = json!({ "useDefault": false, "overrides": overrides });
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use domain::BlockKind;

    fn block() -> TimeBlock {
        TimeBlock {
            id: BlockId::new(),
            title: "Deep work".to_string(),
            kind: BlockKind::Focus,
            start_time: Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 3, 10, 11, 0, 0).unwrap(),
            completed: false,
            missed: false,
        }
    }

    #[test]
    fn test_event_body_shape() {
        let block = block();
        let body = event_body(&block, &[], &[]);
        assert_eq!(body["id"], event_id(block.id));
        assert_eq!(body["summary"], "Deep work");
        assert_eq!(body["start"]["dateTime"], "2025-03-10T09:00:00Z");
        assert_eq!(body["start"]["timeZone"], "UTC");
        assert_eq!(body["extendedProperties"]["private"]["orbita"], "1");
        assert!(body.get("attendees").is_none());
        assert!(body.get("reminders").is_none());
        assert!(body["description"]
            .as_str()
            .unwrap()
            .ends_with("Managed by Orbita"));
    }

    #[test]
    fn test_event_body_filters_blank_attendees() {
        let body = event_body(
            &block(),
            &["a@example.com".to_string(), "  ".to_string(), String::new()],
            &[],
        );
        let attendees = body["attendees"].as_array().unwrap();
        assert_eq!(attendees.len(), 1);
        assert_eq!(attendees[0]["email"], "a@example.com");
    }

    #[test]
    fn test_event_body_keeps_positive_reminders_only() {
        let body = event_body(&block(), &[], &[10, 0, -5, 30]);
        let reminders = &body["reminders"];
        assert_eq!(reminders["useDefault"], false);
        assert_eq!(reminders["overrides"].as_array().unwrap().len(), 2);

        let none = event_body(&block(), &[], &[0, -5]);
        assert!(none.get("reminders").is_none());
    }

    #[test]
    fn test_deletable_ids_spare_foreign_and_kept_events() {
        use std::collections::HashSet;

        let kept_block = BlockId::new();
        let stale_block = BlockId::new();
        let originated = |block_id: BlockId| {
            serde_json::from_str::<GoogleEvent>(&format!(
                r#"{{ "id": "{}", "extendedProperties": {{ "private": {{ "orbita": "1" }} }} }}"#,
                event_id(block_id)
            ))
            .unwrap()
        };
        // A foreign event in the same calendar, no marker
        let foreign: GoogleEvent =
            serde_json::from_str(r#"{ "id": "foreign-evt" }"#).unwrap();

        let existing = vec![originated(kept_block), originated(stale_block), foreign];
        let keep: HashSet<BlockId> = [kept_block].into_iter().collect();

        let deletable = deletable_event_ids(&existing, &keep);
        assert_eq!(deletable, vec![event_id(stale_block)]);
    }

    #[test]
    fn test_event_id_round_trip() {
        let block_id = BlockId::new();
        let event = GoogleEvent {
            id: Some(event_id(block_id)),
            summary: None,
            description: None,
            location: None,
            status: None,
            transparency: None,
            organizer: None,
            attendees: None,
            start: None,
            end: None,
            recurrence: None,
            recurring_event_id: None,
            extended_properties: None,
        };
        assert_eq!(event.local_block_id(), Some(block_id));
    }

    #[test]
    fn test_into_external_timed_event() {
        let raw = r#"{
            "id": "evt-1",
            "summary": "Dentist",
            "status": "confirmed",
            "organizer": { "email": "dr@example.com" },
            "attendees": [{ "email": "me@example.com" }],
            "start": { "dateTime": "2025-03-10T14:00:00+01:00" },
            "end": { "dateTime": "2025-03-10T15:00:00+01:00" },
            "extendedProperties": { "private": { "orbita": "1" } }
        }"#;
        let event: GoogleEvent = serde_json::from_str(raw).unwrap();
        assert!(event.is_originated());
        let external = event.into_external().unwrap();
        // Normalized to UTC
        assert_eq!(
            external.start_time,
            Utc.with_ymd_and_hms(2025, 3, 10, 13, 0, 0).unwrap()
        );
        assert!(!external.is_all_day);
        assert!(external.is_locally_originated);
        assert_eq!(external.organizer, "dr@example.com");
    }

    #[test]
    fn test_into_external_all_day_and_cancelled() {
        let all_day: GoogleEvent = serde_json::from_str(
            r#"{
                "id": "evt-2",
                "start": { "date": "2025-03-10" },
                "end": { "date": "2025-03-11" }
            }"#,
        )
        .unwrap();
        let external = all_day.into_external().unwrap();
        assert!(external.is_all_day);
        assert!(!external.is_locally_originated);
        assert_eq!(
            external.start_time,
            Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap()
        );

        let cancelled: GoogleEvent = serde_json::from_str(
            r#"{
                "id": "evt-3",
                "status": "cancelled",
                "start": { "dateTime": "2025-03-10T14:00:00Z" },
                "end": { "dateTime": "2025-03-10T15:00:00Z" }
            }"#,
        )
        .unwrap();
        assert!(cancelled.into_external().is_none());
    }

    #[test]
    fn test_tentative_and_transparent_status() {
        let tentative: GoogleEvent = serde_json::from_str(
            r#"{
                "id": "e",
                "status": "tentative",
                "start": { "dateTime": "2025-03-10T14:00:00Z" },
                "end": { "dateTime": "2025-03-10T15:00:00Z" }
            }"#,
        )
        .unwrap();
        assert_eq!(
            tentative.into_external().unwrap().status,
            EventStatus::Tentative
        );

        let free: GoogleEvent = serde_json::from_str(
            r#"{
                "id": "e",
                "transparency": "transparent",
                "start": { "dateTime": "2025-03-10T14:00:00Z" },
                "end": { "dateTime": "2025-03-10T15:00:00Z" }
            }"#,
        )
        .unwrap();
        assert_eq!(free.into_external().unwrap().status, EventStatus::Free);
    }
}
