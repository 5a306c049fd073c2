//! Transient view of a remote calendar event

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::types::TimeRange;

/// Free/busy status reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Free,
    Tentative,
    Confirmed,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::Free => write!(f, "free"),
            EventStatus::Tentative => write!(f, "tentative"),
            EventStatus::Confirmed => write!(f, "confirmed"),
        }
    }
}

/// An event read from a remote calendar, normalized to UTC.
///
/// `is_locally_originated` is set by the adapter that produced the event,
/// based on its provider-specific marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalEvent {
    pub external_id: String,
    pub summary: String,
    pub description: String,
    pub location: String,
    pub status: EventStatus,
    pub organizer: String,
    pub attendees: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_all_day: bool,
    pub is_recurring: bool,
    pub is_locally_originated: bool,
}

impl ExternalEvent {
    pub fn range(&self) -> TimeRange {
        TimeRange {
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// Whether this event occupies time on the calendar
    pub fn is_busy(&self) -> bool {
        self.status != EventStatus::Free
    }
}

/// Candidate calendar enumerated during connect flows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarSummary {
    pub id: String,
    pub name: String,
    pub primary: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_range() {
        let event = ExternalEvent {
            external_id: "evt-1".to_string(),
            summary: "Standup".to_string(),
            description: String::new(),
            location: String::new(),
            status: EventStatus::Confirmed,
            organizer: String::new(),
            attendees: vec![],
            start_time: Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 3, 10, 9, 30, 0).unwrap(),
            is_all_day: false,
            is_recurring: false,
            is_locally_originated: false,
        };
        assert_eq!(event.range().duration_minutes(), 30);
        assert!(event.is_busy());
    }
}
