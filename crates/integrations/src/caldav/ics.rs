//! Minimal iCalendar generation and parsing.
//!
//! We control both ends of this format for pushed events, so only the
//! properties this system reads and writes are handled. Parsing is
//! fold-aware and tolerates unknown properties.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use domain::{EventStatus, ExternalEvent, TimeBlock};

/// Property marking events produced by this system
pub const ORIGIN_PROPERTY: &str = "X-ORBITA";

/// Build one VCALENDAR with a single VEVENT for a block.
/// The UID is the local block id.
pub fn build_event_ics(block: &TimeBlock) -> String {
    let description = crate::contract::block_description(block);
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//Orbita//Calendar Sync//EN".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{}", block.id),
        format!("DTSTAMP:{}", format_utc(Utc::now())),
        format!("DTSTART:{}", format_utc(block.start_time)),
        format!("DTEND:{}", format_utc(block.end_time)),
        format!("SUMMARY:{}", escape_text(&block.title)),
        format!("DESCRIPTION:{}", escape_text(&description)),
        "STATUS:CONFIRMED".to_string(),
        format!("{}:1", ORIGIN_PROPERTY),
        "END:VEVENT".to_string(),
        "END:VCALENDAR".to_string(),
    ];
    lines.push(String::new());
    lines.join("\r\n")
}

/// Parse the VEVENTs of an iCalendar document into external events.
/// Components that lack a usable time range are skipped.
pub fn parse_ics(data: &str) -> Vec<ExternalEvent> {
    let mut events = Vec::new();
    let mut current: Option<PartialEvent> = None;

    for line in unfold_lines(data) {
        let Some((name, params, value)) = split_content_line(&line) else {
            continue;
        };

        match name.as_str() {
            "BEGIN" if value == "VEVENT" => current = Some(PartialEvent::default()),
            "END" if value == "VEVENT" => {
                if let Some(partial) = current.take() {
                    if let Some(event) = partial.finish() {
                        events.push(event);
                    }
                }
            }
            _ => {
                if let Some(ref mut partial) = current {
                    partial.apply(&name, &params, &value);
                }
            }
        }
    }
    events
}

#[derive(Default)]
struct PartialEvent {
    uid: String,
    summary: String,
    description: String,
    location: String,
    organizer: String,
    attendees: Vec<String>,
    status: Option<String>,
    transparent: bool,
    start: Option<(DateTime<Utc>, bool)>,
    end: Option<(DateTime<Utc>, bool)>,
    recurring: bool,
    originated: bool,
}

impl PartialEvent {
    fn apply(&mut self, name: &str, params: &str, value: &str) {
        match name {
            "UID" => self.uid = value.to_string(),
            "SUMMARY" => self.summary = unescape_text(value),
            "DESCRIPTION" => self.description = unescape_text(value),
            "LOCATION" => self.location = unescape_text(value),
            "ORGANIZER" => self.organizer = strip_mailto(value),
            "ATTENDEE" => self.attendees.push(strip_mailto(value)),
            "STATUS" => self.status = Some(value.to_uppercase()),
            "TRANSP" => self.transparent = value.eq_ignore_ascii_case("TRANSPARENT"),
            "DTSTART" => self.start = parse_datetime(params, value),
            "DTEND" => self.end = parse_datetime(params, value),
            "RRULE" | "RECURRENCE-ID" => self.recurring = true,
            _ if name == ORIGIN_PROPERTY => self.originated = value == "1",
            _ => {}
        }
    }

    fn finish(self) -> Option<ExternalEvent> {
        if self.status.as_deref() == Some("CANCELLED") {
            return None;
        }
        let (start_time, all_day) = self.start?;
        let (end_time, _) = self.end?;

        let status = if self.transparent {
            EventStatus::Free
        } else if self.status.as_deref() == Some("TENTATIVE") {
            EventStatus::Tentative
        } else {
            EventStatus::Confirmed
        };

        Some(ExternalEvent {
            external_id: self.uid,
            summary: self.summary,
            description: self.description,
            location: self.location,
            status,
            organizer: self.organizer,
            attendees: self.attendees,
            start_time,
            end_time,
            is_all_day: all_day,
            is_recurring: self.recurring,
            is_locally_originated: self.originated,
        })
    }
}

fn format_utc(instant: DateTime<Utc>) -> String {
    instant.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Unfold RFC 5545 continuation lines (folded lines start with a space or
/// a tab)
fn unfold_lines(data: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in data.lines() {
        if (raw.starts_with(' ') || raw.starts_with('\t')) && !lines.is_empty() {
            if let Some(last) = lines.last_mut() {
                last.push_str(&raw[1..]);
            }
        } else {
            lines.push(raw.to_string());
        }
    }
    lines
}

/// Split `NAME;PARAM=1;PARAM=2:VALUE` into its three parts
fn split_content_line(line: &str) -> Option<(String, String, String)> {
    let colon = line.find(':')?;
    let (left, value) = line.split_at(colon);
    let value = &value[1..];
    match left.split_once(';') {
        Some((name, params)) => Some((
            name.to_uppercase(),
            params.to_uppercase(),
            value.to_string(),
        )),
        None => Some((left.to_uppercase(), String::new(), value.to_string())),
    }
}

/// Parse DTSTART/DTEND values: UTC instants, floating local times (treated
/// as UTC), TZID-zoned times, and date-only all-day values
fn parse_datetime(params: &str, value: &str) -> Option<(DateTime<Utc>, bool)> {
    if params.contains("VALUE=DATE") || (value.len() == 8 && !value.contains('T')) {
        let date: NaiveDate = NaiveDate::parse_from_str(value, "%Y%m%d").ok()?;
        return Some((Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?), true));
    }

    if let Some(stripped) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(stripped, "%Y%m%dT%H%M%S").ok()?;
        return Some((Utc.from_utc_datetime(&naive), false));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()?;
    if let Some(tzid) = params
        .split(';')
        .find_map(|p| p.strip_prefix("TZID="))
    {
        if let Ok(tz) = tzid.parse::<chrono_tz::Tz>() {
            return tz
                .from_local_datetime(&naive)
                .single()
                .map(|dt| (dt.with_timezone(&Utc), false));
        }
    }
    Some((Utc.from_utc_datetime(&naive), false))
}

fn strip_mailto(value: &str) -> String {
    value
        .strip_prefix("mailto:")
        .or_else(|| value.strip_prefix("MAILTO:"))
        .unwrap_or(value)
        .to_string()
}

fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

fn unescape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use domain::BlockKind;
    use shared::types::BlockId;

    fn block() -> TimeBlock {
        TimeBlock {
            id: BlockId::new(),
            title: "Review; notes".to_string(),
            kind: BlockKind::Task,
            start_time: Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap(),
            completed: true,
            missed: false,
        }
    }

    #[test]
    fn test_build_ics_shape() {
        let block = block();
        let ics = build_event_ics(&block);
        assert!(ics.starts_with("BEGIN:VCALENDAR"));
        assert!(ics.contains(&format!("UID:{}", block.id)));
        assert!(ics.contains("DTSTART:20250310T090000Z"));
        assert!(ics.contains("DTEND:20250310T100000Z"));
        assert!(ics.contains("SUMMARY:Review\\; notes"));
        assert!(ics.contains("DESCRIPTION:Type: Task\\nStatus: Completed\\nManaged by Orbita"));
        assert!(ics.contains("X-ORBITA:1"));
        assert!(ics.trim_end().ends_with("END:VCALENDAR"));
    }

    #[test]
    fn test_round_trip() {
        let block = block();
        let ics = build_event_ics(&block);
        let events = parse_ics(&ics);
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.external_id, block.id.to_string());
        assert_eq!(event.summary, "Review; notes");
        assert_eq!(event.start_time, block.start_time);
        assert!(event.is_locally_originated);
        assert!(!event.is_all_day);
    }

    #[test]
    fn test_parse_foreign_event() {
        let ics = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:abc@remote\r\nDTSTART;TZID=Europe/Berlin:20250310T100000\r\nDTEND;TZID=Europe/Berlin:20250310T110000\r\nSUMMARY:Lunch with a\r\n  long folded line\r\nSTATUS:TENTATIVE\r\nATTENDEE:mailto:pat@example.com\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let events = parse_ics(ics);
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.external_id, "abc@remote");
        assert_eq!(event.summary, "Lunch with a long folded line");
        // Berlin is UTC+1 on that date
        assert_eq!(
            event.start_time,
            Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
        );
        assert_eq!(event.status, EventStatus::Tentative);
        assert_eq!(event.attendees, vec!["pat@example.com".to_string()]);
        assert!(!event.is_locally_originated);
    }

    #[test]
    fn test_parse_all_day() {
        let ics = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:d1\nDTSTART;VALUE=DATE:20250310\nDTEND;VALUE=DATE:20250311\nSUMMARY:Offsite\nEND:VEVENT\nEND:VCALENDAR\n";
        let events = parse_ics(ics);
        assert_eq!(events.len(), 1);
        assert!(events[0].is_all_day);
        assert_eq!(
            events[0].start_time,
            Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_cancelled_skipped() {
        let ics = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:gone\nDTSTART:20250310T090000Z\nDTEND:20250310T100000Z\nSTATUS:CANCELLED\nEND:VEVENT\nEND:VCALENDAR\n";
        assert!(parse_ics(ics).is_empty());
    }
}
