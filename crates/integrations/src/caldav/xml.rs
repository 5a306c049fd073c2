//! WebDAV XML bodies and multistatus parsing for CalDAV

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

/// PROPFIND body for discovering the current user principal
pub fn propfind_principal_body() -> &'static str {
    r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:current-user-principal/>
  </d:prop>
</d:propfind>"#
}

/// PROPFIND body for discovering the calendar home set of a principal
pub fn propfind_home_set_body() -> &'static str {
    r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop>
    <c:calendar-home-set/>
  </d:prop>
</d:propfind>"#
}

/// PROPFIND body for enumerating calendar collections in a home set
pub fn propfind_calendars_body() -> &'static str {
    r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop>
    <d:displayname/>
    <d:resourcetype/>
  </d:prop>
</d:propfind>"#
}

/// REPORT body for fetching events overlapping a time window
pub fn calendar_query_body(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<c:calendar-query xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop>
    <d:getetag/>
    <c:calendar-data/>
  </d:prop>
  <c:filter>
    <c:comp-filter name="VCALENDAR">
      <c:comp-filter name="VEVENT">
        <c:time-range start="{}" end="{}"/>
      </c:comp-filter>
    </c:comp-filter>
  </c:filter>
</c:calendar-query>"#,
        format_caldav_datetime(start),
        format_caldav_datetime(end),
    )
}

/// REPORT body for fetching every event in a calendar
pub fn calendar_query_all_body() -> &'static str {
    r#"<?xml version="1.0" encoding="utf-8"?>
<c:calendar-query xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop>
    <d:getetag/>
    <c:calendar-data/>
  </d:prop>
  <c:filter>
    <c:comp-filter name="VCALENDAR">
      <c:comp-filter name="VEVENT"/>
    </c:comp-filter>
  </c:filter>
</c:calendar-query>"#
}

/// A calendar collection discovered from PROPFIND
#[derive(Debug, Clone)]
pub struct DiscoveredCalendar {
    pub href: String,
    pub display_name: Option<String>,
}

/// One calendar object returned by a REPORT
#[derive(Debug, Clone)]
pub struct CalendarObject {
    pub href: String,
    pub calendar_data: String,
}

/// Extract the `<d:href>` nested inside the named container element.
///
/// Used for `current-user-principal` and `calendar-home-set` responses.
pub fn parse_href_in(xml: &str, container: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_container = false;
    let mut in_href = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let local = local_name(&name);
                if local == container {
                    in_container = true;
                } else if in_container && local == "href" {
                    in_href = true;
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let local = local_name(&name);
                if local == container {
                    in_container = false;
                } else if local == "href" {
                    in_href = false;
                }
            }
            Ok(Event::Text(e)) => {
                if in_container && in_href {
                    let text = e.unescape().unwrap_or_default().to_string();
                    if !text.is_empty() {
                        return Some(text);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    None
}

/// Parse a calendar-enumeration PROPFIND response. Only responses whose
/// resourcetype carries `<c:calendar/>` are returned.
pub fn parse_calendar_propfind(xml: &str) -> Vec<DiscoveredCalendar> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut calendars = Vec::new();
    let mut current_href: Option<String> = None;
    let mut current_name: Option<String> = None;
    let mut is_calendar = false;
    let mut current_element: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match local_name(&name) {
                    "response" => {
                        current_href = None;
                        current_name = None;
                        is_calendar = false;
                    }
                    "calendar" => is_calendar = true,
                    local @ ("href" | "displayname") => {
                        current_element = Some(local.to_string());
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let local = local_name(&name);
                if local == "response" {
                    if is_calendar {
                        if let Some(href) = current_href.take() {
                            calendars.push(DiscoveredCalendar {
                                href,
                                display_name: current_name.take(),
                            });
                        }
                    }
                } else {
                    current_element = None;
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(ref element) = current_element {
                    let text = e.unescape().unwrap_or_default().to_string();
                    match element.as_str() {
                        "href" => current_href = Some(text),
                        "displayname" => current_name = Some(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    calendars
}

/// Parse a REPORT response into (href, calendar-data) pairs
pub fn parse_calendar_query(xml: &str) -> Vec<CalendarObject> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut objects = Vec::new();
    let mut current_href: Option<String> = None;
    let mut current_data: Option<String> = None;
    let mut current_element: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match local_name(&name) {
                    "response" => {
                        current_href = None;
                        current_data = None;
                    }
                    local @ ("href" | "calendar-data") => {
                        current_element = Some(local.to_string());
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let local = local_name(&name);
                if local == "response" {
                    if let (Some(href), Some(data)) = (current_href.take(), current_data.take()) {
                        objects.push(CalendarObject {
                            href,
                            calendar_data: data,
                        });
                    }
                } else {
                    current_element = None;
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(ref element) = current_element {
                    let text = e.unescape().unwrap_or_default().to_string();
                    match element.as_str() {
                        "href" => current_href = Some(text),
                        "calendar-data" => current_data = Some(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if current_element.as_deref() == Some("calendar-data") {
                    current_data = Some(String::from_utf8_lossy(&e).to_string());
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    objects
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Format a datetime for CalDAV time-range filters
fn format_caldav_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}
