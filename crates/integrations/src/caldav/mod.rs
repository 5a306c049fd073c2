//! CalDAV adapter. Apple Calendar is CalDAV against the fixed iCloud
//! endpoint with an app-specific password.

pub mod client;
pub mod ics;
pub mod xml;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{CalendarSummary, ConnectedCalendar, ExternalEvent, TimeBlock};
use shared::types::{ProviderKind, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::auth::{BasicCredentials, CredentialStore};
use crate::contract::{CalendarImporter, CalendarSyncer, PushOutcome};
use crate::error::{ProviderError, ProviderResult};
use client::CalDavClient;

pub const APPLE_BASE_URL: &str = "https://caldav.icloud.com";

/// Adapter bound to one CalDAV calendar collection.
///
/// The connected calendar's external id is the collection's href path as
/// discovered during the connect flow.
pub struct CalDavAdapter {
    client: CalDavClient,
    base_url: String,
    calendar_path: String,
    provider: ProviderKind,
    store: Arc<dyn CredentialStore>,
}

impl CalDavAdapter {
    /// Generic CalDAV calendar; the server URL comes from the calendar's
    /// provider config.
    pub fn new(
        calendar: &ConnectedCalendar,
        store: Arc<dyn CredentialStore>,
    ) -> ProviderResult<Self> {
        let base_url = calendar
            .config_value("server_url")
            .ok_or_else(|| ProviderError::MissingConfig("server_url".to_string()))?
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client: CalDavClient::new()?,
            base_url,
            calendar_path: calendar.external_calendar_id().to_string(),
            provider: ProviderKind::Caldav,
            store,
        })
    }

    /// Apple Calendar: fixed iCloud base URL, username is the Apple ID
    /// email, password is an app-specific password.
    pub fn apple(
        calendar: &ConnectedCalendar,
        store: Arc<dyn CredentialStore>,
    ) -> ProviderResult<Self> {
        Ok(Self {
            client: CalDavClient::new()?,
            base_url: APPLE_BASE_URL.to_string(),
            calendar_path: calendar.external_calendar_id().to_string(),
            provider: ProviderKind::Apple,
            store,
        })
    }

    async fn credentials(&self, user_id: UserId) -> ProviderResult<BasicCredentials> {
        self.store.get_credentials(user_id, self.provider).await
    }

    fn absolutize(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!("{}/{}", self.base_url, href.trim_start_matches('/'))
        }
    }

    fn calendar_url(&self) -> String {
        let mut url = self.absolutize(&self.calendar_path);
        if !url.ends_with('/') {
            url.push('/');
        }
        url
    }

    /// Resource path for one block: `{calendar}/{block-id}.ics`
    fn event_url(&self, block: &TimeBlock) -> String {
        format!("{}{}.ics", self.calendar_url(), block.id)
    }

    /// Enumerate originated events as a uid-to-href map
    async fn originated_events(
        &self,
        credentials: &BasicCredentials,
    ) -> ProviderResult<HashMap<String, String>> {
        let response = self
            .client
            .report(
                &self.calendar_url(),
                xml::calendar_query_all_body(),
                credentials,
            )
            .await?;

        let mut by_uid = HashMap::new();
        for object in xml::parse_calendar_query(&response) {
            for event in ics::parse_ics(&object.calendar_data) {
                if event.is_locally_originated {
                    by_uid.insert(event.external_id, object.href.clone());
                }
            }
        }
        Ok(by_uid)
    }

    /// Walk principal and home-set discovery to the user's calendar home
    async fn discover_home_set(
        &self,
        credentials: &BasicCredentials,
    ) -> ProviderResult<String> {
        let root = format!("{}/", self.base_url);
        let response = self
            .client
            .propfind(&root, xml::propfind_principal_body(), 0, credentials)
            .await?;
        let principal = xml::parse_href_in(&response, "current-user-principal")
            .ok_or_else(|| {
                ProviderError::InvalidResponse("no current-user-principal in response".to_string())
            })?;

        let principal_url = self.absolutize(&principal);
        let response = self
            .client
            .propfind(&principal_url, xml::propfind_home_set_body(), 0, credentials)
            .await?;
        xml::parse_href_in(&response, "calendar-home-set").ok_or_else(|| {
            ProviderError::InvalidResponse("no calendar-home-set in response".to_string())
        })
    }
}

#[async_trait]
impl CalendarSyncer for CalDavAdapter {
    async fn push(
        &self,
        user_id: UserId,
        blocks: &[TimeBlock],
        delete_missing: bool,
    ) -> ProviderResult<PushOutcome> {
        let credentials = self.credentials(user_id).await?;
        // Enumeration failure aborts before per-event work
        let originated = self.originated_events(&credentials).await?;

        let mut outcome = PushOutcome::default();
        for block in blocks {
            let url = self.event_url(block);
            let ics = ics::build_event_ics(block);
            match self.client.put_ics(&url, ics, &credentials).await {
                Ok(_) => {
                    if originated.contains_key(&block.id.to_string()) {
                        outcome.updated += 1;
                    } else {
                        outcome.created += 1;
                    }
                }
                Err(e) => outcome.record_failure(format!("block {}: {}", block.id, e)),
            }
        }

        if delete_missing {
            let keep: HashSet<String> = blocks.iter().map(|b| b.id.to_string()).collect();
            for (uid, href) in originated {
                if keep.contains(&uid) {
                    continue;
                }
                let url = self.absolutize(&href);
                match self.client.delete(&url, &credentials).await {
                    Ok(()) => outcome.deleted += 1,
                    Err(e) => outcome.record_failure(format!("delete {}: {}", uid, e)),
                }
            }
        }

        debug!(
            calendar = %self.calendar_path,
            provider = %self.provider,
            created = outcome.created,
            updated = outcome.updated,
            deleted = outcome.deleted,
            failed = outcome.failed,
            "caldav push finished"
        );
        Ok(outcome)
    }
}

#[async_trait]
impl CalendarImporter for CalDavAdapter {
    async fn list_events(
        &self,
        user_id: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        only_locally_originated: bool,
    ) -> ProviderResult<Vec<ExternalEvent>> {
        let credentials = self.credentials(user_id).await?;
        let response = self
            .client
            .report(
                &self.calendar_url(),
                &xml::calendar_query_body(start, end),
                &credentials,
            )
            .await?;

        let mut events = Vec::new();
        for object in xml::parse_calendar_query(&response) {
            events.extend(ics::parse_ics(&object.calendar_data));
        }
        if only_locally_originated {
            events.retain(|e| e.is_locally_originated);
        }
        Ok(events)
    }

    async fn list_calendars(&self, user_id: UserId) -> ProviderResult<Vec<CalendarSummary>> {
        let credentials = self.credentials(user_id).await?;
        let home_set = self.discover_home_set(&credentials).await?;
        let home_url = self.absolutize(&home_set);
        let response = self
            .client
            .propfind(&home_url, xml::propfind_calendars_body(), 1, &credentials)
            .await?;

        let mut summaries: Vec<CalendarSummary> = xml::parse_calendar_propfind(&response)
            .into_iter()
            .map(|calendar| CalendarSummary {
                name: calendar
                    .display_name
                    .unwrap_or_else(|| calendar.href.clone()),
                primary: false,
                id: calendar.href,
            })
            .collect();
        // CalDAV has no default-calendar marker; the first collection wins
        if let Some(first) = summaries.first_mut() {
            first.primary = true;
        }
        Ok(summaries)
    }
}
