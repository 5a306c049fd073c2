//! Google Calendar adapter

pub mod wire;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{CalendarSummary, ConnectedCalendar, ExternalEvent, TimeBlock};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use shared::types::{BlockId, ProviderKind, UserId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::auth::{warn_if_expiring, AccessToken, TokenSource};
use crate::contract::{CalendarImporter, CalendarSyncer, PushOutcome};
use crate::error::{ProviderError, ProviderResult};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

enum Upserted {
    Created,
    Updated,
}

/// Adapter bound to one connected Google calendar
pub struct GoogleCalendarAdapter {
    client: Client,
    base_url: String,
    calendar_id: String,
    attendees: Vec<String>,
    reminder_minutes: Vec<i64>,
    tokens: Arc<dyn TokenSource>,
}

impl GoogleCalendarAdapter {
    pub fn new(
        calendar: &ConnectedCalendar,
        tokens: Arc<dyn TokenSource>,
    ) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let base_url = calendar
            .config_value("base_url")
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        // Per-calendar push extras live in the calendar's provider config
        let attendees = calendar
            .config_value("attendees")
            .map(|raw| raw.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();
        let reminder_minutes = calendar
            .config_value("reminder_minutes")
            .map(|raw| {
                raw.split(',')
                    .filter_map(|s| s.trim().parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            client,
            base_url,
            calendar_id: calendar.external_calendar_id().to_string(),
            attendees,
            reminder_minutes,
            tokens,
        })
    }

    fn events_url(&self) -> String {
        format!("{}/calendars/{}/events", self.base_url, self.calendar_id)
    }

    async fn bearer(&self, user_id: UserId) -> ProviderResult<AccessToken> {
        let token = self.tokens.token(user_id).await?;
        warn_if_expiring(&token, ProviderKind::Google);
        Ok(token)
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> ProviderResult<T> {
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            serde_json::from_str(&body)
                .map_err(|e| ProviderError::InvalidResponse(format!("{}: {}", e, body)))
        } else {
            Err(ProviderError::from_status(status.as_u16(), body))
        }
    }

    async fn check_status(response: reqwest::Response) -> ProviderResult<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::from_status(status.as_u16(), body))
    }

    /// List events, optionally windowed and filtered to originated ones
    async fn list_raw(
        &self,
        token: &AccessToken,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
        only_originated: bool,
    ) -> ProviderResult<Vec<wire::GoogleEvent>> {
        let mut request = self
            .client
            .get(self.events_url())
            .bearer_auth(&token.secret)
            .query(&[
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
                ("maxResults", "2500"),
            ]);
        if only_originated {
            request = request.query(&[(
                "privateExtendedProperty",
                format!("{}={}", wire::ORIGIN_MARKER_KEY, wire::ORIGIN_MARKER_VALUE),
            )]);
        }
        if let Some((start, end)) = window {
            request = request.query(&[
                ("timeMin", start.to_rfc3339()),
                ("timeMax", end.to_rfc3339()),
            ]);
        }

        let list: wire::GoogleEventList = Self::handle_response(request.send().await?).await?;
        Ok(list.items.unwrap_or_default())
    }

    /// Create the event, falling back to an update keyed by the block id
    /// when the event already exists
    async fn upsert_block(
        &self,
        token: &AccessToken,
        block: &TimeBlock,
    ) -> ProviderResult<Upserted> {
        let body = wire::event_body(block, &self.attendees, &self.reminder_minutes);

        let response = self
            .client
            .post(self.events_url())
            .bearer_auth(&token.secret)
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            let url = format!("{}/{}", self.events_url(), wire::event_id(block.id));
            let response = self
                .client
                .put(&url)
                .bearer_auth(&token.secret)
                .json(&body)
                .send()
                .await?;
            Self::check_status(response).await?;
            return Ok(Upserted::Updated);
        }

        Self::check_status(response).await?;
        Ok(Upserted::Created)
    }

    async fn delete_event(&self, token: &AccessToken, event_id: &str) -> ProviderResult<()> {
        let url = format!("{}/{}", self.events_url(), event_id);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&token.secret)
            .send()
            .await?;
        Self::check_status(response).await
    }
}

#[async_trait]
impl CalendarSyncer for GoogleCalendarAdapter {
    async fn push(
        &self,
        user_id: UserId,
        blocks: &[TimeBlock],
        delete_missing: bool,
    ) -> ProviderResult<PushOutcome> {
        let token = self.bearer(user_id).await?;

        // Enumerate originated events up front; failures here abort before
        // any per-event work
        let existing = if delete_missing {
            self.list_raw(&token, None, true).await?
        } else {
            Vec::new()
        };

        let mut outcome = PushOutcome::default();
        for block in blocks {
            match self.upsert_block(&token, block).await {
                Ok(Upserted::Created) => outcome.created += 1,
                Ok(Upserted::Updated) => outcome.updated += 1,
                Err(e) => outcome.record_failure(format!("block {}: {}", block.id, e)),
            }
        }

        if delete_missing {
            let keep: HashSet<BlockId> = blocks.iter().map(|b| b.id).collect();
            for event_id in wire::deletable_event_ids(&existing, &keep) {
                match self.delete_event(&token, &event_id).await {
                    Ok(()) => outcome.deleted += 1,
                    Err(e) => outcome.record_failure(format!("delete {}: {}", event_id, e)),
                }
            }
        }

        debug!(
            calendar = %self.calendar_id,
            created = outcome.created,
            updated = outcome.updated,
            deleted = outcome.deleted,
            failed = outcome.failed,
            "google push finished"
        );
        Ok(outcome)
    }
}

#[async_trait]
impl CalendarImporter for GoogleCalendarAdapter {
    async fn list_events(
        &self,
        user_id: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        only_locally_originated: bool,
    ) -> ProviderResult<Vec<ExternalEvent>> {
        let token = self.bearer(user_id).await?;
        let events = self
            .list_raw(&token, Some((start, end)), only_locally_originated)
            .await?;
        Ok(events
            .into_iter()
            .filter_map(wire::GoogleEvent::into_external)
            .filter(|e| !only_locally_originated || e.is_locally_originated)
            .collect())
    }

    async fn list_calendars(&self, user_id: UserId) -> ProviderResult<Vec<CalendarSummary>> {
        let token = self.bearer(user_id).await?;
        let url = format!("{}/users/me/calendarList", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&token.secret)
            .send()
            .await?;
        let list: wire::GoogleCalendarList = Self::handle_response(response).await?;
        Ok(list
            .items
            .unwrap_or_default()
            .into_iter()
            .map(|entry| CalendarSummary {
                name: entry.summary.unwrap_or_else(|| entry.id.clone()),
                primary: entry.primary.unwrap_or(false),
                id: entry.id,
            })
            .collect())
    }
}
