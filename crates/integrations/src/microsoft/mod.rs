//! Microsoft Graph calendar adapter

pub mod wire;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{CalendarSummary, ConnectedCalendar, ExternalEvent, TimeBlock};
use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::types::{BlockId, ProviderKind, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::auth::{warn_if_expiring, AccessToken, TokenSource};
use crate::contract::{CalendarImporter, CalendarSyncer, PushOutcome};
use crate::error::{ProviderError, ProviderResult};

const DEFAULT_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Reads are pinned to UTC so Graph returns normalized instants
const PREFER_UTC: &str = "outlook.timezone=\"UTC\"";

/// Adapter bound to one connected Outlook calendar
pub struct MicrosoftCalendarAdapter {
    client: Client,
    base_url: String,
    calendar_id: String,
    tokens: Arc<dyn TokenSource>,
}

impl MicrosoftCalendarAdapter {
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

        Ok(Self {
            client,
            base_url,
            calendar_id: calendar.external_calendar_id().to_string(),
            tokens,
        })
    }

    fn uses_default_calendar(&self) -> bool {
        matches!(self.calendar_id.as_str(), "primary" | "default")
    }

    fn events_url(&self) -> String {
        if self.uses_default_calendar() {
            format!("{}/me/events", self.base_url)
        } else {
            format!("{}/me/calendars/{}/events", self.base_url, self.calendar_id)
        }
    }

    fn calendar_view_url(&self) -> String {
        if self.uses_default_calendar() {
            format!("{}/me/calendarView", self.base_url)
        } else {
            format!(
                "{}/me/calendars/{}/calendarView",
                self.base_url, self.calendar_id
            )
        }
    }

    async fn bearer(&self, user_id: UserId) -> ProviderResult<AccessToken> {
        let token = self.tokens.token(user_id).await?;
        warn_if_expiring(&token, ProviderKind::Microsoft);
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

    /// Enumerate originated events by category filter. The subject prefix
    /// match happens client-side.
    async fn list_originated(
        &self,
        token: &AccessToken,
    ) -> ProviderResult<Vec<wire::GraphEvent>> {
        let filter = format!(
            "categories/any(c:c eq '{}')",
            wire::ORIGIN_CATEGORY
        );
        let response = self
            .client
            .get(self.events_url())
            .bearer_auth(&token.secret)
            .header("Prefer", PREFER_UTC)
            .query(&[("$filter", filter.as_str()), ("$top", "500")])
            .send()
            .await?;
        let list: wire::GraphEventList = Self::handle_response(response).await?;
        Ok(list.value.unwrap_or_default())
    }
}

#[async_trait]
impl CalendarSyncer for MicrosoftCalendarAdapter {
    async fn push(
        &self,
        user_id: UserId,
        blocks: &[TimeBlock],
        delete_missing: bool,
    ) -> ProviderResult<PushOutcome> {
        let token = self.bearer(user_id).await?;

        // One enumeration serves both counterpart matching and
        // delete-missing; failures here abort before per-event work
        let existing = self.list_originated(&token).await?;
        let mut by_block: HashMap<BlockId, String> = HashMap::new();
        for event in &existing {
            if let (Some(block_id), Some(id)) = (event.local_block_id(), event.id.clone()) {
                by_block.insert(block_id, id);
            }
        }

        let mut outcome = PushOutcome::default();
        for block in blocks {
            let body = wire::event_body(block);
            let result = match by_block.get(&block.id) {
                Some(event_id) => {
                    let url = format!("{}/{}", self.events_url(), event_id);
                    let response = self
                        .client
                        .patch(&url)
                        .bearer_auth(&token.secret)
                        .json(&body)
                        .send()
                        .await;
                    match response {
                        Ok(response) => Self::check_status(response).await.map(|_| {
                            outcome.updated += 1;
                        }),
                        Err(e) => Err(e.into()),
                    }
                }
                None => {
                    let response = self
                        .client
                        .post(self.events_url())
                        .bearer_auth(&token.secret)
                        .json(&body)
                        .send()
                        .await;
                    match response {
                        Ok(response) => Self::check_status(response).await.map(|_| {
                            outcome.created += 1;
                        }),
                        Err(e) => Err(e.into()),
                    }
                }
            };
            if let Err(e) = result {
                outcome.record_failure(format!("block {}: {}", block.id, e));
            }
        }

        if delete_missing {
            let keep: HashSet<BlockId> = blocks.iter().map(|b| b.id).collect();
            for event_id in wire::deletable_event_ids(&existing, &keep) {
                let url = format!("{}/{}", self.events_url(), event_id);
                let result = match self
                    .client
                    .delete(&url)
                    .bearer_auth(&token.secret)
                    .send()
                    .await
                {
                    Ok(response) => Self::check_status(response).await,
                    Err(e) => Err(e.into()),
                };
                match result {
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
            "graph push finished"
        );
        Ok(outcome)
    }
}

#[async_trait]
impl CalendarImporter for MicrosoftCalendarAdapter {
    async fn list_events(
        &self,
        user_id: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        only_locally_originated: bool,
    ) -> ProviderResult<Vec<ExternalEvent>> {
        let token = self.bearer(user_id).await?;
        let response = self
            .client
            .get(self.calendar_view_url())
            .bearer_auth(&token.secret)
            .header("Prefer", PREFER_UTC)
            .query(&[
                ("startDateTime", start.to_rfc3339()),
                ("endDateTime", end.to_rfc3339()),
                ("$top", "500".to_string()),
            ])
            .send()
            .await?;
        let list: wire::GraphEventList = Self::handle_response(response).await?;

        Ok(list
            .value
            .unwrap_or_default()
            .into_iter()
            .filter_map(wire::GraphEvent::into_external)
            .filter(|e| !only_locally_originated || e.is_locally_originated)
            .collect())
    }

    async fn list_calendars(&self, user_id: UserId) -> ProviderResult<Vec<CalendarSummary>> {
        let token = self.bearer(user_id).await?;
        let url = format!("{}/me/calendars", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&token.secret)
            .send()
            .await?;
        let list: wire::GraphCalendarList = Self::handle_response(response).await?;
        Ok(list
            .value
            .unwrap_or_default()
            .into_iter()
            .map(|calendar| CalendarSummary {
                name: calendar.name.unwrap_or_else(|| calendar.id.clone()),
                primary: calendar.is_default_calendar.unwrap_or(false),
                id: calendar.id,
            })
            .collect())
    }
}
