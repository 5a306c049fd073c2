//! Transactional connect/update of external calendars

use domain::{CalendarSummary, ConnectedCalendar};
use integrations::ProviderRegistry;
use serde::Deserialize;
use shared::types::{ProviderKind, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::error::ServiceResult;
use crate::store::CalendarStore;

/// Command to connect or update one external calendar
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ConnectCommand {
    pub user_id: UserId,
    pub provider: ProviderKind,
    #[validate(length(min = 1, message = "external calendar id must not be empty"))]
    pub external_calendar_id: String,
    #[validate(length(min = 1, message = "calendar name must not be empty"))]
    pub name: String,
    pub set_as_primary: bool,
    pub enable_push: bool,
    pub enable_pull: bool,
    #[serde(default)]
    pub provider_config: HashMap<String, String>,
}

/// Command to connect several calendars of one provider in one call
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectMultipleCommand {
    pub user_id: UserId,
    pub provider: ProviderKind,
    /// (external calendar id, display name) pairs
    pub calendars: Vec<(String, String)>,
    /// Only the first pair becomes primary
    pub set_first_primary: bool,
    pub enable_push: bool,
    pub enable_pull: bool,
    #[serde(default)]
    pub provider_config: HashMap<String, String>,
}

/// Per-item accounting for [`ConnectService::connect_multiple`]
#[derive(Debug, Default)]
pub struct ConnectMultipleOutcome {
    pub connected: u32,
    pub failed: u32,
    pub errors: Vec<String>,
}

pub struct ConnectService {
    store: Arc<dyn CalendarStore>,
}

impl ConnectService {
    pub fn new(store: Arc<dyn CalendarStore>) -> Self {
        Self { store }
    }

    /// Connect a calendar, or update it if the (user, provider, external id)
    /// binding already exists. The aggregate write and the outbox batch
    /// commit in one transaction.
    pub async fn connect(&self, cmd: ConnectCommand) -> ServiceResult<ConnectedCalendar> {
        cmd.validate()?;

        let existing = self
            .store
            .find_by_binding(cmd.user_id, cmd.provider, cmd.external_calendar_id.trim())
            .await?;

        match existing {
            Some(mut calendar) => {
                calendar.update_settings(
                    &cmd.name,
                    cmd.enable_push,
                    cmd.enable_pull,
                    &cmd.provider_config,
                )?;
                let promote = cmd.set_as_primary && !calendar.is_primary();
                if promote {
                    let previous = self
                        .store
                        .find_primary(cmd.user_id)
                        .await?
                        .map(|c| c.id());
                    calendar.set_primary(previous);
                }
                self.store.update(&mut calendar, promote).await?;
                info!(
                    calendar_id = %calendar.id(),
                    provider = %cmd.provider,
                    "updated connected calendar"
                );
                Ok(calendar)
            }
            None => {
                let mut calendar = ConnectedCalendar::connect(
                    cmd.user_id,
                    cmd.provider,
                    &cmd.external_calendar_id,
                    &cmd.name,
                )?;
                calendar.configure(
                    cmd.enable_push,
                    cmd.enable_pull,
                    cmd.provider_config.clone(),
                );
                if cmd.set_as_primary {
                    let previous = self
                        .store
                        .find_primary(cmd.user_id)
                        .await?
                        .map(|c| c.id());
                    calendar.set_primary(previous);
                }
                self.store.insert(&mut calendar, cmd.set_as_primary).await?;
                info!(
                    calendar_id = %calendar.id(),
                    provider = %cmd.provider,
                    "connected calendar"
                );
                Ok(calendar)
            }
        }
    }

    /// Connect several calendars; a failure on one never aborts the loop.
    pub async fn connect_multiple(
        &self,
        cmd: ConnectMultipleCommand,
    ) -> ServiceResult<ConnectMultipleOutcome> {
        let mut outcome = ConnectMultipleOutcome::default();
        for (index, (external_id, name)) in cmd.calendars.iter().enumerate() {
            let item = ConnectCommand {
                user_id: cmd.user_id,
                provider: cmd.provider,
                external_calendar_id: external_id.clone(),
                name: name.clone(),
                set_as_primary: cmd.set_first_primary && index == 0,
                enable_push: cmd.enable_push,
                enable_pull: cmd.enable_pull,
                provider_config: cmd.provider_config.clone(),
            };
            match self.connect(item).await {
                Ok(_) => outcome.connected += 1,
                Err(e) => {
                    outcome.failed += 1;
                    outcome
                        .errors
                        .push(format!("failed to connect {}: {}", name, e));
                }
            }
        }
        Ok(outcome)
    }

    /// Enumerate candidate calendars before anything is persisted.
    ///
    /// Builds a transient aggregate for the registry lookup and drops its
    /// events, since nothing here is durable.
    pub async fn list_available_calendars(
        &self,
        registry: &ProviderRegistry,
        user_id: UserId,
        provider: ProviderKind,
        provider_config: HashMap<String, String>,
    ) -> ServiceResult<Vec<CalendarSummary>> {
        let mut transient =
            ConnectedCalendar::connect(user_id, provider, "pending", "Pending")?;
        transient.configure(true, true, provider_config);
        transient.discard_events();

        let importer = registry.create_importer(&transient)?;
        Ok(importer.list_calendars(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockCalendarStore;
    use domain::CalendarEventKind;

    fn command(user_id: UserId) -> ConnectCommand {
        ConnectCommand {
            user_id,
            provider: ProviderKind::Google,
            external_calendar_id: "primary".to_string(),
            name: "Work".to_string(),
            set_as_primary: true,
            enable_push: true,
            enable_pull: false,
            provider_config: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_connect_new_primary_emits_connected_and_primary_set() {
        let user_id = UserId::new();
        let mut store = MockCalendarStore::new();
        store
            .expect_find_by_binding()
            .returning(|_, _, _| Ok(None));
        store.expect_find_primary().returning(|_| Ok(None));
        store
            .expect_insert()
            .withf(|calendar, demote| {
                let keys: Vec<&str> = calendar
                    .pending_events()
                    .iter()
                    .map(|e| e.routing_key())
                    .collect();
                keys == ["calendar.connected", "calendar.primary_set"] && *demote
            })
            .returning(|calendar, _| {
                calendar.take_events();
                Ok(())
            });

        let service = ConnectService::new(Arc::new(store));
        let calendar = service.connect(command(user_id)).await.unwrap();
        assert!(calendar.is_primary());
        assert!(calendar.sync_push());
        assert!(!calendar.sync_pull());
        assert!(calendar.pending_events().is_empty());
    }

    #[tokio::test]
    async fn test_connect_update_path_keeps_primary_and_emits_updated() {
        let user_id = UserId::new();
        let mut existing =
            ConnectedCalendar::connect(user_id, ProviderKind::Google, "primary", "Work").unwrap();
        existing.set_primary(None);
        existing.take_events();

        let mut store = MockCalendarStore::new();
        store
            .expect_find_by_binding()
            .returning(move |_, _, _| Ok(Some(existing.clone())));
        store
            .expect_update()
            .withf(|calendar, demote| {
                let keys: Vec<&str> = calendar
                    .pending_events()
                    .iter()
                    .map(|e| e.routing_key())
                    .collect();
                keys == ["calendar.updated"] && !*demote
            })
            .returning(|calendar, _| {
                calendar.take_events();
                Ok(())
            });

        let service = ConnectService::new(Arc::new(store));
        let mut cmd = command(user_id);
        cmd.name = "Work 2".to_string();
        cmd.set_as_primary = false;
        cmd.enable_pull = true;

        let calendar = service.connect(cmd).await.unwrap();
        assert_eq!(calendar.name(), "Work 2");
        // Primary status is untouched by a non-primary update
        assert!(calendar.is_primary());
    }

    #[tokio::test]
    async fn test_connect_update_promotion_records_previous_primary() {
        let user_id = UserId::new();
        let mut existing =
            ConnectedCalendar::connect(user_id, ProviderKind::Google, "team", "Team").unwrap();
        existing.take_events();
        let mut previous =
            ConnectedCalendar::connect(user_id, ProviderKind::Caldav, "old", "Old").unwrap();
        previous.set_primary(None);
        previous.take_events();
        let previous_primary_id = previous.id();

        let mut store = MockCalendarStore::new();
        store
            .expect_find_by_binding()
            .returning(move |_, _, _| Ok(Some(existing.clone())));
        store
            .expect_find_primary()
            .returning(move |_| Ok(Some(previous.clone())));
        store
            .expect_update()
            .withf(move |calendar, demote| {
                *demote
                    && calendar.pending_events().iter().any(|e| {
                        matches!(
                            &e.kind,
                            CalendarEventKind::PrimarySet { previous_primary_id: Some(id) }
                                if *id == previous_primary_id
                        )
                    })
            })
            .returning(|calendar, _| {
                calendar.take_events();
                Ok(())
            });

        let service = ConnectService::new(Arc::new(store));
        let mut cmd = command(user_id);
        cmd.external_calendar_id = "team".to_string();
        cmd.name = "Team".to_string();
        let calendar = service.connect(cmd).await.unwrap();
        assert!(calendar.is_primary());
    }

    #[tokio::test]
    async fn test_connect_validation_rejects_empty_fields() {
        let store = MockCalendarStore::new();
        let service = ConnectService::new(Arc::new(store));
        let mut cmd = command(UserId::new());
        cmd.external_calendar_id = String::new();
        let result = service.connect(cmd).await;
        assert!(matches!(result, Err(crate::ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_connect_multiple_collects_failures() {
        let user_id = UserId::new();
        let mut store = MockCalendarStore::new();
        store
            .expect_find_by_binding()
            .returning(|_, _, _| Ok(None));
        store.expect_find_primary().returning(|_| Ok(None));
        store
            .expect_insert()
            .returning(|calendar, _| {
                if calendar.external_calendar_id() == "broken" {
                    Err(crate::ServiceError::Database("insert failed".to_string()))
                } else {
                    calendar.take_events();
                    Ok(())
                }
            });

        let service = ConnectService::new(Arc::new(store));
        let outcome = service
            .connect_multiple(ConnectMultipleCommand {
                user_id,
                provider: ProviderKind::Google,
                calendars: vec![
                    ("work".to_string(), "Work".to_string()),
                    ("broken".to_string(), "Broken".to_string()),
                    ("home".to_string(), "Home".to_string()),
                ],
                set_first_primary: true,
                enable_push: true,
                enable_pull: true,
                provider_config: HashMap::new(),
            })
            .await
            .unwrap();

        assert_eq!(outcome.connected, 2);
        assert_eq!(outcome.failed, 1);
        assert!(outcome.errors[0].starts_with("failed to connect Broken:"));
    }
}
