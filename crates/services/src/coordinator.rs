//! Push fan-out across a user's enabled push calendars

use domain::{ConnectedCalendar, TimeBlock};
use integrations::{CalendarImporter, ProviderRegistry, PushOutcome};
use shared::types::{ProviderKind, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::error::{ServiceError, ServiceResult};
use crate::metrics;
use crate::store::CalendarStore;

/// Per-provider outcome of one fan-out, plus sidecar errors
#[derive(Debug, Default)]
pub struct MultiSyncResult {
    pub results: HashMap<ProviderKind, PushOutcome>,
    pub errors: Vec<String>,
}

impl MultiSyncResult {
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct SyncCoordinator {
    store: Arc<dyn CalendarStore>,
    registry: Arc<ProviderRegistry>,
}

impl SyncCoordinator {
    pub fn new(store: Arc<dyn CalendarStore>, registry: Arc<ProviderRegistry>) -> Self {
        Self { store, registry }
    }

    /// Push blocks to every enabled push calendar of the user.
    ///
    /// Best-effort across providers: one provider's failure never blocks
    /// another, and results are collected per provider kind.
    pub async fn sync_all(
        &self,
        user_id: UserId,
        blocks: &[TimeBlock],
        delete_missing: bool,
    ) -> ServiceResult<MultiSyncResult> {
        let calendars = self.store.find_enabled_push(user_id).await?;
        let mut result = MultiSyncResult::default();

        for mut calendar in calendars {
            let outcome = self
                .push_one(user_id, &mut calendar, blocks, delete_missing, &mut result)
                .await;
            result.results.insert(calendar.provider(), outcome);
        }
        Ok(result)
    }

    /// Push blocks to the user's first enabled push calendar of one provider
    pub async fn sync_to_provider(
        &self,
        user_id: UserId,
        provider: ProviderKind,
        blocks: &[TimeBlock],
        delete_missing: bool,
    ) -> ServiceResult<PushOutcome> {
        let mut calendar = self
            .store
            .find_enabled_push(user_id)
            .await?
            .into_iter()
            .find(|c| c.provider() == provider)
            .ok_or_else(|| ServiceError::NoPushCalendar(provider.display_name().to_string()))?;

        let mut sidecar = MultiSyncResult::default();
        let outcome = self
            .push_one(user_id, &mut calendar, blocks, delete_missing, &mut sidecar)
            .await;
        if let Some(error) = sidecar.errors.into_iter().next() {
            return Err(ServiceError::Validation(error));
        }
        Ok(outcome)
    }

    /// Importer for the user's primary calendar, falling back to the first
    /// enabled pull calendar
    pub async fn primary_importer(
        &self,
        user_id: UserId,
    ) -> ServiceResult<(ConnectedCalendar, Box<dyn CalendarImporter>)> {
        let calendar = match self.store.find_primary(user_id).await? {
            Some(calendar) => Some(calendar),
            None => self.store.find_first_enabled_pull(user_id).await?,
        };
        let calendar = calendar.ok_or(ServiceError::NoImportCalendar)?;
        let importer = self.registry.create_importer(&calendar)?;
        Ok((calendar, importer))
    }

    /// One push leg: create the syncer, push, mark the aggregate synced and
    /// persist it. The aggregate is marked synced regardless of push
    /// success; persist failures are sidecar errors, not sync failures.
    async fn push_one(
        &self,
        user_id: UserId,
        calendar: &mut ConnectedCalendar,
        blocks: &[TimeBlock],
        delete_missing: bool,
        sidecar: &mut MultiSyncResult,
    ) -> PushOutcome {
        let provider = calendar.provider();

        let outcome = match self.registry.create_syncer(calendar) {
            Ok(syncer) => match syncer.push(user_id, blocks, delete_missing).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(provider = %provider, error = %e, "push failed");
                    sidecar
                        .errors
                        .push(format!("{}: {}", provider.display_name(), e));
                    let mut failed = PushOutcome::default();
                    failed.failed = blocks.len() as u32;
                    failed.errors.push(e.to_string());
                    failed
                }
            },
            Err(e) => {
                sidecar
                    .errors
                    .push(format!("{}: {}", provider.display_name(), e));
                let mut failed = PushOutcome::default();
                failed.failed = blocks.len() as u32;
                failed.errors.push(e.to_string());
                failed
            }
        };

        metrics::record_push(provider, &outcome);

        calendar.mark_synced(
            outcome.created,
            outcome.updated,
            outcome.deleted,
            outcome.failed,
        );
        if let Err(e) = self.store.update(calendar, false).await {
            warn!(
                calendar_id = %calendar.id(),
                error = %e,
                "failed to persist sync completion"
            );
            sidecar
                .errors
                .push(format!("persist {}: {}", calendar.id(), e));
        }

        outcome
    }
}
