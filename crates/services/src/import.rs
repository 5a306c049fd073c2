//! Periodic pull loop importing external events and recording conflicts

use chrono::{Duration as ChronoDuration, Utc};
use domain::{compute_sync_hash, SyncState};
use integrations::ProviderRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::conflict::{ConflictHandler, EventDisposition};
use crate::error::ServiceResult;
use crate::metrics;
use crate::store::{CalendarStore, SyncStateStore};

#[derive(Debug, Clone)]
pub struct ImportWorkerConfig {
    /// How often a cycle runs
    pub interval: Duration,
    /// How far into the future events are fetched
    pub look_ahead_days: i64,
    /// How many calendars one cycle processes
    pub batch_size: i64,
    /// Calendars at or past this many consecutive errors are left alone
    pub max_errors: i32,
}

impl Default for ImportWorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            look_ahead_days: 7,
            batch_size: 10,
            max_errors: 5,
        }
    }
}

/// Counters for one import cycle
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub calendars: u32,
    pub accepted: u32,
    pub conflicting: u32,
    pub skipped: u32,
    pub failures: u32,
}

/// Long-running import loop.
///
/// Calendars in a batch are processed sequentially within a cycle;
/// parallelism comes from running multiple workers against disjoint
/// sync-state rows.
pub struct ImportWorker {
    calendars: Arc<dyn CalendarStore>,
    sync_states: Arc<dyn SyncStateStore>,
    registry: Arc<ProviderRegistry>,
    conflicts: Arc<ConflictHandler>,
    config: ImportWorkerConfig,
}

impl ImportWorker {
    pub fn new(
        calendars: Arc<dyn CalendarStore>,
        sync_states: Arc<dyn SyncStateStore>,
        registry: Arc<ProviderRegistry>,
        conflicts: Arc<ConflictHandler>,
        config: ImportWorkerConfig,
    ) -> Self {
        Self {
            calendars,
            sync_states,
            registry,
            conflicts,
            config,
        }
    }

    /// Run until the stop signal flips to `true`. One immediate cycle runs
    /// before the ticker is armed. Stopping is clean, not an error.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            batch_size = self.config.batch_size,
            "import worker starting"
        );

        self.run_cycle_logged(&stop).await;

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // the interval's immediate first tick

        loop {
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        info!("import worker stopping");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    self.run_cycle_logged(&stop).await;
                }
            }
        }
    }

    async fn run_cycle_logged(&self, stop: &watch::Receiver<bool>) {
        match self.run_cycle(stop).await {
            Ok(summary) => {
                debug!(
                    calendars = summary.calendars,
                    accepted = summary.accepted,
                    conflicting = summary.conflicting,
                    skipped = summary.skipped,
                    failures = summary.failures,
                    "import cycle finished"
                );
            }
            Err(e) => warn!(error = %e, "import cycle failed"),
        }
    }

    /// One import cycle over the pending batch
    pub async fn run_cycle(&self, stop: &watch::Receiver<bool>) -> ServiceResult<CycleSummary> {
        metrics::record_import_cycle();

        // Seed sync state for pull calendars seen for the first time
        let fresh = self
            .calendars
            .find_pull_enabled_without_state(self.config.batch_size)
            .await?;
        for calendar in fresh {
            let state = SyncState::new(
                calendar.user_id(),
                calendar.external_calendar_id(),
                calendar.provider(),
            );
            self.sync_states.save(&state).await?;
        }

        let cutoff = Utc::now()
            - ChronoDuration::from_std(self.config.interval)
                .unwrap_or_else(|_| ChronoDuration::seconds(300));
        let pending = self
            .sync_states
            .find_pending(cutoff, self.config.max_errors, self.config.batch_size)
            .await?;

        let mut summary = CycleSummary::default();
        for mut state in pending {
            // Return at a suspension point without writing partial state
            if *stop.borrow() {
                return Ok(summary);
            }
            self.sync_calendar(&mut state, &mut summary).await;
            summary.calendars += 1;
        }
        Ok(summary)
    }

    /// Import one calendar and persist its updated sync state.
    /// Failures are recorded on the state, never raised.
    async fn sync_calendar(&self, state: &mut SyncState, summary: &mut CycleSummary) {
        let calendar = match self
            .calendars
            .find_by_binding(state.user_id, state.provider, &state.external_calendar_id)
            .await
        {
            Ok(Some(calendar)) => calendar,
            Ok(None) => {
                self.record_failure(state, summary, "calendar no longer connected")
                    .await;
                return;
            }
            Err(e) => {
                self.record_failure(state, summary, &e.to_string()).await;
                return;
            }
        };

        let importer = match self.registry.create_importer(&calendar) {
            Ok(importer) => importer,
            Err(e) => {
                self.record_failure(state, summary, &e.to_string()).await;
                return;
            }
        };

        let window_start = Utc::now();
        let window_end = window_start + ChronoDuration::days(self.config.look_ahead_days);
        let events = match importer
            .list_events(state.user_id, window_start, window_end, false)
            .await
        {
            Ok(events) => events,
            Err(e) => {
                self.record_failure(state, summary, &e.to_string()).await;
                return;
            }
        };

        let mut accepted = 0u32;
        let mut conflicting = 0u32;
        let mut skipped = 0u32;
        for event in &events {
            match self.conflicts.handle_event(state.user_id, event).await {
                Ok(EventDisposition::Accepted) => accepted += 1,
                Ok(EventDisposition::AcceptedWithConflicts(_)) => {
                    accepted += 1;
                    conflicting += 1;
                }
                Ok(EventDisposition::Skipped(reason)) => {
                    debug!(event = %event.external_id, reason = %reason, "event skipped");
                    skipped += 1;
                }
                Err(e) => {
                    // Fail policy stops this calendar's cycle
                    self.record_failure(state, summary, &e.to_string()).await;
                    return;
                }
            }
        }

        let fingerprint = compute_sync_hash(&events);
        state.mark_success("", &fingerprint);
        if let Err(e) = self.sync_states.save(state).await {
            warn!(
                calendar = %state.external_calendar_id,
                error = %e,
                "failed to persist sync state"
            );
            summary.failures += 1;
            return;
        }

        metrics::record_import_events(accepted, conflicting, skipped);
        summary.accepted += accepted;
        summary.conflicting += conflicting;
        summary.skipped += skipped;
    }

    async fn record_failure(&self, state: &mut SyncState, summary: &mut CycleSummary, message: &str) {
        warn!(
            calendar = %state.external_calendar_id,
            provider = %state.provider,
            error = %message,
            "import failed"
        );
        metrics::record_import_error(state.provider);
        state.mark_failure(message);
        summary.failures += 1;
        if let Err(e) = self.sync_states.save(state).await {
            warn!(error = %e, "failed to persist sync failure");
        }
    }
}
