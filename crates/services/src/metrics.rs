//! Prometheus metrics for calendar sync operations

use integrations::PushOutcome;
use metrics::counter;
use shared::types::ProviderKind;

/// Metric names for sync operations
pub mod names {
    pub const PUSH_EVENTS: &str = "calendar_sync_push_events_total";
    pub const PUSH_FAILURES: &str = "calendar_sync_push_failures_total";
    pub const IMPORT_CYCLES: &str = "calendar_import_cycles_total";
    pub const IMPORT_EVENTS: &str = "calendar_import_events_total";
    pub const IMPORT_ERRORS: &str = "calendar_import_errors_total";
    pub const CONFLICTS_DETECTED: &str = "calendar_conflicts_detected_total";
}

/// Record the outcome of one push to one provider
pub fn record_push(provider: ProviderKind, outcome: &PushOutcome) {
    let provider = provider.to_string();
    counter!(names::PUSH_EVENTS, "provider" => provider.clone(), "op" => "created")
        .increment(outcome.created as u64);
    counter!(names::PUSH_EVENTS, "provider" => provider.clone(), "op" => "updated")
        .increment(outcome.updated as u64);
    counter!(names::PUSH_EVENTS, "provider" => provider.clone(), "op" => "deleted")
        .increment(outcome.deleted as u64);
    counter!(names::PUSH_FAILURES, "provider" => provider).increment(outcome.failed as u64);
}

/// Record the start of an import cycle
pub fn record_import_cycle() {
    counter!(names::IMPORT_CYCLES).increment(1);
}

/// Record the dispositions of one calendar's imported events
pub fn record_import_events(accepted: u32, conflicting: u32, skipped: u32) {
    counter!(names::IMPORT_EVENTS, "disposition" => "accepted").increment(accepted as u64);
    counter!(names::IMPORT_EVENTS, "disposition" => "conflicting").increment(conflicting as u64);
    counter!(names::IMPORT_EVENTS, "disposition" => "skipped").increment(skipped as u64);
}

/// Record one failed import attempt
pub fn record_import_error(provider: ProviderKind) {
    counter!(names::IMPORT_ERRORS, "provider" => provider.to_string()).increment(1);
}

/// Record detected conflicts
pub fn record_conflicts_detected(count: u64) {
    counter!(names::CONFLICTS_DETECTED).increment(count);
}
