//! Adapter contracts every provider family implements

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{CalendarSummary, ExternalEvent, TimeBlock};
use serde::Serialize;
use shared::types::UserId;

use crate::error::ProviderResult;

/// Aggregate counters for one push call.
///
/// Individual event failures are counted here rather than aborting the
/// batch; the call itself only errors when authentication or enumeration
/// fails before per-event work begins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushOutcome {
    pub created: u32,
    pub updated: u32,
    pub deleted: u32,
    pub failed: u32,
    pub errors: Vec<String>,
}

impl PushOutcome {
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.failed += 1;
        self.errors.push(message.into());
    }

    pub fn total_written(&self) -> u32 {
        self.created + self.updated + self.deleted
    }
}

/// Pushes local blocks into a remote calendar
#[async_trait]
pub trait CalendarSyncer: Send + Sync {
    /// Upsert every block into the remote calendar. With `delete_missing`,
    /// originated remote events whose local id is not in `blocks` are
    /// deleted afterwards; non-originated events are never touched.
    async fn push(
        &self,
        user_id: UserId,
        blocks: &[TimeBlock],
        delete_missing: bool,
    ) -> ProviderResult<PushOutcome>;
}

/// Reads external events and calendar listings out of a remote calendar
#[async_trait]
pub trait CalendarImporter: Send + Sync {
    /// Events whose time range overlaps `[start, end)`, normalized to UTC.
    /// With `only_locally_originated`, events not bearing this system's
    /// marker are filtered out.
    async fn list_events(
        &self,
        user_id: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        only_locally_originated: bool,
    ) -> ProviderResult<Vec<ExternalEvent>>;

    /// Enumerate candidate calendars during connect flows
    async fn list_calendars(&self, user_id: UserId) -> ProviderResult<Vec<CalendarSummary>>;
}

/// A provider that can both push and import
pub trait BidirectionalProvider: CalendarSyncer + CalendarImporter {}

impl<T: CalendarSyncer + CalendarImporter> BidirectionalProvider for T {}

/// Trailer appended to every event description this system writes
pub const MANAGED_BY: &str = "Managed by Orbita";

/// Render the description body for a pushed block
pub fn block_description(block: &TimeBlock) -> String {
    let mut lines = vec![format!("Type: {}", block.kind.label())];
    if block.completed {
        lines.push("Status: Completed".to_string());
    } else if block.missed {
        lines.push("Status: Missed".to_string());
    }
    lines.push(MANAGED_BY.to_string());
    lines.join("\n")
}
