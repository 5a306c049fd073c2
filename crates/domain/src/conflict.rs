//! Overlap detection between external events and local schedule blocks

use crate::external_event::ExternalEvent;
use crate::schedule::{Schedule, TimeBlock};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::types::{BlockId, ConflictId, TimeRange, UserId};

/// How the external event's range relates to the local block's range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// The event fully contains the block
    Contains,
    /// The event is fully contained by the block
    ContainedBy,
    /// The event overlaps the leading edge of the block
    OverlapsStart,
    /// The event overlaps the trailing edge of the block
    OverlapsEnd,
}

impl ConflictKind {
    /// Classify the overlap of an external event range against a block
    /// range. Returns `None` when the ranges do not overlap; touching
    /// endpoints are not an overlap.
    pub fn classify(block: &TimeRange, event: &TimeRange) -> Option<ConflictKind> {
        if !block.overlaps(event) {
            return None;
        }
        if event.contains_range(block) {
            Some(ConflictKind::Contains)
        } else if block.contains_range(event) {
            Some(ConflictKind::ContainedBy)
        } else if event.start < block.start {
            Some(ConflictKind::OverlapsStart)
        } else {
            Some(ConflictKind::OverlapsEnd)
        }
    }
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::Contains => write!(f, "contains"),
            ConflictKind::ContainedBy => write!(f, "contained_by"),
            ConflictKind::OverlapsStart => write!(f, "overlaps_start"),
            ConflictKind::OverlapsEnd => write!(f, "overlaps_end"),
        }
    }
}

impl std::str::FromStr for ConflictKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contains" => Ok(ConflictKind::Contains),
            "contained_by" => Ok(ConflictKind::ContainedBy),
            "overlaps_start" => Ok(ConflictKind::OverlapsStart),
            "overlaps_end" => Ok(ConflictKind::OverlapsEnd),
            other => Err(format!("unknown conflict kind: {}", other)),
        }
    }
}

/// Resolution status of a recorded conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    Pending,
    Resolved,
    Dismissed,
}

impl std::fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictStatus::Pending => write!(f, "pending"),
            ConflictStatus::Resolved => write!(f, "resolved"),
            ConflictStatus::Dismissed => write!(f, "dismissed"),
        }
    }
}

impl std::str::FromStr for ConflictStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ConflictStatus::Pending),
            "resolved" => Ok(ConflictStatus::Resolved),
            "dismissed" => Ok(ConflictStatus::Dismissed),
            other => Err(format!("unknown conflict status: {}", other)),
        }
    }
}

/// A detected overlap between a local block and an external event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub id: ConflictId,
    pub user_id: UserId,
    pub kind: ConflictKind,
    pub block_id: BlockId,
    pub block_title: String,
    pub block_range: TimeRange,
    pub external_event_id: String,
    pub external_range: TimeRange,
    pub status: ConflictStatus,
    pub created_at: DateTime<Utc>,
}

impl Conflict {
    /// Detect a conflict between one block and one external event.
    pub fn detect(user_id: UserId, block: &TimeBlock, event: &ExternalEvent) -> Option<Conflict> {
        let kind = ConflictKind::classify(&block.range(), &event.range())?;
        Some(Conflict {
            id: ConflictId::new(),
            user_id,
            kind,
            block_id: block.id,
            block_title: block.title.clone(),
            block_range: block.range(),
            external_event_id: event.external_id.clone(),
            external_range: event.range(),
            status: ConflictStatus::Pending,
            created_at: Utc::now(),
        })
    }
}

/// Check an external event against every block of the given schedules.
pub fn find_conflicts(schedules: &[Schedule], event: &ExternalEvent) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for schedule in schedules {
        for block in &schedule.blocks {
            if let Some(conflict) = Conflict::detect(schedule.user_id, block, event) {
                conflicts.push(conflict);
            }
        }
    }
    conflicts
}
