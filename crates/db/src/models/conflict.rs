//! Row model for recorded calendar conflicts

use chrono::{DateTime, Utc};
use domain::{Conflict, ConflictKind, ConflictStatus};
use shared::types::{BlockId, ConflictId, TimeRange, UserId};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct ConflictRow {
    pub id: ConflictId,
    pub user_id: UserId,
    pub kind: String,
    pub block_id: BlockId,
    pub block_title: String,
    pub block_start: DateTime<Utc>,
    pub block_end: DateTime<Utc>,
    pub external_event_id: String,
    pub external_start: DateTime<Utc>,
    pub external_end: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl ConflictRow {
    pub fn into_domain(self) -> Result<Conflict, String> {
        Ok(Conflict {
            id: self.id,
            user_id: self.user_id,
            kind: self.kind.parse::<ConflictKind>()?,
            block_id: self.block_id,
            block_title: self.block_title,
            block_range: TimeRange {
                start: self.block_start,
                end: self.block_end,
            },
            external_event_id: self.external_event_id,
            external_range: TimeRange {
                start: self.external_start,
                end: self.external_end,
            },
            status: self.status.parse::<ConflictStatus>()?,
            created_at: self.created_at,
        })
    }
}
