//! Row model for per-calendar sync state

use chrono::{DateTime, Utc};
use domain::SyncState;
use shared::types::{ProviderKind, SyncStateId, UserId};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct SyncStateRow {
    pub id: SyncStateId,
    pub user_id: UserId,
    pub external_calendar_id: String,
    pub provider: ProviderKind,
    pub sync_token: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_sync_hash: Option<String>,
    pub sync_errors: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncStateRow {
    pub fn into_domain(self) -> SyncState {
        SyncState {
            id: self.id,
            user_id: self.user_id,
            external_calendar_id: self.external_calendar_id,
            provider: self.provider,
            sync_token: self.sync_token.unwrap_or_default(),
            last_synced_at: self.last_synced_at,
            last_sync_hash: self.last_sync_hash.unwrap_or_default(),
            consecutive_errors: self.sync_errors,
            last_error: self.last_error.unwrap_or_default(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
