//! Per-calendar incremental-sync bookkeeping

use crate::external_event::ExternalEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared::types::{ProviderKind, SyncStateId, UserId};

/// Sync bookkeeping for one (user, external calendar) pair.
///
/// Created lazily on first import; persisted between cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub id: SyncStateId,
    pub user_id: UserId,
    pub external_calendar_id: String,
    pub provider: ProviderKind,
    /// Provider-defined cursor; empty means a full fetch is needed
    pub sync_token: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_sync_hash: String,
    pub consecutive_errors: i32,
    pub last_error: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncState {
    pub fn new(user_id: UserId, external_calendar_id: &str, provider: ProviderKind) -> Self {
        let now = Utc::now();
        Self {
            id: SyncStateId::new(),
            user_id,
            external_calendar_id: external_calendar_id.to_string(),
            provider,
            sync_token: String::new(),
            last_synced_at: None,
            last_sync_hash: String::new(),
            consecutive_errors: 0,
            last_error: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a successful sync cycle. Resets the error counter.
    pub fn mark_success(&mut self, sync_token: &str, hash: &str) {
        self.sync_token = sync_token.to_string();
        self.last_sync_hash = hash.to_string();
        self.last_synced_at = Some(Utc::now());
        self.consecutive_errors = 0;
        self.last_error = String::new();
        self.updated_at = Utc::now();
    }

    /// Record a failed sync cycle.
    pub fn mark_failure(&mut self, message: &str) {
        self.consecutive_errors += 1;
        self.last_error = message.to_string();
        self.updated_at = Utc::now();
    }

    /// Drop the incremental cursor, forcing the next cycle to full-fetch.
    pub fn reset_sync_token(&mut self) {
        self.sync_token = String::new();
        self.updated_at = Utc::now();
    }

    pub fn needs_full_sync(&self) -> bool {
        self.sync_token.is_empty()
    }

    /// Whether this calendar should still be picked up by the import worker
    pub fn is_eligible(&self, max_errors: i32) -> bool {
        self.consecutive_errors < max_errors
    }
}

/// Short fingerprint of an import result set.
///
/// Built from the first external id, the last external id and the
/// cardinality, so it is stable for identical inputs and changes whenever
/// any of the three differ.
pub fn compute_sync_hash(events: &[ExternalEvent]) -> String {
    let first = events.first().map(|e| e.external_id.as_str()).unwrap_or("");
    let last = events.last().map(|e| e.external_id.as_str()).unwrap_or("");
    let mut hasher = Sha256::new();
    hasher.update(first.as_bytes());
    hasher.update([0u8]);
    hasher.update(last.as_bytes());
    hasher.update([0u8]);
    hasher.update(events.len().to_le_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external_event::EventStatus;
    use chrono::TimeZone;

    fn event(id: &str) -> ExternalEvent {
        ExternalEvent {
            external_id: id.to_string(),
            summary: String::new(),
            description: String::new(),
            location: String::new(),
            status: EventStatus::Confirmed,
            organizer: String::new(),
            attendees: vec![],
            start_time: Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap(),
            is_all_day: false,
            is_recurring: false,
            is_locally_originated: false,
        }
    }

    fn state() -> SyncState {
        SyncState::new(UserId::new(), "primary", ProviderKind::Google)
    }

    #[test]
    fn test_new_state_needs_full_sync() {
        let state = state();
        assert!(state.needs_full_sync());
        assert!(state.last_synced_at.is_none());
        assert!(state.is_eligible(5));
    }

    #[test]
    fn test_mark_success_resets_errors() {
        let mut state = state();
        state.mark_failure("boom");
        state.mark_failure("boom again");
        assert_eq!(state.consecutive_errors, 2);

        state.mark_success("", "abcd");
        assert_eq!(state.consecutive_errors, 0);
        assert_eq!(state.last_error, "");
        assert_eq!(state.last_sync_hash, "abcd");
        assert!(state.last_synced_at.is_some());
    }

    #[test]
    fn test_eligibility_threshold() {
        let mut state = state();
        for _ in 0..5 {
            state.mark_failure("remote unavailable");
        }
        assert!(!state.is_eligible(5));
        assert!(state.is_eligible(6));
    }

    #[test]
    fn test_sync_hash_stable() {
        let events = vec![event("a"), event("b"), event("c")];
        assert_eq!(compute_sync_hash(&events), compute_sync_hash(&events));
        assert_eq!(compute_sync_hash(&events).len(), 16);
    }

    #[test]
    fn test_sync_hash_sensitive_to_bounds_and_len() {
        let base = vec![event("a"), event("b"), event("c")];
        let different_first = vec![event("x"), event("b"), event("c")];
        let different_last = vec![event("a"), event("b"), event("y")];
        let different_len = vec![event("a"), event("c")];

        let hash = compute_sync_hash(&base);
        assert_ne!(hash, compute_sync_hash(&different_first));
        assert_ne!(hash, compute_sync_hash(&different_last));
        assert_ne!(hash, compute_sync_hash(&different_len));
    }

    #[test]
    fn test_sync_hash_empty() {
        assert_eq!(compute_sync_hash(&[]), compute_sync_hash(&[]));
    }

    proptest::proptest! {
        #[test]
        fn prop_sync_hash_stable_and_length_sensitive(
            ids in proptest::collection::vec("[a-z0-9]{1,12}", 1..20)
        ) {
            let events: Vec<ExternalEvent> = ids.iter().map(|id| event(id)).collect();
            proptest::prop_assert_eq!(
                compute_sync_hash(&events),
                compute_sync_hash(&events)
            );

            // Cardinality feeds the hash, so dropping an event always
            // changes it
            let mut shorter = events.clone();
            shorter.pop();
            proptest::prop_assert_ne!(
                compute_sync_hash(&events),
                compute_sync_hash(&shorter)
            );
        }
    }
}
