//! Conflict detection and policy application for imported events

use domain::{find_conflicts, Conflict, ExternalEvent};
use shared::errors::DomainError;
use shared::types::UserId;
use std::sync::Arc;

use crate::error::{ServiceError, ServiceResult};
use crate::metrics;
use crate::store::{ConflictStore, ScheduleStore};

/// What to do when an imported event overlaps a local block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Exclude the event from the import
    Skip,
    /// Persist the conflict and accept the event
    #[default]
    Record,
    /// Abort the import cycle for this calendar
    Fail,
}

/// How the handler disposed of one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDisposition {
    Accepted,
    AcceptedWithConflicts(u32),
    Skipped(String),
}

pub struct ConflictHandler {
    schedules: Arc<dyn ScheduleStore>,
    conflicts: Arc<dyn ConflictStore>,
    policy: ConflictPolicy,
}

impl ConflictHandler {
    pub fn new(
        schedules: Arc<dyn ScheduleStore>,
        conflicts: Arc<dyn ConflictStore>,
        policy: ConflictPolicy,
    ) -> Self {
        Self {
            schedules,
            conflicts,
            policy,
        }
    }

    /// Compute the conflicts between one external event and the local
    /// schedules covering its date range. Nothing is persisted.
    pub async fn check_conflicts(
        &self,
        user_id: UserId,
        event: &ExternalEvent,
    ) -> ServiceResult<Vec<Conflict>> {
        let start = event.start_time.date_naive();
        let end = event.end_time.date_naive();
        let schedules = self
            .schedules
            .find_by_user_date_range(user_id, start, end)
            .await?;
        Ok(find_conflicts(&schedules, event))
    }

    /// Apply the configured policy to one imported event
    pub async fn handle_event(
        &self,
        user_id: UserId,
        event: &ExternalEvent,
    ) -> ServiceResult<EventDisposition> {
        let conflicts = self.check_conflicts(user_id, event).await?;
        if conflicts.is_empty() {
            return Ok(EventDisposition::Accepted);
        }
        metrics::record_conflicts_detected(conflicts.len() as u64);

        match self.policy {
            ConflictPolicy::Skip => {
                let first = &conflicts[0];
                Ok(EventDisposition::Skipped(format!(
                    "conflicts with block \"{}\" [{} - {}]",
                    first.block_title,
                    first.block_range.start.to_rfc3339(),
                    first.block_range.end.to_rfc3339(),
                )))
            }
            ConflictPolicy::Record => {
                let count = conflicts.len() as u32;
                for conflict in &conflicts {
                    self.conflicts.save(conflict).await?;
                }
                Ok(EventDisposition::AcceptedWithConflicts(count))
            }
            ConflictPolicy::Fail => {
                let first = &conflicts[0];
                Err(ServiceError::Domain(DomainError::CalendarConflict(
                    format!(
                        "event {} overlaps block \"{}\"",
                        event.external_id, first.block_title
                    ),
                )))
            }
        }
    }

    /// Partition events into (non-conflicting, conflicting) without
    /// persisting anything
    pub async fn batch_check(
        &self,
        user_id: UserId,
        events: Vec<ExternalEvent>,
    ) -> ServiceResult<(Vec<ExternalEvent>, Vec<ExternalEvent>)> {
        let mut clear = Vec::new();
        let mut conflicting = Vec::new();
        for event in events {
            if self.check_conflicts(user_id, &event).await?.is_empty() {
                clear.push(event);
            } else {
                conflicting.push(event);
            }
        }
        Ok((clear, conflicting))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MockConflictStore, MockScheduleStore};
    use chrono::{NaiveDate, TimeZone, Utc};
    use domain::{BlockKind, EventStatus, Schedule, TimeBlock};
    use shared::types::{BlockId, ScheduleId};

    fn schedule_with_block(user_id: UserId, h1: u32, h2: u32) -> Schedule {
        Schedule {
            id: ScheduleId::new(),
            user_id,
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            blocks: vec![TimeBlock {
                id: BlockId::new(),
                title: "Deep work".to_string(),
                kind: BlockKind::Focus,
                start_time: Utc.with_ymd_and_hms(2025, 3, 10, h1, 0, 0).unwrap(),
                end_time: Utc.with_ymd_and_hms(2025, 3, 10, h2, 0, 0).unwrap(),
                completed: false,
                missed: false,
            }],
        }
    }

    fn event(h1: u32, m1: u32, h2: u32, m2: u32) -> ExternalEvent {
        ExternalEvent {
            external_id: "evt-1".to_string(),
            summary: "External".to_string(),
            description: String::new(),
            location: String::new(),
            status: EventStatus::Confirmed,
            organizer: String::new(),
            attendees: vec![],
            start_time: Utc.with_ymd_and_hms(2025, 3, 10, h1, m1, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 3, 10, h2, m2, 0).unwrap(),
            is_all_day: false,
            is_recurring: false,
            is_locally_originated: false,
        }
    }

    fn handler(policy: ConflictPolicy, expect_saves: usize) -> ConflictHandler {
        let mut schedules = MockScheduleStore::new();
        schedules
            .expect_find_by_user_date_range()
            .returning(move |u, _, _| Ok(vec![schedule_with_block(u, 10, 12)]));

        let mut conflicts = MockConflictStore::new();
        conflicts
            .expect_save()
            .times(expect_saves)
            .returning(|_| Ok(()));

        ConflictHandler::new(Arc::new(schedules), Arc::new(conflicts), policy)
    }

    #[tokio::test]
    async fn test_touching_endpoint_is_not_a_conflict() {
        let user_id = UserId::new();
        let handler = handler(ConflictPolicy::Record, 0);
        // Block is [10:00, 12:00); event starts exactly at 12:00
        let disposition = handler
            .handle_event(user_id, &event(12, 0, 13, 0))
            .await
            .unwrap();
        assert_eq!(disposition, EventDisposition::Accepted);
    }

    #[tokio::test]
    async fn test_record_policy_persists_and_accepts() {
        let user_id = UserId::new();
        let handler = handler(ConflictPolicy::Record, 1);
        let disposition = handler
            .handle_event(user_id, &event(11, 30, 13, 0))
            .await
            .unwrap();
        assert_eq!(disposition, EventDisposition::AcceptedWithConflicts(1));
    }

    #[tokio::test]
    async fn test_skip_policy_names_block_and_timestamps() {
        let user_id = UserId::new();
        let handler = handler(ConflictPolicy::Skip, 0);
        let disposition = handler
            .handle_event(user_id, &event(11, 30, 13, 0))
            .await
            .unwrap();
        match disposition {
            EventDisposition::Skipped(reason) => {
                assert!(reason.contains("Deep work"));
                assert!(reason.contains("2025-03-10T10:00:00+00:00"));
                assert!(reason.contains("2025-03-10T12:00:00+00:00"));
            }
            other => panic!("unexpected disposition: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fail_policy_stops_the_cycle() {
        let user_id = UserId::new();
        let handler = handler(ConflictPolicy::Fail, 0);
        let result = handler.handle_event(user_id, &event(11, 30, 13, 0)).await;
        assert!(matches!(
            result,
            Err(ServiceError::Domain(DomainError::CalendarConflict(_)))
        ));
    }

    #[tokio::test]
    async fn test_batch_check_partitions_without_persisting() {
        let user_id = UserId::new();
        let handler = handler(ConflictPolicy::Record, 0);
        let (clear, conflicting) = handler
            .batch_check(user_id, vec![event(8, 0, 9, 0), event(11, 0, 13, 0)])
            .await
            .unwrap();
        assert_eq!(clear.len(), 1);
        assert_eq!(conflicting.len(), 1);
    }
}
