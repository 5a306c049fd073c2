//! Consumes scheduling domain events and triggers remote push.
//!
//! Delivery is at-least-once; the push path is an upsert keyed by the
//! block id, so handling is idempotent. Every error is logged and
//! absorbed: a failure here must never cause the broker to redeliver,
//! because calendar unavailability is expected and retried on the next
//! scheduling event or import tick.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::errors::DomainError;
use shared::types::{BlockId, ScheduleId, UserId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::coordinator::SyncCoordinator;
use crate::error::{ServiceError, ServiceResult};
use crate::store::ScheduleStore;

/// Routing keys this subscriber consumes
pub mod routing_keys {
    pub const SCHEDULED: &str = "scheduling.block.scheduled";
    pub const RESCHEDULED: &str = "scheduling.block.rescheduled";
    pub const COMPLETED: &str = "scheduling.block.completed";
    pub const MISSED: &str = "scheduling.block.missed";

    pub const ALL: [&str; 4] = [SCHEDULED, RESCHEDULED, COMPLETED, MISSED];
}

/// One message as delivered by the broker
#[derive(Debug, Clone)]
pub struct BlockEventMessage {
    pub routing_key: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct BlockEventPayload {
    schedule_id: ScheduleId,
    block_id: BlockId,
    user_id: Option<UserId>,
    new_start_time: Option<DateTime<Utc>>,
    new_end_time: Option<DateTime<Utc>>,
}

pub struct BlockEventSubscriber {
    schedules: Arc<dyn ScheduleStore>,
    coordinator: Arc<SyncCoordinator>,
    enabled: AtomicBool,
}

impl BlockEventSubscriber {
    pub fn new(schedules: Arc<dyn ScheduleStore>, coordinator: Arc<SyncCoordinator>) -> Self {
        Self {
            schedules,
            coordinator,
            enabled: AtomicBool::new(true),
        }
    }

    /// Quiet the subscriber; a disabled subscriber is a no-op
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Handle one delivery. Never returns an error.
    pub async fn handle(&self, message: &BlockEventMessage) {
        if !self.is_enabled() {
            return;
        }
        if !routing_keys::ALL.contains(&message.routing_key.as_str()) {
            debug!(routing_key = %message.routing_key, "ignoring unrelated event");
            return;
        }
        if let Err(e) = self.process(message).await {
            warn!(
                routing_key = %message.routing_key,
                error = %e,
                "absorbed scheduling event failure"
            );
        }
    }

    async fn process(&self, message: &BlockEventMessage) -> ServiceResult<()> {
        let payload: BlockEventPayload = serde_json::from_value(message.payload.clone())
            .map_err(|e| ServiceError::Validation(format!("bad event payload: {}", e)))?;

        let schedule = self
            .schedules
            .find_by_id(payload.schedule_id)
            .await?
            .ok_or_else(|| {
                DomainError::ScheduleNotFound(payload.schedule_id.to_string())
            })?;
        // The payload's user id wins; the schedule is the fallback
        let user_id = payload.user_id.unwrap_or(schedule.user_id);

        let mut block = schedule
            .find_block(payload.block_id)
            .cloned()
            .ok_or_else(|| {
                DomainError::ScheduleNotFound(format!("block {}", payload.block_id))
            })?;

        match message.routing_key.as_str() {
            routing_keys::COMPLETED => block.completed = true,
            routing_keys::MISSED => block.missed = true,
            routing_keys::RESCHEDULED => {
                if let (Some(start), Some(end)) = (payload.new_start_time, payload.new_end_time) {
                    block.start_time = start;
                    block.end_time = end;
                }
            }
            _ => {}
        }

        let result = self
            .coordinator
            .sync_all(user_id, std::slice::from_ref(&block), false)
            .await?;
        debug!(
            block_id = %block.id,
            providers = result.results.len(),
            errors = result.errors.len(),
            "pushed block event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MockCalendarStore, MockScheduleStore};
    use chrono::{NaiveDate, TimeZone};
    use domain::{BlockKind, ConnectedCalendar, Schedule, TimeBlock};
    use integrations::{CalendarSyncer, ProviderRegistry, ProviderResult, PushOutcome};
    use serde_json::json;
    use shared::types::ProviderKind;
    use std::sync::Mutex;

    struct RecordingSyncer {
        pushed: Arc<Mutex<Vec<TimeBlock>>>,
    }

    #[async_trait::async_trait]
    impl CalendarSyncer for RecordingSyncer {
        async fn push(
            &self,
            _user_id: UserId,
            blocks: &[TimeBlock],
            _delete_missing: bool,
        ) -> ProviderResult<PushOutcome> {
            self.pushed.lock().unwrap().extend_from_slice(blocks);
            Ok(PushOutcome {
                created: 0,
                updated: blocks.len() as u32,
                deleted: 0,
                failed: 0,
                errors: vec![],
            })
        }
    }

    fn schedule(user_id: UserId, block_id: BlockId) -> Schedule {
        Schedule {
            id: ScheduleId::new(),
            user_id,
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            blocks: vec![TimeBlock {
                id: block_id,
                title: "Deep work".to_string(),
                kind: BlockKind::Focus,
                start_time: Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
                end_time: Utc.with_ymd_and_hms(2025, 3, 10, 11, 0, 0).unwrap(),
                completed: false,
                missed: false,
            }],
        }
    }

    fn subscriber(
        user_id: UserId,
        block_id: BlockId,
        pushed: Arc<Mutex<Vec<TimeBlock>>>,
    ) -> BlockEventSubscriber {
        let mut schedules = MockScheduleStore::new();
        schedules
            .expect_find_by_id()
            .returning(move |_| Ok(Some(schedule(user_id, block_id))));

        let mut calendars = MockCalendarStore::new();
        calendars
            .expect_find_enabled_push()
            .returning(move |u| {
                let mut calendar =
                    ConnectedCalendar::connect(u, ProviderKind::Google, "primary", "Work")
                        .unwrap();
                calendar.take_events();
                Ok(vec![calendar])
            });
        calendars.expect_update().returning(|calendar, _| {
            calendar.take_events();
            Ok(())
        });

        let registry = ProviderRegistry::new();
        registry.register_syncer(ProviderKind::Google, move |_| {
            Ok(Box::new(RecordingSyncer {
                pushed: pushed.clone(),
            }) as Box<dyn CalendarSyncer>)
        });

        let coordinator = Arc::new(SyncCoordinator::new(
            Arc::new(calendars),
            Arc::new(registry),
        ));
        BlockEventSubscriber::new(Arc::new(schedules), coordinator)
    }

    fn message(routing_key: &str, schedule_id: ScheduleId, block_id: BlockId) -> BlockEventMessage {
        BlockEventMessage {
            routing_key: routing_key.to_string(),
            payload: json!({
                "schedule_id": schedule_id,
                "block_id": block_id,
            }),
        }
    }

    #[tokio::test]
    async fn test_completed_event_pushes_completed_block() {
        let user_id = UserId::new();
        let block_id = BlockId::new();
        let pushed = Arc::new(Mutex::new(Vec::new()));
        let subscriber = subscriber(user_id, block_id, pushed.clone());

        subscriber
            .handle(&message(
                routing_keys::COMPLETED,
                ScheduleId::new(),
                block_id,
            ))
            .await;

        let pushed = pushed.lock().unwrap();
        assert_eq!(pushed.len(), 1);
        assert!(pushed[0].completed);
        assert!(!pushed[0].missed);
    }

    #[tokio::test]
    async fn test_rescheduled_event_carries_new_range() {
        let user_id = UserId::new();
        let block_id = BlockId::new();
        let pushed = Arc::new(Mutex::new(Vec::new()));
        let subscriber = subscriber(user_id, block_id, pushed.clone());

        let new_start = Utc.with_ymd_and_hms(2025, 3, 11, 14, 0, 0).unwrap();
        let new_end = Utc.with_ymd_and_hms(2025, 3, 11, 16, 0, 0).unwrap();
        subscriber
            .handle(&BlockEventMessage {
                routing_key: routing_keys::RESCHEDULED.to_string(),
                payload: json!({
                    "schedule_id": ScheduleId::new(),
                    "block_id": block_id,
                    "new_start_time": new_start,
                    "new_end_time": new_end,
                }),
            })
            .await;

        let pushed = pushed.lock().unwrap();
        assert_eq!(pushed[0].start_time, new_start);
        assert_eq!(pushed[0].end_time, new_end);
    }

    #[tokio::test]
    async fn test_errors_are_absorbed() {
        let user_id = UserId::new();
        let block_id = BlockId::new();
        let pushed = Arc::new(Mutex::new(Vec::new()));
        let subscriber = subscriber(user_id, block_id, pushed.clone());

        // Unknown block id: processing fails internally, handle returns ()
        subscriber
            .handle(&message(
                routing_keys::SCHEDULED,
                ScheduleId::new(),
                BlockId::new(),
            ))
            .await;
        assert!(pushed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_subscriber_is_noop() {
        let user_id = UserId::new();
        let block_id = BlockId::new();
        let pushed = Arc::new(Mutex::new(Vec::new()));
        let subscriber = subscriber(user_id, block_id, pushed.clone());

        subscriber.set_enabled(false);
        subscriber
            .handle(&message(
                routing_keys::SCHEDULED,
                ScheduleId::new(),
                block_id,
            ))
            .await;
        assert!(pushed.lock().unwrap().is_empty());
        assert!(!subscriber.is_enabled());
    }
}
