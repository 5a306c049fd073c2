//! Outbox messages staged in the same transaction as the state change
//! they describe

use chrono::{DateTime, Utc};
use domain::DomainEvent;
use shared::types::MessageId;
use sqlx::FromRow;

/// One serialized domain event plus its routing key
#[derive(Debug, Clone, FromRow)]
pub struct OutboxMessage {
    pub id: MessageId,
    pub routing_key: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
}

impl OutboxMessage {
    /// Serialize a domain event into an outbox message
    pub fn from_event(event: &DomainEvent) -> Self {
        Self {
            id: MessageId::new(),
            routing_key: event.routing_key().to_string(),
            payload: event.payload(),
            created_at: Utc::now(),
            dispatched_at: None,
        }
    }
}
