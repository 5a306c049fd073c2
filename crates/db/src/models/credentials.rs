//! Row model for stored provider credentials.
//!
//! OAuth flows live elsewhere; this table only holds what the adapters
//! need at call time.

use chrono::{DateTime, Utc};
use shared::types::{ProviderKind, UserId};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct ProviderCredentialRow {
    pub id: Uuid,
    pub user_id: UserId,
    pub provider: ProviderKind,
    pub access_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
