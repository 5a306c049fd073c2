//! Credential contracts consumed by the adapters.
//!
//! OAuth flows live outside this crate; adapters only ask for a usable
//! token or a username/password pair at call time.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use shared::types::{ProviderKind, UserId};

use crate::error::ProviderResult;

/// An OAuth access token with its expiry, if known
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub secret: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Whether the token expires within the given window
    pub fn expires_within(&self, window: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= Utc::now() + window,
            None => false,
        }
    }
}

/// Produces access tokens for OAuth-backed providers
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self, user_id: UserId) -> ProviderResult<AccessToken>;
}

/// Username/password pair for the CalDAV family
#[derive(Debug, Clone)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// Stores and retrieves basic credentials for the CalDAV family
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_credentials(
        &self,
        user_id: UserId,
        provider: ProviderKind,
    ) -> ProviderResult<BasicCredentials>;

    async fn store_credentials(
        &self,
        user_id: UserId,
        provider: ProviderKind,
        username: &str,
        password: &str,
    ) -> ProviderResult<()>;
}

/// Log a warning when a token is close to expiry. A soon-to-expire token is
/// still usable, so this never fails the call.
pub fn warn_if_expiring(token: &AccessToken, provider: ProviderKind) {
    if token.expires_within(Duration::hours(24)) {
        tracing::warn!(
            provider = %provider,
            expires_at = ?token.expires_at,
            "access token expires within 24 hours"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_within() {
        let soon = AccessToken {
            secret: "t".to_string(),
            expires_at: Some(Utc::now() + Duration::hours(1)),
        };
        assert!(soon.expires_within(Duration::hours(24)));

        let later = AccessToken {
            secret: "t".to_string(),
            expires_at: Some(Utc::now() + Duration::hours(48)),
        };
        assert!(!later.expires_within(Duration::hours(24)));

        let unknown = AccessToken {
            secret: "t".to_string(),
            expires_at: None,
        };
        assert!(!unknown.expires_within(Duration::hours(24)));
    }
}
