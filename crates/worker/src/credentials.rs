//! Postgres-backed implementations of the adapter credential contracts

use async_trait::async_trait;
use db::CredentialRepository;
use integrations::{AccessToken, BasicCredentials, CredentialStore, ProviderError, ProviderResult, TokenSource};
use shared::types::{ProviderKind, UserId};
use sqlx::PgPool;

/// Token source for one OAuth provider family
pub struct PgTokenSource {
    pool: PgPool,
    provider: ProviderKind,
}

impl PgTokenSource {
    pub fn new(pool: PgPool, provider: ProviderKind) -> Self {
        Self { pool, provider }
    }
}

#[async_trait]
impl TokenSource for PgTokenSource {
    async fn token(&self, user_id: UserId) -> ProviderResult<AccessToken> {
        let row = CredentialRepository::find(&self.pool, user_id, self.provider)
            .await
            .map_err(|e| ProviderError::MissingCredentials(e.to_string()))?;

        match row.and_then(|r| r.access_token.map(|token| (token, r.token_expires_at))) {
            Some((secret, expires_at)) => Ok(AccessToken { secret, expires_at }),
            None => Err(ProviderError::MissingCredentials(format!(
                "no {} token stored for user {}",
                self.provider, user_id
            ))),
        }
    }
}

/// Basic-credential store for the CalDAV family
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn get_credentials(
        &self,
        user_id: UserId,
        provider: ProviderKind,
    ) -> ProviderResult<BasicCredentials> {
        let row = CredentialRepository::find(&self.pool, user_id, provider)
            .await
            .map_err(|e| ProviderError::MissingCredentials(e.to_string()))?;

        match row {
            Some(row) => match (row.username, row.password) {
                (Some(username), Some(password)) => Ok(BasicCredentials { username, password }),
                _ => Err(ProviderError::MissingCredentials(format!(
                    "incomplete {} credentials for user {}",
                    provider, user_id
                ))),
            },
            None => Err(ProviderError::MissingCredentials(format!(
                "no {} credentials stored for user {}",
                provider, user_id
            ))),
        }
    }

    async fn store_credentials(
        &self,
        user_id: UserId,
        provider: ProviderKind,
        username: &str,
        password: &str,
    ) -> ProviderResult<()> {
        CredentialRepository::upsert_basic(&self.pool, user_id, provider, username, password)
            .await
            .map_err(|e| ProviderError::MissingCredentials(e.to_string()))?;
        Ok(())
    }
}
