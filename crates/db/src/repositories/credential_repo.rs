//! Repository for stored provider credentials

use chrono::{DateTime, Utc};
use shared::types::{ProviderKind, UserId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::ProviderCredentialRow;

pub struct CredentialRepository;

impl CredentialRepository {
    /// Find credentials for (user, provider)
    pub async fn find(
        pool: &PgPool,
        user_id: UserId,
        provider: ProviderKind,
    ) -> Result<Option<ProviderCredentialRow>, sqlx::Error> {
        sqlx::query_as::<_, ProviderCredentialRow>(
            "SELECT * FROM provider_credentials WHERE user_id = $1 AND provider = $2",
        )
        .bind(user_id.as_uuid())
        .bind(provider)
        .fetch_optional(pool)
        .await
    }

    /// Store or replace an OAuth access token
    pub async fn upsert_token(
        pool: &PgPool,
        user_id: UserId,
        provider: ProviderKind,
        access_token: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO provider_credentials (id, user_id, provider, access_token, token_expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, provider) DO UPDATE
            SET access_token = EXCLUDED.access_token,
                token_expires_at = EXCLUDED.token_expires_at,
                updated_at = NOW()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id.as_uuid())
        .bind(provider)
        .bind(access_token)
        .bind(expires_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Store or replace CalDAV-family basic credentials
    pub async fn upsert_basic(
        pool: &PgPool,
        user_id: UserId,
        provider: ProviderKind,
        username: &str,
        password: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO provider_credentials (id, user_id, provider, username, password)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, provider) DO UPDATE
            SET username = EXCLUDED.username,
                password = EXCLUDED.password,
                updated_at = NOW()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id.as_uuid())
        .bind(provider)
        .bind(username)
        .bind(password)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Remove credentials when the last calendar for a provider disconnects
    pub async fn delete(
        pool: &PgPool,
        user_id: UserId,
        provider: ProviderKind,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM provider_credentials WHERE user_id = $1 AND provider = $2",
        )
        .bind(user_id.as_uuid())
        .bind(provider)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
