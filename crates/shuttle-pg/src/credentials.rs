//! PostgreSQL CredentialStore.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shuttle_core::StoreError;
use shuttle_core::domain::{CredentialsUpdate, IntegrationId, OAuthCredentials, Provider};
use shuttle_core::ports::{Clock, CredentialStore};
use sqlx::PgPool;
use tracing::instrument;

use crate::db;
use crate::schema::{CREDENTIAL_COLUMNS, CredentialRow};

pub struct PgCredentialStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn get(
        &self,
        integration_id: IntegrationId,
        provider: &Provider,
    ) -> Result<Option<OAuthCredentials>, StoreError> {
        let sql = format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM oauth_credentials \
             WHERE integration_id = $1 AND provider = $2"
        );
        sqlx::query_as::<_, CredentialRow>(&sql)
            .bind(integration_id.to_storage())
            .bind(provider.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .map(OAuthCredentials::try_from)
            .transpose()
    }

    /// Every column coalesces except `revoked_at`, which is taken as given;
    /// a revoking write also clears both tokens, and a new access token
    /// brings its own `expires_at`.
    #[instrument(skip(self, update), fields(integration = %integration_id, %provider))]
    async fn upsert(
        &self,
        integration_id: IntegrationId,
        provider: &Provider,
        update: CredentialsUpdate,
    ) -> Result<OAuthCredentials, StoreError> {
        let update = update.normalized();
        let sql = format!(
            r"
            INSERT INTO oauth_credentials
                (integration_id, provider, access_token_ciphertext, refresh_token_ciphertext,
                 expires_at, scopes, token_type, last_refresh_at, revoked_at, key_version,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            ON CONFLICT (integration_id, provider) DO UPDATE SET
                access_token_ciphertext = CASE
                    WHEN EXCLUDED.revoked_at IS NOT NULL THEN NULL
                    ELSE COALESCE(EXCLUDED.access_token_ciphertext,
                                  oauth_credentials.access_token_ciphertext)
                END,
                refresh_token_ciphertext = CASE
                    WHEN EXCLUDED.revoked_at IS NOT NULL THEN NULL
                    ELSE COALESCE(EXCLUDED.refresh_token_ciphertext,
                                  oauth_credentials.refresh_token_ciphertext)
                END,
                expires_at = CASE
                    WHEN EXCLUDED.access_token_ciphertext IS NOT NULL THEN EXCLUDED.expires_at
                    ELSE COALESCE(EXCLUDED.expires_at, oauth_credentials.expires_at)
                END,
                scopes = COALESCE(EXCLUDED.scopes, oauth_credentials.scopes),
                token_type = COALESCE(EXCLUDED.token_type, oauth_credentials.token_type),
                last_refresh_at = COALESCE(EXCLUDED.last_refresh_at, oauth_credentials.last_refresh_at),
                revoked_at = EXCLUDED.revoked_at,
                key_version = COALESCE(EXCLUDED.key_version, oauth_credentials.key_version),
                updated_at = EXCLUDED.updated_at
            RETURNING {CREDENTIAL_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, CredentialRow>(&sql)
            .bind(integration_id.to_storage())
            .bind(provider.as_str())
            .bind(update.access_token_ciphertext)
            .bind(update.refresh_token_ciphertext)
            .bind(update.expires_at)
            .bind(update.scopes)
            .bind(update.token_type)
            .bind(update.last_refresh_at)
            .bind(update.revoked_at)
            .bind(update.key_version)
            .bind(self.clock.now())
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;
        OAuthCredentials::try_from(row)
    }

    #[instrument(skip(self), fields(integration = %integration_id, %provider))]
    async fn revoke(
        &self,
        integration_id: IntegrationId,
        provider: &Provider,
        revoked_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            UPDATE oauth_credentials
            SET access_token_ciphertext = NULL,
                refresh_token_ciphertext = NULL,
                revoked_at = $3,
                updated_at = $4
            WHERE integration_id = $1 AND provider = $2
            ",
        )
        .bind(integration_id.to_storage())
        .bind(provider.as_str())
        .bind(revoked_at)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }
}
