//! CredentialStore port - encrypted OAuth tokens keyed by `(integration, provider)`.
//!
//! Only the token lifecycle manager calls this.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{CredentialsUpdate, IntegrationId, OAuthCredentials, Provider};
use crate::error::StoreError;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(
        &self,
        integration_id: IntegrationId,
        provider: &Provider,
    ) -> Result<Option<OAuthCredentials>, StoreError>;

    /// Coalescing upsert; see [`OAuthCredentials::merge`].
    async fn upsert(
        &self,
        integration_id: IntegrationId,
        provider: &Provider,
        update: CredentialsUpdate,
    ) -> Result<OAuthCredentials, StoreError>;

    /// Null both ciphertexts and stamp `revoked_at`. Missing rows are a no-op.
    async fn revoke(
        &self,
        integration_id: IntegrationId,
        provider: &Provider,
        revoked_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
