//! Encrypted OAuth credentials keyed by `(integration, provider)`.
//!
//! Invariant: `revoked_at` set => both token ciphertexts are `None`.

use chrono::{DateTime, Utc};

use super::{IntegrationId, Provider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub integration_id: IntegrationId,
    pub provider: Provider,
    pub access_token_ciphertext: Option<Vec<u8>>,
    pub refresh_token_ciphertext: Option<Vec<u8>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Option<String>,
    pub token_type: Option<String>,
    pub last_refresh_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub key_version: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OAuthCredentials {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Build a fresh row from an update (the insert half of the upsert).
    pub fn from_update(
        integration_id: IntegrationId,
        provider: Provider,
        update: CredentialsUpdate,
        now: DateTime<Utc>,
    ) -> Self {
        let update = update.normalized();
        Self {
            integration_id,
            provider,
            access_token_ciphertext: update.access_token_ciphertext,
            refresh_token_ciphertext: update.refresh_token_ciphertext,
            expires_at: update.expires_at,
            scopes: update.scopes,
            token_type: update.token_type,
            last_refresh_at: update.last_refresh_at,
            revoked_at: update.revoked_at,
            key_version: update.key_version,
            created_at: now,
            updated_at: now,
        }
    }

    /// Coalescing merge: every field keeps its stored value unless the update
    /// carries one, except `revoked_at`, which is always taken verbatim.
    /// `expires_at` belongs to the access token: an update carrying a new
    /// access token also replaces the expiry, even with `None`.
    pub fn merge(&mut self, update: CredentialsUpdate, now: DateTime<Utc>) {
        let update = update.normalized();
        if update.access_token_ciphertext.is_some() {
            self.expires_at = update.expires_at;
        } else {
            coalesce(&mut self.expires_at, update.expires_at);
        }
        if update.revoked_at.is_some() {
            self.access_token_ciphertext = None;
            self.refresh_token_ciphertext = None;
        } else {
            coalesce(&mut self.access_token_ciphertext, update.access_token_ciphertext);
            coalesce(&mut self.refresh_token_ciphertext, update.refresh_token_ciphertext);
        }
        coalesce(&mut self.scopes, update.scopes);
        coalesce(&mut self.token_type, update.token_type);
        coalesce(&mut self.last_refresh_at, update.last_refresh_at);
        coalesce(&mut self.key_version, update.key_version);
        self.revoked_at = update.revoked_at;
        self.updated_at = now;
    }
}

fn coalesce<T>(slot: &mut Option<T>, incoming: Option<T>) {
    if incoming.is_some() {
        *slot = incoming;
    }
}

/// Partial write for [`OAuthCredentials`].
///
/// `None` means "leave the stored value alone" for every field but
/// `revoked_at`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialsUpdate {
    pub access_token_ciphertext: Option<Vec<u8>>,
    pub refresh_token_ciphertext: Option<Vec<u8>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Option<String>,
    pub token_type: Option<String>,
    pub last_refresh_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub key_version: Option<i32>,
}

impl CredentialsUpdate {
    /// A revoking write never carries token material.
    pub fn normalized(mut self) -> Self {
        if self.revoked_at.is_some() {
            self.access_token_ciphertext = None;
            self.refresh_token_ciphertext = None;
        }
        self
    }
}
