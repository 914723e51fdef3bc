//! SessionStore port - short-lived PKCE authorization state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::OAuthSession;
use crate::error::StoreError;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: OAuthSession) -> Result<(), StoreError>;

    /// Delete and return the session for `state` in one step.
    ///
    /// A second `take` with the same state returns `None`; that single use
    /// is what makes a replayed callback fail.
    async fn take(&self, state: &str) -> Result<Option<OAuthSession>, StoreError>;

    /// Delete every session with `expires_at <= now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}
