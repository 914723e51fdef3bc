//! In-memory credential, session and integration stores.
//!
//! tokio の Mutex で各テーブルを守ります。単一プロセスでのテストと
//! ローカル実行用です。

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{
    CredentialsUpdate, Integration, IntegrationId, IntegrationTransition, OAuthCredentials,
    OAuthSession, ProjectId, Provider,
};
use crate::error::StoreError;
use crate::ports::{Clock, CredentialStore, IdGenerator, IntegrationStore, SessionStore};

pub struct InMemoryCredentialStore {
    rows: Mutex<HashMap<(IntegrationId, Provider), OAuthCredentials>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCredentialStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(
        &self,
        integration_id: IntegrationId,
        provider: &Provider,
    ) -> Result<Option<OAuthCredentials>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows.get(&(integration_id, provider.clone())).cloned())
    }

    async fn upsert(
        &self,
        integration_id: IntegrationId,
        provider: &Provider,
        update: CredentialsUpdate,
    ) -> Result<OAuthCredentials, StoreError> {
        let now = self.clock.now();
        let mut rows = self.rows.lock().await;
        match rows.entry((integration_id, provider.clone())) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().merge(update, now);
                Ok(entry.get().clone())
            }
            Entry::Vacant(entry) => {
                let row = OAuthCredentials::from_update(integration_id, provider.clone(), update, now);
                Ok(entry.insert(row).clone())
            }
        }
    }

    async fn revoke(
        &self,
        integration_id: IntegrationId,
        provider: &Provider,
        revoked_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut rows = self.rows.lock().await;
        if let Some(row) = rows.get_mut(&(integration_id, provider.clone())) {
            row.merge(
                CredentialsUpdate {
                    revoked_at: Some(revoked_at),
                    ..Default::default()
                },
                now,
            );
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySessionStore {
    rows: Mutex<HashMap<String, OAuthSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: OAuthSession) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        if rows.contains_key(&session.state) {
            return Err(StoreError::Corrupt("duplicate oauth state".into()));
        }
        rows.insert(session.state.clone(), session);
        Ok(())
    }

    async fn take(&self, state: &str) -> Result<Option<OAuthSession>, StoreError> {
        Ok(self.rows.lock().await.remove(state))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|_, session| !session.is_expired(now));
        Ok((before - rows.len()) as u64)
    }
}

pub struct InMemoryIntegrationStore {
    rows: Mutex<HashMap<IntegrationId, Integration>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryIntegrationStore {
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            clock,
            ids,
        }
    }
}

fn find<'a>(
    rows: &'a HashMap<IntegrationId, Integration>,
    project_id: ProjectId,
    provider: &Provider,
) -> Option<&'a Integration> {
    rows.values()
        .find(|row| row.project_id == project_id && &row.provider == provider)
}

#[async_trait]
impl IntegrationStore for InMemoryIntegrationStore {
    async fn ensure(
        &self,
        project_id: ProjectId,
        provider: &Provider,
    ) -> Result<Integration, StoreError> {
        let mut rows = self.rows.lock().await;
        if let Some(existing) = find(&rows, project_id, provider) {
            return Ok(existing.clone());
        }
        let row = Integration::new(
            self.ids.generate_integration_id(),
            project_id,
            provider.clone(),
            self.clock.now(),
        );
        rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get(
        &self,
        project_id: ProjectId,
        provider: &Provider,
    ) -> Result<Option<Integration>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(find(&rows, project_id, provider).cloned())
    }

    async fn transition(
        &self,
        id: IntegrationId,
        transition: IntegrationTransition,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut rows = self.rows.lock().await;
        let row = rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        row.apply(transition, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IntegrationStatus, SESSION_TTL};
    use crate::ports::{FixedClock, UlidGenerator};
    use chrono::{Duration, TimeZone};
    use ulid::Ulid;

    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn credential_upsert_coalesces_and_revoke_nulls_tokens() {
        let clock = clock();
        let store = InMemoryCredentialStore::new(Arc::new(clock.clone()));
        let id = IntegrationId::from_ulid(Ulid::new());
        let provider = Provider::new("linear");

        store
            .upsert(
                id,
                &provider,
                CredentialsUpdate {
                    access_token_ciphertext: Some(b"a1".to_vec()),
                    refresh_token_ciphertext: Some(b"r1".to_vec()),
                    scopes: Some("read".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let row = store
            .upsert(
                id,
                &provider,
                CredentialsUpdate {
                    access_token_ciphertext: Some(b"a2".to_vec()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(row.access_token_ciphertext.as_deref(), Some(&b"a2"[..]));
        assert_eq!(row.refresh_token_ciphertext.as_deref(), Some(&b"r1"[..]));
        assert_eq!(row.scopes.as_deref(), Some("read"));

        store.revoke(id, &provider, clock.now()).await.unwrap();
        let row = store.get(id, &provider).await.unwrap().unwrap();
        assert!(row.is_revoked());
        assert!(row.access_token_ciphertext.is_none() && row.refresh_token_ciphertext.is_none());
        assert_eq!(row.scopes.as_deref(), Some("read"));
    }

    #[tokio::test]
    async fn revoke_without_row_is_noop() {
        let store = InMemoryCredentialStore::new(Arc::new(clock()));
        let id = IntegrationId::from_ulid(Ulid::new());
        let provider = Provider::new("linear");

        store.revoke(id, &provider, Utc::now()).await.unwrap();
        assert!(store.get(id, &provider).await.unwrap().is_none());
    }

    fn session(state: &str, now: DateTime<Utc>) -> OAuthSession {
        OAuthSession {
            state: state.into(),
            project_id: ProjectId::from_ulid(Ulid::new()),
            provider: Provider::new("linear"),
            code_verifier_ciphertext: b"v".to_vec(),
            code_challenge: "c".into(),
            redirect_uri: "https://app.example.com/oauth/linear/callback".into(),
            return_url: None,
            expires_at: now + SESSION_TTL,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn session_take_is_single_use() {
        let now = clock().now();
        let store = InMemorySessionStore::new();
        store.insert(session("s1", now)).await.unwrap();

        assert!(store.take("s1").await.unwrap().is_some());
        assert!(store.take("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn purge_drops_only_expired_sessions() {
        let now = clock().now();
        let store = InMemorySessionStore::new();
        store.insert(session("old", now - Duration::minutes(30))).await.unwrap();
        store.insert(session("new", now)).await.unwrap();

        assert_eq!(store.purge_expired(now).await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
        assert!(store.take("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn ensure_is_idempotent_per_project_and_provider() {
        let clock = Arc::new(clock());
        let store = InMemoryIntegrationStore::new(
            clock.clone(),
            Arc::new(UlidGenerator::new(clock.clone())),
        );
        let project = ProjectId::from_ulid(Ulid::new());
        let linear = Provider::new("linear");

        let first = store.ensure(project, &linear).await.unwrap();
        let again = store.ensure(project, &linear).await.unwrap();
        let github = store.ensure(project, &Provider::new("github")).await.unwrap();

        assert_eq!(first.id, again.id);
        assert_ne!(first.id, github.id);
        assert_eq!(first.status, IntegrationStatus::Disabled);

        store
            .transition(first.id, IntegrationTransition::Errored { error: "boom".into() })
            .await
            .unwrap();
        let row = store.get(project, &linear).await.unwrap().unwrap();
        assert_eq!(row.status, IntegrationStatus::Error);
        assert_eq!(row.last_error.as_deref(), Some("boom"));
    }
}
