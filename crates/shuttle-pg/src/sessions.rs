//! PostgreSQL SessionStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shuttle_core::StoreError;
use shuttle_core::domain::OAuthSession;
use shuttle_core::ports::SessionStore;
use sqlx::PgPool;

use crate::db;
use crate::schema::{SESSION_COLUMNS, SessionRow};

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, session: OAuthSession) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO oauth_sessions
                (state, project_id, provider, code_verifier_ciphertext, code_challenge,
                 redirect_uri, return_url, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(&session.state)
        .bind(session.project_id.to_storage())
        .bind(session.provider.as_str())
        .bind(&session.code_verifier_ciphertext)
        .bind(&session.code_challenge)
        .bind(&session.redirect_uri)
        .bind(&session.return_url)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    /// Delete-returning, so two callbacks racing on one state get one row
    /// between them.
    async fn take(&self, state: &str) -> Result<Option<OAuthSession>, StoreError> {
        let sql = format!("DELETE FROM oauth_sessions WHERE state = $1 RETURNING {SESSION_COLUMNS}");
        sqlx::query_as::<_, SessionRow>(&sql)
            .bind(state)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .map(OAuthSession::try_from)
            .transpose()
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM oauth_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(result.rows_affected())
    }
}
