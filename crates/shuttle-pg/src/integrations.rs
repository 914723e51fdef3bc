//! PostgreSQL IntegrationStore.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shuttle_core::StoreError;
use shuttle_core::domain::{Integration, IntegrationId, IntegrationTransition, ProjectId, Provider};
use shuttle_core::ports::{Clock, IdGenerator, IntegrationStore};
use sqlx::PgPool;
use tracing::instrument;

use crate::db;
use crate::schema::{INTEGRATION_COLUMNS, IntegrationRow};

pub struct PgIntegrationStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl PgIntegrationStore {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { pool, clock, ids }
    }
}

/// Column effects of a transition: `(last_error, set connected_at?, connected_at)`.
fn columns(transition: &IntegrationTransition) -> (Option<&str>, bool, Option<DateTime<Utc>>) {
    match transition {
        IntegrationTransition::Connected { at } => (None, true, Some(*at)),
        IntegrationTransition::Expired { error } => (error.as_deref(), false, None),
        IntegrationTransition::Errored { error } => (Some(error.as_str()), false, None),
        IntegrationTransition::Disabled => (None, true, None),
    }
}

#[async_trait]
impl IntegrationStore for PgIntegrationStore {
    /// Insert if missing; the no-op update makes RETURNING yield the
    /// existing row on conflict.
    async fn ensure(
        &self,
        project_id: ProjectId,
        provider: &Provider,
    ) -> Result<Integration, StoreError> {
        let sql = format!(
            r"
            INSERT INTO integrations (id, project_id, provider, status, created_at, updated_at)
            VALUES ($1, $2, $3, 'disabled', $4, $4)
            ON CONFLICT (project_id, provider) DO UPDATE SET project_id = EXCLUDED.project_id
            RETURNING {INTEGRATION_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, IntegrationRow>(&sql)
            .bind(self.ids.generate_integration_id().to_storage())
            .bind(project_id.to_storage())
            .bind(provider.as_str())
            .bind(self.clock.now())
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;
        Integration::try_from(row)
    }

    async fn get(
        &self,
        project_id: ProjectId,
        provider: &Provider,
    ) -> Result<Option<Integration>, StoreError> {
        let sql = format!(
            "SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE project_id = $1 AND provider = $2"
        );
        sqlx::query_as::<_, IntegrationRow>(&sql)
            .bind(project_id.to_storage())
            .bind(provider.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .map(Integration::try_from)
            .transpose()
    }

    #[instrument(skip(self), fields(integration = %id))]
    async fn transition(
        &self,
        id: IntegrationId,
        transition: IntegrationTransition,
    ) -> Result<(), StoreError> {
        let (last_error, set_connected_at, connected_at) = columns(&transition);
        let result = sqlx::query(
            r"
            UPDATE integrations
            SET status = $2,
                last_error = $3,
                connected_at = CASE WHEN $4 THEN $5::timestamptz ELSE connected_at END,
                updated_at = $6
            WHERE id = $1
            ",
        )
        .bind(id.to_storage())
        .bind(transition.status().as_str())
        .bind(last_error)
        .bind(set_connected_at)
        .bind(connected_at)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await
        .map_err(db)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
