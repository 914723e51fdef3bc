//! Active-project enumeration for the schedulers.

use async_trait::async_trait;
use shuttle_core::StoreError;
use shuttle_core::domain::ProjectId;
use shuttle_core::ports::ProjectSource;
use sqlx::PgPool;
use tracing::warn;

use crate::db;

pub struct PgProjectSource {
    pool: PgPool,
}

impl PgProjectSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectSource for PgProjectSource {
    /// Rows whose id is not a valid project id are skipped with a warning.
    async fn active_projects(&self) -> Result<Vec<ProjectId>, StoreError> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM projects WHERE is_active ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(db)?;

        Ok(ids
            .into_iter()
            .filter_map(|raw| match ProjectId::parse(&raw) {
                Ok(id) => Some(id),
                Err(err) => {
                    warn!(project = %raw, error = %err, "skipping project with malformed id");
                    None
                }
            })
            .collect())
    }
}
