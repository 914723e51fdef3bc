//! IntegrationStore port - per-project connection status.

use async_trait::async_trait;

use crate::domain::{Integration, IntegrationId, IntegrationTransition, ProjectId, Provider};
use crate::error::StoreError;

#[async_trait]
pub trait IntegrationStore: Send + Sync {
    /// Fetch the row, creating a disabled one first if missing. Idempotent.
    async fn ensure(
        &self,
        project_id: ProjectId,
        provider: &Provider,
    ) -> Result<Integration, StoreError>;

    async fn get(
        &self,
        project_id: ProjectId,
        provider: &Provider,
    ) -> Result<Option<Integration>, StoreError>;

    async fn transition(
        &self,
        id: IntegrationId,
        transition: IntegrationTransition,
    ) -> Result<(), StoreError>;
}
