//! ProjectSource port - enumeration of active projects for the schedulers.

use async_trait::async_trait;

use crate::domain::ProjectId;
use crate::error::StoreError;

#[async_trait]
pub trait ProjectSource: Send + Sync {
    async fn active_projects(&self) -> Result<Vec<ProjectId>, StoreError>;
}
