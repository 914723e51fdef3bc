//! Fixed project list, for tests and single-tenant deployments.

use async_trait::async_trait;

use crate::domain::ProjectId;
use crate::error::StoreError;
use crate::ports::ProjectSource;

#[derive(Debug, Clone, Default)]
pub struct StaticProjectSource {
    projects: Vec<ProjectId>,
}

impl StaticProjectSource {
    pub fn new(projects: Vec<ProjectId>) -> Self {
        Self { projects }
    }
}

#[async_trait]
impl ProjectSource for StaticProjectSource {
    async fn active_projects(&self) -> Result<Vec<ProjectId>, StoreError> {
        Ok(self.projects.clone())
    }
}
