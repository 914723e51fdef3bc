//! QueueStatus - キューの読み取り専用ビュー

use std::sync::Arc;

use serde::Serialize;

use crate::domain::ProjectId;
use crate::error::StoreError;
use crate::observability::QueueCounts;
use crate::ports::JobStore;
use crate::queue::JobRecord;

/// Counts across the queue plus, optionally, one project's recent jobs.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub counts: QueueCounts,
    pub recent: Vec<JobRecord>,
}

pub struct QueueStatus {
    store: Arc<dyn JobStore>,
}

impl QueueStatus {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub async fn counts(&self) -> Result<QueueCounts, StoreError> {
        self.store.counts_by_status().await
    }

    /// Newest first.
    pub async fn recent_for_project(
        &self,
        project_id: ProjectId,
        limit: usize,
    ) -> Result<Vec<JobRecord>, StoreError> {
        self.store.list_by_project(project_id, limit).await
    }

    pub async fn report(
        &self,
        project_id: Option<ProjectId>,
        limit: usize,
    ) -> Result<StatusReport, StoreError> {
        let recent = match project_id {
            Some(project_id) => self.recent_for_project(project_id, limit).await?,
            None => Vec::new(),
        };
        Ok(StatusReport {
            counts: self.counts().await?,
            recent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobRoute, NewJob};
    use crate::ports::SystemClock;
    use crate::queue::{InMemoryJobStore, RetryPolicy};
    use ulid::Ulid;

    #[tokio::test]
    async fn report_combines_counts_and_project_history() {
        let store = Arc::new(InMemoryJobStore::new(Arc::new(SystemClock), RetryPolicy::fixed_steps()));
        let project = ProjectId::from_ulid(Ulid::new());
        let route = JobRoute::new("internal", "reconcile.project");

        store
            .enqueue(NewJob::new(route.clone(), serde_json::json!({})).for_project(project))
            .await
            .unwrap();
        store
            .enqueue(NewJob::new(route, serde_json::json!({})))
            .await
            .unwrap();
        store.claim_next("w1").await.unwrap();

        let status = QueueStatus::new(store);
        let report = status.report(Some(project), 10).await.unwrap();
        assert_eq!(report.counts.total(), 2);
        assert_eq!(report.counts.processing, 1);
        assert_eq!(report.recent.len(), 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["counts"]["pending"], 1);
    }
}
