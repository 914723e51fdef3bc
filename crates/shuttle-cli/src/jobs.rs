//! Demo jobs wired into the worker process.

use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shuttle_core::domain::{JobRoute, ProjectId, Provider};
use shuttle_core::oauth::TokenLifecycleManager;
use shuttle_core::typed::{DynHandler, Handler, Job, JobContext};
use tracing::info;

/// Periodic per-project reconciliation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileProject {
    pub project_id: ProjectId,
}

impl Job for ReconcileProject {
    const PROVIDER: &'static str = Provider::INTERNAL;
    const KIND: &'static str = "reconcile.project";
}

pub struct ReconcileHandler;

#[async_trait]
impl Handler<ReconcileProject> for ReconcileHandler {
    async fn handle(&self, job: ReconcileProject, ctx: JobContext) -> anyhow::Result<()> {
        info!(project = %job.project_id, attempt = ctx.attempt, "reconcile requested");
        Ok(())
    }
}

pub const SYNC_KIND: &str = "sync.project";

/// Payload of `<provider>/sync.project`. The provider is only known once the
/// OAuth client is configured, so this is registered as a dynamic route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncProject {
    pub project_id: ProjectId,
}

pub fn sync_route(provider: &Provider) -> JobRoute {
    JobRoute::new(provider.as_str(), SYNC_KIND)
}

/// Fetches a live access token for the project; the remote API call itself
/// is out of scope here.
pub struct SyncHandler {
    tokens: Arc<TokenLifecycleManager>,
}

impl SyncHandler {
    pub fn new(tokens: Arc<TokenLifecycleManager>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl DynHandler for SyncHandler {
    async fn handle_dyn(&self, payload: serde_json::Value, ctx: JobContext) -> anyhow::Result<()> {
        let job: SyncProject = serde_json::from_value(payload).context("decode sync payload")?;
        let token = self
            .tokens
            .get_access_token(job.project_id)
            .await
            .with_context(|| format!("access token for {}", job.project_id))?;
        info!(
            project = %job.project_id,
            provider = %self.tokens.provider(),
            attempt = ctx.attempt,
            token_len = token.len(),
            "sync ready"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn routes() {
        assert_eq!(ReconcileProject::route(), JobRoute::new("internal", "reconcile.project"));
        assert_eq!(
            sync_route(&Provider::new("linear")),
            JobRoute::new("linear", "sync.project")
        );
    }

    #[tokio::test]
    async fn reconcile_handler_accepts_payload() {
        let project_id = ProjectId::from_ulid(Ulid::new());
        let ctx = JobContext {
            job_id: shuttle_core::domain::JobId::new(1),
            project_id: Some(project_id),
            attempt: 1,
        };
        ReconcileHandler
            .handle(ReconcileProject { project_id }, ctx)
            .await
            .unwrap();
    }
}
