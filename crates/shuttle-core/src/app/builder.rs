//! AppBuilder - Handler の登録と起動時検証
//!
//! # Fail-fast 設計
//! - expect_routes() で「必ず Handler が必要なルート」を宣言
//!   （例: scheduler が投入するルート）
//! - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
//! - 不足があれば BuildError を返し、プロセスは起動しない

use std::sync::Arc;

use super::worker_loop::WorkerLoop;
use crate::config::WorkerConfig;
use crate::domain::JobRoute;
use crate::ports::JobStore;
use crate::typed::{DynHandler, Handler, Job, RegistryError, TypedRegistry};

/// # 使用例
/// ```ignore
/// let app = AppBuilder::new()
///     .register::<ReconcileProject, _>(ReconcileHandler)?
///     .expect_routes([ReconcileProject::route()])
///     .build()?;
/// ```
#[derive(Default)]
pub struct AppBuilder {
    registry: TypedRegistry,
    expected_routes: Vec<JobRoute>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no handler registered for expected routes: {}", format_routes(.0))]
    MissingRoutes(Vec<JobRoute>),
}

fn format_routes(routes: &[JobRoute]) -> String {
    routes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Job, H: Handler<T> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<T, H>(handler)?;
        Ok(self)
    }

    pub fn register_dyn(
        mut self,
        route: JobRoute,
        handler: Arc<dyn DynHandler>,
    ) -> Result<Self, RegistryError> {
        self.registry.register_dyn(route, handler)?;
        Ok(self)
    }

    /// Routes that must have a handler by the time `build()` runs.
    /// Accumulates across calls.
    pub fn expect_routes(mut self, routes: impl IntoIterator<Item = JobRoute>) -> Self {
        self.expected_routes.extend(routes);
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        let mut missing: Vec<JobRoute> = self
            .expected_routes
            .into_iter()
            .filter(|route| self.registry.get(route).is_none())
            .collect();
        if !missing.is_empty() {
            missing.sort();
            missing.dedup();
            return Err(BuildError::MissingRoutes(missing));
        }
        Ok(App {
            registry: Arc::new(self.registry),
        })
    }
}

/// Validated handler set, shared by the worker loop.
pub struct App {
    registry: Arc<TypedRegistry>,
}

impl App {
    pub fn registry(&self) -> &Arc<TypedRegistry> {
        &self.registry
    }

    pub fn worker_loop(&self, store: Arc<dyn JobStore>, config: WorkerConfig) -> WorkerLoop {
        WorkerLoop::new(store, Arc::clone(&self.registry), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::JobContext;
    use crate::typed::job::fixtures::{Ping, SyncIssues};
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Handler<Ping> for Noop {
        async fn handle(&self, _job: Ping, _ctx: JobContext) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn build_succeeds_when_expectations_are_met() {
        let app = AppBuilder::new()
            .register::<Ping, _>(Noop)
            .unwrap()
            .expect_routes([Ping::route()])
            .build()
            .unwrap();
        assert_eq!(app.registry().registered_routes(), vec![Ping::route()]);
    }

    #[test]
    fn build_reports_every_missing_route() {
        let result = AppBuilder::new()
            .register::<Ping, _>(Noop)
            .unwrap()
            .expect_routes([Ping::route(), SyncIssues::route()])
            .expect_routes([SyncIssues::route(), JobRoute::new("github", "sync.project")])
            .build();

        let Err(BuildError::MissingRoutes(missing)) = result else {
            panic!("expected missing routes");
        };
        assert_eq!(
            missing,
            vec![JobRoute::new("github", "sync.project"), SyncIssues::route()]
        );
    }

    #[test]
    fn build_without_expectations() {
        assert!(AppBuilder::new().build().is_ok());
    }
}
