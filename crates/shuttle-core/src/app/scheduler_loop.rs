//! SchedulerLoop - プロジェクトごとの定期ジョブ投入
//!
//! # フロー（interval ごと）
//! 1. ProjectSource::active_projects() で有効なプロジェクトを列挙
//! 2. プロジェクトごとに 1 件 enqueue（重複抑止はしない）
//!
//! 起動直後に 1 回、その後は interval ごとに発火します。列挙の失敗は
//! ログだけ残して次の interval で再試行します。

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use super::periodic::run_periodic;
use crate::config::SchedulerConfig;
use crate::domain::{JobRoute, NewJob, ProjectId};
use crate::error::StoreError;
use crate::ports::{JobStore, ProjectSource};
use crate::typed::Job;

type JobFactory = dyn Fn(ProjectId) -> Result<NewJob, serde_json::Error> + Send + Sync;

pub struct SchedulerLoop {
    route: JobRoute,
    make_job: Box<JobFactory>,
    projects: Arc<dyn ProjectSource>,
    store: Arc<dyn JobStore>,
    config: SchedulerConfig,
}

impl SchedulerLoop {
    /// Enqueue `make(project)` for every active project on each fire.
    pub fn new<T, F>(
        make: F,
        projects: Arc<dyn ProjectSource>,
        store: Arc<dyn JobStore>,
        config: SchedulerConfig,
    ) -> Self
    where
        T: Job,
        F: Fn(ProjectId) -> T + Send + Sync + 'static,
    {
        Self {
            route: T::route(),
            make_job: Box::new(move |project| make(project).to_new_job(Some(project))),
            projects,
            store,
            config,
        }
    }

    pub fn route(&self) -> &JobRoute {
        &self.route
    }

    /// One scheduling pass. Returns how many jobs were enqueued.
    ///
    /// A failed enumeration is returned to the caller. A project whose job
    /// cannot be built or enqueued is logged and the pass moves on.
    pub async fn fire(&self) -> Result<usize, StoreError> {
        let projects = self.projects.active_projects().await?;

        let mut enqueued = 0;
        for project in projects {
            let job = match (self.make_job)(project) {
                Ok(job) => job,
                Err(err) => {
                    warn!(route = %self.route, %project, error = %err, "job payload failed to serialize");
                    continue;
                }
            };
            match self.store.enqueue(job).await {
                Ok(_) => enqueued += 1,
                Err(err) => {
                    warn!(route = %self.route, %project, error = %err, "enqueue failed");
                }
            }
        }
        Ok(enqueued)
    }

    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        let this = &*self;
        run_periodic("scheduler", this.config.interval, shutdown, move || async move {
            match this.fire().await {
                Ok(enqueued) => info!(route = %this.route, enqueued, "scheduled"),
                Err(err) => warn!(route = %this.route, error = %err, "scheduling pass failed"),
            }
        })
        .await;
    }
}
