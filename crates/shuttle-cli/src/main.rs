//! shuttle worker process
//!
//! 1 プロセス = worker loop 1 本 + reconcile scheduler + reaper + session GC。
//! 複数プロセスを並べても claim は DB 側で排他されます。

mod jobs;

use std::sync::Arc;

use anyhow::Context as _;
use shuttle_core::app::{AppBuilder, GcLoop, QueueStatus, ReaperLoop, Runtime, SchedulerLoop};
use shuttle_core::config::ShuttleConfig;
use shuttle_core::impls::{AesGcmCipher, HttpTokenEndpoint};
use shuttle_core::observability::init_tracing;
use shuttle_core::oauth::{OAuthStores, TokenLifecycleManager};
use shuttle_core::ports::{
    Cipher, Clock, CredentialStore, IntegrationStore, JobStore, ProjectSource, SessionStore,
    SystemClock, TokenEndpoint, UlidGenerator,
};
use shuttle_core::queue::RetryPolicy;
use shuttle_core::typed::Job;
use shuttle_pg::{
    PgCredentialStore, PgIntegrationStore, PgJobStore, PgProjectSource, PgSessionStore,
};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::jobs::{ReconcileHandler, ReconcileProject, SyncHandler, sync_route};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ShuttleConfig::from_env().context("load configuration")?;

    // (A) ストアを用意
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("connect to postgres")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let jobs: Arc<dyn JobStore> = Arc::new(PgJobStore::new(
        pool.clone(),
        Arc::clone(&clock),
        RetryPolicy::fixed_steps(),
    ));
    let projects: Arc<dyn ProjectSource> = Arc::new(PgProjectSource::new(pool.clone()));
    let sessions: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(pool.clone()));

    // (B) Handler を登録して起動時に検証
    let mut builder = AppBuilder::new()
        .register::<ReconcileProject, _>(ReconcileHandler)?
        .expect_routes([ReconcileProject::route()]);

    if let Some(oauth) = config.oauth.clone() {
        let stores = OAuthStores {
            integrations: Arc::new(PgIntegrationStore::new(
                pool.clone(),
                Arc::clone(&clock),
                Arc::new(UlidGenerator::new(SystemClock)),
            )) as Arc<dyn IntegrationStore>,
            credentials: Arc::new(PgCredentialStore::new(pool.clone(), Arc::clone(&clock)))
                as Arc<dyn CredentialStore>,
            sessions: Arc::clone(&sessions),
        };
        let endpoint: Arc<dyn TokenEndpoint> =
            Arc::new(HttpTokenEndpoint::new(oauth.clone()).context("build token endpoint")?);
        let cipher: Arc<dyn Cipher> =
            Arc::new(AesGcmCipher::new(config.master_key.clone(), config.key_version));

        let manager = Arc::new(
            TokenLifecycleManager::new(oauth, stores, endpoint, cipher, Arc::clone(&clock))
                .with_refresh_policy(config.refresh),
        );
        let route = sync_route(manager.provider());
        info!(%route, "oauth client configured");
        builder = builder
            .register_dyn(route.clone(), Arc::new(SyncHandler::new(manager)))?
            .expect_routes([route]);
    } else {
        info!("no oauth client configured; sync handler disabled");
    }

    let app = builder.build()?;
    info!(routes = app.registry().len(), "handlers registered");

    // (C) ループを起動
    let worker = app.worker_loop(Arc::clone(&jobs), config.worker.clone());
    info!(worker_id = worker.worker_id(), "starting worker");

    let handle = Runtime::new()
        .worker(worker)
        .scheduler(SchedulerLoop::new(
            |project_id| ReconcileProject { project_id },
            projects,
            Arc::clone(&jobs),
            config.reconcile,
        ))
        .reaper(ReaperLoop::new(
            Arc::clone(&jobs),
            Arc::clone(&clock),
            config.reaper,
        ))
        .session_gc(GcLoop::new(sessions, Arc::clone(&clock), config.session_gc))
        .spawn();

    // (D) Ctrl-C で graceful shutdown（処理中のジョブは最後まで走らせる）
    tokio::signal::ctrl_c().await.context("wait for ctrl-c")?;
    info!("shutdown requested");
    handle.shutdown_and_join().await;

    let counts = QueueStatus::new(jobs).counts().await?;
    info!(
        pending = counts.pending,
        processing = counts.processing,
        done = counts.done,
        failed = counts.failed,
        "queue at shutdown"
    );
    Ok(())
}
