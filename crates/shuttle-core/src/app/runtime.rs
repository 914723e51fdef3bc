//! Runtime - バックグラウンドループの起動と停止
//!
//! worker / scheduler / reaper / gc をそれぞれ tokio task として起動し、
//! 一本の watch channel で停止を伝えます。

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::gc_loop::GcLoop;
use super::reaper_loop::ReaperLoop;
use super::scheduler_loop::SchedulerLoop;
use super::worker_loop::WorkerLoop;

/// Components to run. Anything left unset is simply not started.
#[derive(Default)]
pub struct Runtime {
    worker: Option<Arc<WorkerLoop>>,
    schedulers: Vec<Arc<SchedulerLoop>>,
    reaper: Option<Arc<ReaperLoop>>,
    gc: Option<Arc<GcLoop>>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn worker(mut self, worker: WorkerLoop) -> Self {
        self.worker = Some(Arc::new(worker));
        self
    }

    pub fn scheduler(mut self, scheduler: SchedulerLoop) -> Self {
        self.schedulers.push(Arc::new(scheduler));
        self
    }

    pub fn reaper(mut self, reaper: ReaperLoop) -> Self {
        self.reaper = Some(Arc::new(reaper));
        self
    }

    pub fn session_gc(mut self, gc: GcLoop) -> Self {
        self.gc = Some(Arc::new(gc));
        self
    }

    pub fn spawn(self) -> RuntimeHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut joins = Vec::new();

        if let Some(worker) = self.worker {
            info!(worker = %worker.worker_id(), "starting worker loop");
            joins.push(("worker", tokio::spawn(worker.run(shutdown_rx.clone()))));
        }
        for scheduler in self.schedulers {
            info!(route = %scheduler.route(), "starting scheduler");
            joins.push(("scheduler", tokio::spawn(scheduler.run(shutdown_rx.clone()))));
        }
        if let Some(reaper) = self.reaper {
            joins.push(("reaper", tokio::spawn(reaper.run(shutdown_rx.clone()))));
        }
        if let Some(gc) = self.gc {
            joins.push(("session-gc", tokio::spawn(gc.run(shutdown_rx.clone()))));
        }

        RuntimeHandle { shutdown_tx, joins }
    }
}

/// Handle to the spawned loops.
/// - `request_shutdown()` で新しい tick を止める
/// - `shutdown_and_join()` で実行中の tick の完了を待つ
pub struct RuntimeHandle {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<(&'static str, JoinHandle<()>)>,
}

impl RuntimeHandle {
    /// Stop starting new ticks. A handler that is already running is not
    /// cancelled.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for (name, join) in self.joins {
            if let Err(err) = join.await {
                error!(component = name, error = %err, "background task ended abnormally");
            }
        }
        info!("runtime stopped");
    }
}
