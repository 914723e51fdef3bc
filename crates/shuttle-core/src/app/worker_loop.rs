//! WorkerLoop - ジョブ実行ループ
//!
//! # フロー（tick ごと）
//! 1. JobStore::claim_next() で pending → processing
//! 2. `(provider, kind)` で Handler を引く（無ければ通常の失敗）
//! 3. Handler 実行（panic も捕捉して失敗扱い）
//! 4. mark_done / mark_failed で結果を反映
//!
//! batch_size 件まで順番に処理し、次の tick まで待ちます。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::FutureExt;
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info_span, warn};

use super::periodic::run_periodic;
use crate::config::WorkerConfig;
use crate::error::StoreError;
use crate::ports::JobStore;
use crate::queue::JobRecord;
use crate::typed::{JobContext, TypedRegistry};

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub claimed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct WorkerLoop {
    store: Arc<dyn JobStore>,
    registry: Arc<TypedRegistry>,
    config: WorkerConfig,
    ticking: AtomicBool,
}

/// Clears the reentrancy flag when the tick ends, however it ends.
struct TickGuard<'a>(&'a AtomicBool);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl WorkerLoop {
    pub fn new(store: Arc<dyn JobStore>, registry: Arc<TypedRegistry>, config: WorkerConfig) -> Self {
        Self {
            store,
            registry,
            config,
            ticking: AtomicBool::new(false),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.config.worker_id
    }

    /// Claim and process up to `batch_size` jobs, one after another.
    ///
    /// Returns `None` without touching the queue if another tick is still
    /// running. Job failures never escape; a storage error ends the tick
    /// early.
    pub async fn tick(&self) -> Option<TickReport> {
        if self
            .ticking
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            debug!(worker = %self.config.worker_id, "previous tick still running");
            return None;
        }
        let _guard = TickGuard(&self.ticking);

        let mut report = TickReport::default();
        while report.claimed < self.config.batch_size {
            let job = match self.store.claim_next(&self.config.worker_id).await {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(err) => {
                    error!(worker = %self.config.worker_id, error = %err, "claim failed");
                    break;
                }
            };
            report.claimed += 1;

            if self.process(job).await {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
        }
        Some(report)
    }

    /// Tick on the configured interval until shutdown.
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        let this = &*self;
        run_periodic("worker", this.config.tick_interval, shutdown, move || async move {
            this.tick().await;
        })
        .await;
    }

    /// Execute one claimed job and record its outcome. Returns whether the
    /// handler succeeded.
    async fn process(&self, job: JobRecord) -> bool {
        let span = info_span!(
            "job",
            job.id = %job.id,
            job.provider = %job.provider,
            job.kind = %job.kind,
            job.attempt = job.attempts + 1,
        );

        async {
            let outcome = self.execute(&job).await;
            let reported = match &outcome {
                Ok(()) => {
                    debug!("job done");
                    self.store.mark_done(job.id, &self.config.worker_id).await
                }
                Err(message) => {
                    let attempts = job.attempts + 1;
                    warn!(attempts, max_attempts = job.max_attempts, error = %message, "job failed");
                    self.store
                        .mark_failed(
                            job.id,
                            &self.config.worker_id,
                            attempts,
                            job.max_attempts,
                            message,
                        )
                        .await
                }
            };
            match reported {
                Ok(()) => {}
                Err(StoreError::LeaseLost { .. }) => {
                    warn!("lock was released while running; outcome discarded");
                }
                Err(err) => error!(error = %err, "could not record job outcome"),
            }
            outcome.is_ok()
        }
        .instrument(span)
        .await
    }

    /// Dispatch by exact route. The error text becomes `last_error`.
    async fn execute(&self, job: &JobRecord) -> Result<(), String> {
        let route = job.route();
        let Some(handler) = self.registry.get(&route) else {
            return Err(format!("no handler registered for {route}"));
        };

        let ctx = JobContext {
            job_id: job.id,
            project_id: job.project_id,
            attempt: job.attempts + 1,
        };

        AssertUnwindSafe(handler.handle_dyn(job.payload.clone(), ctx))
            .catch_unwind()
            .await
            .map_err(|panic| panic_message(&*panic))?
            .map_err(|err| format!("{err:#}"))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    format!("handler panicked: {detail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobId, JobRoute, NewJob};
    use crate::ports::{Clock, FixedClock};
    use crate::queue::{InMemoryJobStore, JobStatus, RetryPolicy};
    use crate::typed::{DynHandler, Handler, Job};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde::{Deserialize, Serialize};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Debug, Serialize, Deserialize)]
    struct Echo {
        value: String,
    }

    impl Job for Echo {
        const PROVIDER: &'static str = "internal";
        const KIND: &'static str = "echo";
    }

    /// Records payloads; fails on "fail", panics on "panic".
    #[derive(Clone, Default)]
    struct EchoHandler {
        seen: Arc<Mutex<Vec<(String, u32)>>>,
    }

    #[async_trait]
    impl Handler<Echo> for EchoHandler {
        async fn handle(&self, job: Echo, ctx: JobContext) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push((job.value.clone(), ctx.attempt));
            match job.value.as_str() {
                "fail" => Err(anyhow::anyhow!("remote said no").context("sync failed")),
                "panic" => panic!("boom"),
                _ => Ok(()),
            }
        }
    }

    struct Fixture {
        clock: FixedClock,
        store: Arc<InMemoryJobStore>,
        handler: EchoHandler,
        worker: WorkerLoop,
    }

    fn fixture(batch_size: usize) -> Fixture {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        let store = Arc::new(InMemoryJobStore::new(
            Arc::new(clock.clone()),
            RetryPolicy::fixed_steps(),
        ));
        let handler = EchoHandler::default();
        let mut registry = TypedRegistry::new();
        registry.register::<Echo, _>(handler.clone()).unwrap();

        let worker = WorkerLoop::new(
            store.clone(),
            Arc::new(registry),
            WorkerConfig {
                worker_id: "w1".into(),
                tick_interval: Duration::from_secs(1),
                batch_size,
            },
        );
        Fixture {
            clock,
            store,
            handler,
            worker,
        }
    }

    async fn enqueue(store: &InMemoryJobStore, value: &str) -> JobId {
        let job = Echo { value: value.into() }.to_new_job(None).unwrap();
        store.enqueue(job).await.unwrap()
    }

    #[tokio::test]
    async fn tick_is_bounded_by_batch_size() {
        let f = fixture(10);
        for i in 0..12 {
            enqueue(&f.store, &format!("v{i}")).await;
        }

        let first = f.worker.tick().await.unwrap();
        assert_eq!(first, TickReport { claimed: 10, succeeded: 10, failed: 0 });

        let second = f.worker.tick().await.unwrap();
        assert_eq!(second.claimed, 2);

        let counts = f.store.counts_by_status().await.unwrap();
        assert_eq!(counts.done, 12);
    }

    #[tokio::test]
    async fn handler_error_becomes_last_error_and_batch_continues() {
        let f = fixture(10);
        let failing = enqueue(&f.store, "fail").await;
        let ok = enqueue(&f.store, "ok").await;

        let report = f.worker.tick().await.unwrap();
        assert_eq!(report, TickReport { claimed: 2, succeeded: 1, failed: 1 });

        let job = f.store.get(failing).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.last_error.as_deref(), Some("sync failed: remote said no"));
        assert_eq!(f.store.get(ok).await.unwrap().status, JobStatus::Done);
    }

    #[tokio::test]
    async fn panicking_handler_is_an_ordinary_failure() {
        let f = fixture(10);
        let panicking = enqueue(&f.store, "panic").await;
        let after = enqueue(&f.store, "after").await;

        let report = f.worker.tick().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded, 1);

        let job = f.store.get(panicking).await.unwrap();
        assert_eq!(job.last_error.as_deref(), Some("handler panicked: boom"));
        assert!(job.locked_by.is_none());
        assert_eq!(f.store.get(after).await.unwrap().status, JobStatus::Done);
    }

    #[tokio::test]
    async fn unknown_route_fails_without_crashing() {
        let f = fixture(10);
        let id = f
            .store
            .enqueue(NewJob::new(JobRoute::new("jira", "sync.project"), serde_json::json!({})))
            .await
            .unwrap();

        let report = f.worker.tick().await.unwrap();
        assert_eq!(report.failed, 1);

        let job = f.store.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.last_error.as_deref(), Some("no handler registered for jira/sync.project"));
    }

    #[tokio::test]
    async fn exhausted_budget_is_terminal() {
        let f = fixture(10);
        let job = Echo { value: "fail".into() }
            .to_new_job(None)
            .unwrap()
            .max_attempts(1);
        let id = f.store.enqueue(job).await.unwrap();

        f.worker.tick().await.unwrap();
        let job = f.store.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, 1);
    }

    #[tokio::test]
    async fn handler_sees_attempt_number() {
        let f = fixture(10);
        let id = enqueue(&f.store, "fail").await;
        f.worker.tick().await.unwrap();

        // Still backing off.
        assert_eq!(f.worker.tick().await.unwrap().claimed, 0);
        f.clock.advance(chrono::Duration::seconds(10));
        f.worker.tick().await.unwrap();

        let job = f.store.get(id).await.unwrap();
        assert_eq!(job.attempts, 2);
        let seen = f.handler.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![("fail".to_string(), 1), ("fail".to_string(), 2)]);
    }

    struct Blocking {
        started: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl DynHandler for Blocking {
        async fn handle_dyn(&self, _payload: serde_json::Value, _ctx: JobContext) -> anyhow::Result<()> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn overlapping_tick_is_skipped() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        let store = Arc::new(InMemoryJobStore::new(Arc::new(clock), RetryPolicy::fixed_steps()));
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let route = JobRoute::new("internal", "slow");

        let mut registry = TypedRegistry::new();
        registry
            .register_dyn(
                route.clone(),
                Arc::new(Blocking {
                    started: started.clone(),
                    release: release.clone(),
                }),
            )
            .unwrap();
        let worker = Arc::new(WorkerLoop::new(
            store.clone(),
            Arc::new(registry),
            WorkerConfig::default(),
        ));
        store
            .enqueue(NewJob::new(route.clone(), serde_json::json!({})))
            .await
            .unwrap();
        store
            .enqueue(NewJob::new(route, serde_json::json!({})))
            .await
            .unwrap();

        let running = tokio::spawn({
            let worker = worker.clone();
            async move { worker.tick().await }
        });
        started.notified().await;

        assert!(worker.tick().await.is_none());
        let counts = store.counts_by_status().await.unwrap();
        assert_eq!((counts.pending, counts.processing), (1, 1));

        release.notify_one();
        started.notified().await;
        release.notify_one();
        let report = running.await.unwrap().unwrap();
        assert_eq!(report.claimed, 2);
        assert!(worker.tick().await.is_some());
    }

    /// Simulates a run long enough for the reaper to hand the job to `w2`.
    struct Outlived {
        store: Arc<InMemoryJobStore>,
        clock: FixedClock,
    }

    #[async_trait]
    impl DynHandler for Outlived {
        async fn handle_dyn(&self, _payload: serde_json::Value, _ctx: JobContext) -> anyhow::Result<()> {
            self.clock.advance(chrono::Duration::minutes(20));
            self.store
                .release_stale(self.clock.now() - chrono::Duration::minutes(15))
                .await?;
            self.store.claim_next("w2").await?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn outcome_after_losing_the_lock_is_discarded() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        let store = Arc::new(InMemoryJobStore::new(
            Arc::new(clock.clone()),
            RetryPolicy::fixed_steps(),
        ));
        let route = JobRoute::new("internal", "slow");
        let mut registry = TypedRegistry::new();
        registry
            .register_dyn(
                route.clone(),
                Arc::new(Outlived {
                    store: store.clone(),
                    clock: clock.clone(),
                }),
            )
            .unwrap();
        let worker = WorkerLoop::new(store.clone(), Arc::new(registry), WorkerConfig::default());
        let id = store
            .enqueue(NewJob::new(route, serde_json::json!({})))
            .await
            .unwrap();

        let report = worker.tick().await.unwrap();
        assert_eq!(report.claimed, 1);

        let job = store.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.locked_by.as_deref(), Some("w2"));
    }
}
