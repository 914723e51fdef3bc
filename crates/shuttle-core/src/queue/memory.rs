//! In-memory JobStore implementation.
//!
//! Single process only: the mutex stands in for the row lock, so a claim is
//! atomic with respect to every other caller sharing this store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use super::{JobRecord, JobStatus, RetryPolicy};
use crate::domain::{JobId, NewJob, ProjectId};
use crate::error::StoreError;
use crate::observability::QueueCounts;
use crate::ports::{Clock, JobStore};

struct InMemoryJobState {
    /// All job records (single source of truth).
    records: BTreeMap<JobId, JobRecord>,

    /// Next job ID to assign.
    next_id: i64,
}

impl InMemoryJobState {
    fn allocate_id(&mut self) -> JobId {
        let id = JobId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Earliest due pending job by `(next_run_at, id)`.
    fn next_due(&self, now: DateTime<Utc>) -> Option<JobId> {
        self.records
            .values()
            .filter(|record| record.is_due(now))
            .min_by_key(|record| (record.next_run_at, record.id))
            .map(|record| record.id)
    }

    fn record_mut(&mut self, id: JobId) -> Result<&mut JobRecord, StoreError> {
        self.records
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// The record, if `worker_id` still holds its lock.
    fn leased_mut(&mut self, id: JobId, worker_id: &str) -> Result<&mut JobRecord, StoreError> {
        let record = self.record_mut(id)?;
        let held = record.status == JobStatus::Processing
            && record.locked_by.as_deref() == Some(worker_id);
        if !held {
            return Err(StoreError::LeaseLost {
                job: id.to_string(),
                worker: worker_id.to_string(),
            });
        }
        Ok(record)
    }
}

pub struct InMemoryJobStore {
    state: Mutex<InMemoryJobState>,
    clock: Arc<dyn Clock>,
    retry_policy: RetryPolicy,
}

impl InMemoryJobStore {
    pub fn new(clock: Arc<dyn Clock>, retry_policy: RetryPolicy) -> Self {
        Self {
            state: Mutex::new(InMemoryJobState {
                records: BTreeMap::new(),
                next_id: 1,
            }),
            clock,
            retry_policy,
        }
    }

    /// Snapshot of one job.
    pub async fn get(&self, id: JobId) -> Option<JobRecord> {
        self.state.lock().await.records.get(&id).cloned()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn enqueue(&self, job: NewJob) -> Result<JobId, StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        state.records.insert(id, JobRecord::new(id, job, now));
        Ok(id)
    }

    async fn claim_next(&self, worker_id: &str) -> Result<Option<JobRecord>, StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let Some(id) = state.next_due(now) else {
            return Ok(None);
        };
        let record = state.record_mut(id)?;
        record.claim(worker_id, now);
        Ok(Some(record.clone()))
    }

    async fn mark_done(&self, id: JobId, worker_id: &str) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.leased_mut(id, worker_id)?.mark_done(now);
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: JobId,
        worker_id: &str,
        attempts: u32,
        max_attempts: u32,
        error: &str,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let record = state.leased_mut(id, worker_id)?;

        if RetryPolicy::is_terminal(attempts, max_attempts) {
            record.mark_dead(attempts, max_attempts, error.to_string(), now);
        } else {
            let delay = Duration::from_std(self.retry_policy.backoff(attempts))
                .map_err(|e| StoreError::Corrupt(format!("backoff out of range: {e}")))?;
            record.schedule_retry(attempts, max_attempts, now + delay, error.to_string(), now);
        }
        Ok(())
    }

    async fn list_by_project(
        &self,
        project_id: ProjectId,
        limit: usize,
    ) -> Result<Vec<JobRecord>, StoreError> {
        let state = self.state.lock().await;
        let mut jobs: Vec<JobRecord> = state
            .records
            .values()
            .filter(|record| record.project_id == Some(project_id))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        jobs.truncate(limit);
        Ok(jobs)
    }

    async fn counts_by_status(&self) -> Result<QueueCounts, StoreError> {
        let state = self.state.lock().await;
        let mut counts = QueueCounts::default();
        for record in state.records.values() {
            counts.add(record.status, 1);
        }
        Ok(counts)
    }

    async fn release_stale(&self, locked_before: DateTime<Utc>) -> Result<u64, StoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let mut released = 0;
        for record in state.records.values_mut() {
            let stale = record.status == JobStatus::Processing
                && record.locked_at.is_some_and(|at| at < locked_before);
            if stale {
                record.requeue_stale(now);
                released += 1;
            }
        }
        Ok(released)
    }
}
