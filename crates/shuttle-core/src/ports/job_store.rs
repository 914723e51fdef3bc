//! JobStore port - the durable queue.
//!
//! Cross-process coordination lives entirely here: `claim_next` must be a
//! single atomic, non-blocking read-modify-write, so two workers never hold
//! the same job and a row locked by a concurrent claim is skipped rather
//! than waited on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{JobId, NewJob, ProjectId};
use crate::error::StoreError;
use crate::observability::QueueCounts;
use crate::queue::JobRecord;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a pending job. No deduplication.
    async fn enqueue(&self, job: NewJob) -> Result<JobId, StoreError>;

    /// Claim the oldest due pending job, ordered by `(next_run_at, id)`.
    async fn claim_next(&self, worker_id: &str) -> Result<Option<JobRecord>, StoreError>;

    /// Terminal success.
    ///
    /// Completion writes only apply while the job is still `processing`
    /// under `worker_id`; otherwise nothing changes and
    /// [`StoreError::LeaseLost`] is returned.
    async fn mark_done(&self, id: JobId, worker_id: &str) -> Result<(), StoreError>;

    /// Record a failed execution. Same lease check as `mark_done`.
    ///
    /// `attempts >= max_attempts` makes the job terminally `failed` with
    /// `next_run_at` untouched; otherwise it goes back to `pending` with
    /// `next_run_at = now + backoff(attempts)`. Lock fields are cleared
    /// either way.
    async fn mark_failed(
        &self,
        id: JobId,
        worker_id: &str,
        attempts: u32,
        max_attempts: u32,
        error: &str,
    ) -> Result<(), StoreError>;

    /// Most recent jobs of a project, newest first.
    async fn list_by_project(
        &self,
        project_id: ProjectId,
        limit: usize,
    ) -> Result<Vec<JobRecord>, StoreError>;

    async fn counts_by_status(&self) -> Result<QueueCounts, StoreError>;

    /// Return `processing` jobs locked before `locked_before` to `pending`.
    async fn release_stale(&self, locked_before: DateTime<Utc>) -> Result<u64, StoreError>;
}
