//! Job record: one row of the durable queue.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::JobStatus;
use crate::domain::{JobId, JobKind, JobRoute, NewJob, ProjectId, Provider};

/// A job as stored.
///
/// State transitions happen through the methods below so the
/// "processing <=> locked" invariant is kept in one place; the in-memory
/// store uses them directly and the SQL store mirrors them statement by
/// statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub project_id: Option<ProjectId>,
    pub provider: Provider,
    pub kind: JobKind,
    pub payload: serde_json::Value,
    pub status: JobStatus,

    /// Number of failed executions so far.
    pub attempts: u32,
    pub max_attempts: u32,

    pub next_run_at: DateTime<Utc>,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub last_error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(id: JobId, job: NewJob, now: DateTime<Utc>) -> Self {
        Self {
            id,
            project_id: job.project_id,
            provider: job.provider,
            kind: job.kind,
            payload: job.payload,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: job.max_attempts,
            next_run_at: job.run_at.unwrap_or(now),
            locked_at: None,
            locked_by: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn route(&self) -> JobRoute {
        JobRoute {
            provider: self.provider.clone(),
            kind: self.kind.clone(),
        }
    }

    /// Eligible for claim at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status.is_claimable() && self.next_run_at <= now
    }

    /// Pending -> Processing.
    pub fn claim(&mut self, worker_id: &str, now: DateTime<Utc>) {
        self.status = JobStatus::Processing;
        self.locked_at = Some(now);
        self.locked_by = Some(worker_id.to_string());
        self.updated_at = now;
    }

    /// Processing -> Done.
    pub fn mark_done(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Done;
        self.release_lock();
        self.updated_at = now;
    }

    /// Processing -> Failed (terminal; next_run_at untouched).
    pub fn mark_dead(&mut self, attempts: u32, max_attempts: u32, error: String, now: DateTime<Utc>) {
        self.status = JobStatus::Failed;
        self.attempts = attempts;
        self.max_attempts = max_attempts;
        self.last_error = Some(error);
        self.release_lock();
        self.updated_at = now;
    }

    /// Processing -> Pending with a future next_run_at.
    pub fn schedule_retry(
        &mut self,
        attempts: u32,
        max_attempts: u32,
        next_run_at: DateTime<Utc>,
        error: String,
        now: DateTime<Utc>,
    ) {
        self.status = JobStatus::Pending;
        self.attempts = attempts;
        self.max_attempts = max_attempts;
        self.next_run_at = next_run_at;
        self.last_error = Some(error);
        self.release_lock();
        self.updated_at = now;
    }

    /// Processing -> Pending because the owning worker went silent.
    pub fn requeue_stale(&mut self, now: DateTime<Utc>) {
        let owner = self.locked_by.take().unwrap_or_default();
        self.status = JobStatus::Pending;
        self.next_run_at = now;
        self.last_error = Some(format!("lock expired (worker {owner})"));
        self.release_lock();
        self.updated_at = now;
    }

    fn release_lock(&mut self) {
        self.locked_at = None;
        self.locked_by = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(now: DateTime<Utc>) -> JobRecord {
        let job = NewJob::new(
            JobRoute::new("internal", "reconcile.project"),
            serde_json::json!({"projectId": "p1"}),
        );
        JobRecord::new(JobId::new(1), job, now)
    }

    #[test]
    fn claim_sets_lock_fields() {
        let now = Utc::now();
        let mut job = record(now);
        assert!(job.is_due(now));

        job.claim("w1", now);
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.locked_by.as_deref(), Some("w1"));
        assert_eq!(job.locked_at, Some(now));
        assert!(!job.is_due(now));
    }

    #[test]
    fn retry_clears_lock_and_defers() {
        let now = Utc::now();
        let mut job = record(now);
        job.claim("w1", now);

        let later = now + Duration::seconds(10);
        job.schedule_retry(1, 5, later, "boom".into(), now);

        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.locked_at.is_none() && job.locked_by.is_none());
        assert!(!job.is_due(now));
        assert!(job.is_due(later));
    }

    #[test]
    fn stale_requeue_records_owner() {
        let now = Utc::now();
        let mut job = record(now);
        job.claim("w9", now);

        job.requeue_stale(now);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.last_error.as_deref(), Some("lock expired (worker w9)"));
        assert_eq!(job.attempts, 0);
    }
}
