//! PostgreSQL JobStore.
//!
//! Claiming is one `UPDATE ... FROM (SELECT ... FOR UPDATE SKIP LOCKED)`
//! statement: concurrent workers skip each other's rows instead of waiting,
//! and no row can be handed to two workers.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use shuttle_core::StoreError;
use shuttle_core::domain::{JobId, NewJob, ProjectId};
use shuttle_core::observability::QueueCounts;
use shuttle_core::ports::{Clock, JobStore};
use shuttle_core::queue::{JobRecord, JobStatus, RetryPolicy};
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::schema::{JOB_COLUMNS, JobRow};
use crate::{db, to_i32};

pub struct PgJobStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    retry_policy: RetryPolicy,
}

impl PgJobStore {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>, retry_policy: RetryPolicy) -> Self {
        Self {
            pool,
            clock,
            retry_policy,
        }
    }

    pub async fn get(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .map(JobRecord::try_from)
            .transpose()
    }

    /// A completion write matched no row: either the job is gone or the
    /// caller no longer holds its lock.
    async fn lease_miss(&self, id: JobId, worker_id: &str) -> Result<(), StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM jobs WHERE id = $1)")
            .bind(id.get())
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;
        if exists {
            Err(StoreError::LeaseLost {
                job: id.to_string(),
                worker: worker_id.to_string(),
            })
        } else {
            Err(StoreError::NotFound(id.to_string()))
        }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    #[instrument(skip(self, job), fields(provider = %job.provider, kind = %job.kind))]
    async fn enqueue(&self, job: NewJob) -> Result<JobId, StoreError> {
        let now = self.clock.now();
        let id: i64 = sqlx::query_scalar(
            r"
            INSERT INTO jobs
                (project_id, provider, kind, payload, status, attempts, max_attempts,
                 next_run_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'pending', 0, $5, $6, $7, $7)
            RETURNING id
            ",
        )
        .bind(job.project_id.map(|p| p.to_storage()))
        .bind(job.provider.as_str())
        .bind(job.kind.as_str())
        .bind(&job.payload)
        .bind(to_i32(job.max_attempts))
        .bind(job.run_at.unwrap_or(now))
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;

        debug!(job.id = id, "enqueued");
        Ok(JobId::new(id))
    }

    #[instrument(skip(self))]
    async fn claim_next(&self, worker_id: &str) -> Result<Option<JobRecord>, StoreError> {
        let sql = format!(
            r"
            UPDATE jobs
            SET status = 'processing', locked_at = $1, locked_by = $2, updated_at = $1
            FROM (
                SELECT id AS claim_id
                FROM jobs
                WHERE status = 'pending' AND next_run_at <= $1
                ORDER BY next_run_at, id
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            ) AS next
            WHERE jobs.id = next.claim_id
            RETURNING {JOB_COLUMNS}
            "
        );
        sqlx::query_as::<_, JobRow>(&sql)
            .bind(self.clock.now())
            .bind(worker_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .map(JobRecord::try_from)
            .transpose()
    }

    #[instrument(skip(self))]
    async fn mark_done(&self, id: JobId, worker_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"
            UPDATE jobs
            SET status = 'done', locked_at = NULL, locked_by = NULL, updated_at = $3
            WHERE id = $1 AND status = 'processing' AND locked_by = $2
            ",
        )
        .bind(id.get())
        .bind(worker_id)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await
        .map_err(db)?;
        if result.rows_affected() == 0 {
            return self.lease_miss(id, worker_id).await;
        }
        Ok(())
    }

    #[instrument(skip(self, error))]
    async fn mark_failed(
        &self,
        id: JobId,
        worker_id: &str,
        attempts: u32,
        max_attempts: u32,
        error: &str,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();

        // Terminal failures keep their next_run_at.
        let (status, next_run_at) = if RetryPolicy::is_terminal(attempts, max_attempts) {
            (JobStatus::Failed, None)
        } else {
            let delay = Duration::from_std(self.retry_policy.backoff(attempts))
                .map_err(|e| StoreError::Corrupt(format!("backoff out of range: {e}")))?;
            (JobStatus::Pending, Some(now + delay))
        };

        let result = sqlx::query(
            r"
            UPDATE jobs
            SET status = $2,
                attempts = $3,
                max_attempts = $4,
                last_error = $5,
                next_run_at = COALESCE($6, next_run_at),
                locked_at = NULL,
                locked_by = NULL,
                updated_at = $7
            WHERE id = $1 AND status = 'processing' AND locked_by = $8
            ",
        )
        .bind(id.get())
        .bind(status.as_str())
        .bind(to_i32(attempts))
        .bind(to_i32(max_attempts))
        .bind(error)
        .bind(next_run_at)
        .bind(now)
        .bind(worker_id)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        if result.rows_affected() == 0 {
            return self.lease_miss(id, worker_id).await;
        }
        Ok(())
    }

    async fn list_by_project(
        &self,
        project_id: ProjectId,
        limit: usize,
    ) -> Result<Vec<JobRecord>, StoreError> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE project_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2"
        );
        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(project_id.to_storage())
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        rows.into_iter().map(JobRecord::try_from).collect()
    }

    async fn counts_by_status(&self) -> Result<QueueCounts, StoreError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM jobs GROUP BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(db)?;

        let mut counts = QueueCounts::default();
        for (status, n) in rows {
            let status = status
                .parse::<JobStatus>()
                .map_err(|e| StoreError::Corrupt(format!("jobs.status: {e}")))?;
            counts.add(status, u64::try_from(n).unwrap_or(0));
        }
        Ok(counts)
    }

    #[instrument(skip(self))]
    async fn release_stale(&self, locked_before: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE jobs
            SET status = 'pending',
                next_run_at = $2,
                last_error = 'lock expired (worker ' || locked_by || ')',
                locked_at = NULL,
                locked_by = NULL,
                updated_at = $2
            WHERE status = 'processing' AND locked_at < $1
            ",
        )
        .bind(locked_before)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(result.rows_affected())
    }
}
