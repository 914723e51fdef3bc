//! Job routing vocabulary and the enqueue request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ProjectId;

/// Default retry budget for a newly enqueued job.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Provider tag of a job or credential (`internal`, a tracker, a forge, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Provider(String);

impl Provider {
    pub const INTERNAL: &'static str = "internal";

    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn internal() -> Self {
        Self::new(Self::INTERNAL)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Dispatch opcode, e.g. `reconcile.project`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKind(String);

impl JobKind {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Exact `(provider, kind)` pair the worker dispatches on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobRoute {
    pub provider: Provider,
    pub kind: JobKind,
}

impl JobRoute {
    pub fn new(provider: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            provider: Provider::new(provider),
            kind: JobKind::new(kind),
        }
    }
}

impl fmt::Display for JobRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.kind)
    }
}

/// Enqueue request. Producers only ever insert; no deduplication happens.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub project_id: Option<ProjectId>,
    pub provider: Provider,
    pub kind: JobKind,
    pub payload: serde_json::Value,
    /// `None` means "as soon as possible" (the store's current time).
    pub run_at: Option<DateTime<Utc>>,
    pub max_attempts: u32,
}

impl NewJob {
    pub fn new(route: JobRoute, payload: serde_json::Value) -> Self {
        Self {
            project_id: None,
            provider: route.provider,
            kind: route.kind,
            payload,
            run_at: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn for_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn run_at(mut self, run_at: DateTime<Utc>) -> Self {
        self.run_at = Some(run_at);
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn route(&self) -> JobRoute {
        JobRoute {
            provider: self.provider.clone(),
            kind: self.kind.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn new_job_defaults() {
        let job = NewJob::new(JobRoute::new("internal", "reconcile.project"), serde_json::json!({}));

        assert_eq!(job.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(job.project_id.is_none());
        assert!(job.run_at.is_none());
        assert_eq!(job.route().to_string(), "internal/reconcile.project");
    }

    #[test]
    fn builder_sets_project_and_schedule() {
        let project = ProjectId::from_ulid(Ulid::new());
        let at = Utc::now();
        let job = NewJob::new(JobRoute::new("linear", "sync.project"), serde_json::json!({}))
            .for_project(project)
            .run_at(at)
            .max_attempts(2);

        assert_eq!(job.project_id, Some(project));
        assert_eq!(job.run_at, Some(at));
        assert_eq!(job.max_attempts, 2);
    }
}
