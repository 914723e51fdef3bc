//! Job status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Job status as persisted in the `jobs.status` column.
///
/// State transitions:
/// - Pending -> Processing (claim)
/// - Processing -> Done (handler succeeded)
/// - Processing -> Pending (handler failed, attempts < max_attempts; backoff applied)
/// - Processing -> Failed (handler failed, attempts >= max_attempts)
/// - Processing -> Pending (lock expired, released by the reaper)
///
/// Invariant: Processing <=> locked_at and locked_by are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    /// Is this job eligible for claim (once its next_run_at has passed)?
    pub fn is_claimable(self) -> bool {
        matches!(self, JobStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::pending(JobStatus::Pending, false, true)]
    #[case::processing(JobStatus::Processing, false, false)]
    #[case::done(JobStatus::Done, true, false)]
    #[case::failed(JobStatus::Failed, true, false)]
    fn status_classification(
        #[case] status: JobStatus,
        #[case] terminal: bool,
        #[case] claimable: bool,
    ) {
        assert_eq!(status.is_terminal(), terminal);
        assert_eq!(status.is_claimable(), claimable);
        assert_eq!(status.as_str().parse::<JobStatus>(), Ok(status));
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("running".parse::<JobStatus>().is_err());
    }
}
