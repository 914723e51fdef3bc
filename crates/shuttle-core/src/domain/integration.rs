//! Integration: per-project, per-provider connection state.
//!
//! State machine:
//! - Disabled -> Connected (authorization callback succeeded)
//! - Connected -> Expired (refresh impossible or exhausted)
//! - Connected -> Disabled (disconnect, or a new authorization attempt)
//! - any -> Error (exchange failure; carries a message)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{IntegrationId, ProjectId, Provider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    Disabled,
    Connected,
    Expired,
    Error,
}

impl IntegrationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IntegrationStatus::Disabled => "disabled",
            IntegrationStatus::Connected => "connected",
            IntegrationStatus::Expired => "expired",
            IntegrationStatus::Error => "error",
        }
    }
}

impl fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntegrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disabled" => Ok(IntegrationStatus::Disabled),
            "connected" => Ok(IntegrationStatus::Connected),
            "expired" => Ok(IntegrationStatus::Expired),
            "error" => Ok(IntegrationStatus::Error),
            other => Err(format!("unknown integration status {other:?}")),
        }
    }
}

/// A status change requested by the token lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationTransition {
    /// connected_at = `at`, last_error cleared.
    Connected { at: DateTime<Utc> },
    /// last_error = `error` (None clears it), connected_at kept.
    Expired { error: Option<String> },
    /// last_error = `error`, connected_at kept.
    Errored { error: String },
    /// connected_at and last_error cleared.
    Disabled,
}

impl IntegrationTransition {
    pub fn status(&self) -> IntegrationStatus {
        match self {
            IntegrationTransition::Connected { .. } => IntegrationStatus::Connected,
            IntegrationTransition::Expired { .. } => IntegrationStatus::Expired,
            IntegrationTransition::Errored { .. } => IntegrationStatus::Error,
            IntegrationTransition::Disabled => IntegrationStatus::Disabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Integration {
    pub id: IntegrationId,
    pub project_id: ProjectId,
    pub provider: Provider,
    pub status: IntegrationStatus,
    pub last_error: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Integration {
    pub fn new(
        id: IntegrationId,
        project_id: ProjectId,
        provider: Provider,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            project_id,
            provider,
            status: IntegrationStatus::Disabled,
            last_error: None,
            connected_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == IntegrationStatus::Connected
    }

    pub fn apply(&mut self, transition: IntegrationTransition, now: DateTime<Utc>) {
        self.status = transition.status();
        match transition {
            IntegrationTransition::Connected { at } => {
                self.connected_at = Some(at);
                self.last_error = None;
            }
            IntegrationTransition::Expired { error } => {
                self.last_error = error;
            }
            IntegrationTransition::Errored { error } => {
                self.last_error = Some(error);
            }
            IntegrationTransition::Disabled => {
                self.connected_at = None;
                self.last_error = None;
            }
        }
        self.updated_at = now;
    }
}
