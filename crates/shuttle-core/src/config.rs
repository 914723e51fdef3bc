//! Process configuration, read from environment variables.
//!
//! Every knob has a default matching the reference timings; only the
//! database URL and the master key are required.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::domain::Provider;
use crate::error::CipherError;
use crate::impls::MasterKey;
use crate::oauth::{OAuthProviderConfig, RefreshPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("SHUTTLE_MASTER_KEY: {0}")]
    MasterKey(#[from] CipherError),
}

/// Worker loop tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Written to `locked_by` on every claim.
    pub worker_id: String,
    pub tick_interval: Duration,
    /// Upper bound on jobs processed per tick.
    pub batch_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("worker-{}", std::process::id()),
            tick_interval: Duration::from_secs(1),
            batch_size: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaperConfig {
    pub interval: Duration,
    /// A `processing` job locked longer than this is presumed orphaned.
    pub lock_timeout: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            lock_timeout: Duration::from_secs(900),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcConfig {
    pub interval: Duration,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
        }
    }
}

pub struct ShuttleConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub worker: WorkerConfig,
    pub reconcile: SchedulerConfig,
    pub reaper: ReaperConfig,
    pub session_gc: GcConfig,
    pub master_key: MasterKey,
    pub key_version: i32,
    /// `None` when no OAuth client is configured.
    pub oauth: Option<OAuthProviderConfig>,
    pub refresh: RefreshPolicy,
}

impl ShuttleConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let defaults = WorkerConfig::default();
        let worker = WorkerConfig {
            worker_id: env.get("SHUTTLE_WORKER_ID").unwrap_or(defaults.worker_id),
            tick_interval: env.millis("SHUTTLE_TICK_MS", defaults.tick_interval)?,
            batch_size: env.parse("SHUTTLE_BATCH_SIZE", defaults.batch_size)?,
        };
        if worker.batch_size == 0 {
            return Err(invalid("SHUTTLE_BATCH_SIZE", "must be at least 1"));
        }

        let reaper_defaults = ReaperConfig::default();

        Ok(Self {
            database_url: env.require("DATABASE_URL")?,
            db_max_connections: env.parse("SHUTTLE_DB_MAX_CONNECTIONS", 5)?,
            worker,
            reconcile: SchedulerConfig {
                interval: env.secs(
                    "SHUTTLE_RECONCILE_INTERVAL_SECS",
                    SchedulerConfig::default().interval,
                )?,
            },
            reaper: ReaperConfig {
                interval: env.secs("SHUTTLE_REAPER_INTERVAL_SECS", reaper_defaults.interval)?,
                lock_timeout: env.secs("SHUTTLE_LOCK_TIMEOUT_SECS", reaper_defaults.lock_timeout)?,
            },
            session_gc: GcConfig {
                interval: env.secs("SHUTTLE_SESSION_GC_INTERVAL_SECS", GcConfig::default().interval)?,
            },
            master_key: MasterKey::from_base64(&env.require("SHUTTLE_MASTER_KEY")?)?,
            key_version: env.parse("SHUTTLE_KEY_VERSION", 1)?,
            oauth: oauth_from(&env)?,
            refresh: RefreshPolicy::default(),
        })
    }
}

fn oauth_from<F>(env: &Env<F>) -> Result<Option<OAuthProviderConfig>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(client_id) = env.get("SHUTTLE_OAUTH_CLIENT_ID") else {
        return Ok(None);
    };

    let scopes = env
        .get("SHUTTLE_OAUTH_SCOPES")
        .map(|s| {
            s.split([' ', ','])
                .filter(|scope| !scope.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(Some(OAuthProviderConfig {
        provider: Provider::new(env.require("SHUTTLE_OAUTH_PROVIDER")?),
        client_id,
        client_secret: env.get("SHUTTLE_OAUTH_CLIENT_SECRET"),
        authorize_url: env.url("SHUTTLE_OAUTH_AUTHORIZE_URL")?,
        token_url: env.url("SHUTTLE_OAUTH_TOKEN_URL")?,
        scopes,
    }))
}

fn invalid(var: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: reason.into(),
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, var: &str) -> Option<String> {
        (self.0)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn require(&self, var: &'static str) -> Result<String, ConfigError> {
        self.get(var).ok_or(ConfigError::Missing(var))
    }

    fn parse<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(var) {
            Some(raw) => raw.parse().map_err(|e| invalid(var, format!("{raw:?}: {e}"))),
            None => Ok(default),
        }
    }

    fn secs(&self, var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        self.parse(var, default.as_secs()).map(Duration::from_secs)
    }

    fn millis(&self, var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let ms: u64 = self.parse(var, default.as_millis() as u64)?;
        if ms == 0 {
            return Err(invalid(var, "must be positive"));
        }
        Ok(Duration::from_millis(ms))
    }

    fn url(&self, var: &'static str) -> Result<Url, ConfigError> {
        let raw = self.require(var)?;
        Url::parse(&raw).map_err(|e| invalid(var, e.to_string()))
    }
}
