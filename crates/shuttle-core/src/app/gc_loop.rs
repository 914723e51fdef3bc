//! GcLoop - 期限切れ OAuth session の削除
//!
//! 放棄された authorization は expires_at を過ぎても行が残るので、
//! 定期的に掃除します。

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use super::periodic::run_periodic;
use crate::config::GcConfig;
use crate::error::StoreError;
use crate::ports::{Clock, SessionStore};

pub struct GcLoop {
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    config: GcConfig,
}

impl GcLoop {
    pub fn new(sessions: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, config: GcConfig) -> Self {
        Self {
            sessions,
            clock,
            config,
        }
    }

    pub async fn sweep(&self) -> Result<u64, StoreError> {
        self.sessions.purge_expired(self.clock.now()).await
    }

    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        let this = &*self;
        run_periodic("session-gc", this.config.interval, shutdown, move || async move {
            match this.sweep().await {
                Ok(purged) => debug!(purged, "purged expired oauth sessions"),
                Err(err) => warn!(error = %err, "session gc pass failed"),
            }
        })
        .await;
    }
}
