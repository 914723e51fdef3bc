//! ReaperLoop - 期限切れ lock の回収
//!
//! worker プロセスが死ぬと、その job は processing のまま残ります。
//! lock_timeout より古い lock を pending に戻します（attempts は据え置き）。

use std::sync::Arc;

use chrono::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use super::periodic::run_periodic;
use crate::config::ReaperConfig;
use crate::error::StoreError;
use crate::ports::{Clock, JobStore};

pub struct ReaperLoop {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    config: ReaperConfig,
}

impl ReaperLoop {
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>, config: ReaperConfig) -> Self {
        Self { store, clock, config }
    }

    /// Release every lock older than the timeout. Returns the count.
    pub async fn sweep(&self) -> Result<u64, StoreError> {
        let timeout = Duration::from_std(self.config.lock_timeout)
            .map_err(|e| StoreError::Corrupt(format!("lock timeout out of range: {e}")))?;
        self.store.release_stale(self.clock.now() - timeout).await
    }

    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        let this = &*self;
        run_periodic("reaper", this.config.interval, shutdown, move || async move {
            match this.sweep().await {
                Ok(0) => {}
                Ok(released) => info!(released, "released stale job locks"),
                Err(err) => warn!(error = %err, "reaper pass failed"),
            }
        })
        .await;
    }
}
