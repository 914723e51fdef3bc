//! Shared timer loop for the background components.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

/// Run `tick` immediately, then every `period`, until shutdown is requested
/// (or the shutdown sender is dropped).
///
/// Ticks never overlap: a slow tick delays the next one, and boundaries
/// missed meanwhile are skipped rather than replayed in a burst. An
/// in-flight tick is never cancelled by shutdown.
pub(crate) async fn run_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                // 次のループで判定
                continue;
            }
            _ = timer.tick() => {}
        }

        tick().await;
    }

    debug!(component = name, "stopped");
}
