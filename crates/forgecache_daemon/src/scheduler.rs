//! The driving loop: one sync pass per fixed interval.

use std::time::Duration;

use forgecache::SyncEngine;
use tokio::sync::watch;

/// Run passes until shutdown is requested.
///
/// Passes never overlap: the next one starts one full interval after the
/// previous finished. A failed pass is logged and retried on the next tick;
/// the last successfully persisted snapshot stays authoritative in between.
pub async fn run_loop(
    engine: &SyncEngine,
    organization: &str,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        run_pass(engine, organization).await;

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("scheduler stopped");
                    return;
                }
            }
        }
    }
}

/// Run a single pass and log its result.
async fn run_pass(engine: &SyncEngine, organization: &str) {
    tracing::info!(organization, "checking cache for updates");
    match engine.run(organization).await {
        Ok(outcome) => {
            tracing::info!(
                repos = outcome.repos,
                reindexed = outcome.reindexed,
                unchanged = outcome.unchanged,
                pruned = outcome.pruned,
                "sync pass complete"
            );
        }
        Err(err) => {
            tracing::error!(error = %err, "sync pass failed, keeping previous snapshot");
        }
    }
}
