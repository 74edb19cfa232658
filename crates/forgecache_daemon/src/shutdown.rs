//! Graceful shutdown signalling.

use tokio::sync::watch;

/// Install the Ctrl+C handler and return a receiver that flips to `true`
/// when shutdown is requested.
///
/// The first interrupt asks the scheduler to stop after the current pass;
/// a second interrupt force-quits the process.
pub fn listen() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::info!("shutdown requested, stopping after the current pass");
        let _ = tx.send(true);

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("second interrupt, exiting immediately");
            std::process::exit(130);
        }
    });

    rx
}
