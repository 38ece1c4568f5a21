//! Shared helpers used by the long-running tasks

pub mod retry;

use tokio::sync::watch;

/// Resolve once the shutdown flag is set or its sender is gone
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
