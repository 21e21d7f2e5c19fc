//! Recurring garbage collection of expired notifications.
//!
//! Runs one delete per poll-timeout period against the `2×TIMEOUT`
//! retention window, so a row is removed at most one period after it
//! expires. Deletion failures are logged and the loop keeps going; the
//! next tick retries the same rows.

use crate::store::NotificationStore;
use tokio::sync::watch;
use tracing::{debug, error, info};

pub struct GcSweeper {
    store: NotificationStore,
}

impl GcSweeper {
    pub fn new(store: NotificationStore) -> Self {
        Self { store }
    }

    /// Run the sweep loop until shutdown is signalled.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("GcSweeper started");

        let period = self.store.config().poll_timeout;
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // interval's first tick fires immediately; skip it
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("GcSweeper received shutdown signal");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    match self.store.gc().await {
                        Ok(0) => {}
                        Ok(deleted) => debug!(deleted, "Expired notifications removed"),
                        Err(e) => error!(error = %e, "Notification GC failed"),
                    }
                }
            }
        }

        info!("GcSweeper shutdown complete");
    }
}
