//! The long-poll dispatcher.
//!
//! One `dispatch` call services one long-poll request: canonicalize,
//! immediate read, and if that comes back empty, suspend on the waiter
//! registry until a wake or the timeout. The dispatcher is an explicitly
//! constructed service — tests build as many independent instances as
//! they need — with a `start`/`stop` lifecycle that owns the waker and
//! GC background tasks.
//!
//! Resource rule: no database connection or transaction is ever held
//! across the suspension. Each read borrows from the pool and returns it
//! before the await; thousands of idle pollers hold zero connections.

use crate::channel::{ChannelDescriptor, ChannelError, ChannelKey};
use crate::config::BusConfig;
use crate::entities::notification::Notification;
use crate::gc::GcSweeper;
use crate::registry::WaiterRegistry;
use crate::store::NotificationStore;
use crate::waker::CrossProcessWaker;
use itertools::Itertools;
use sqlx::PgPool;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Errors a poll call can surface.
///
/// Transient absence is not here: a timeout or a spurious wake resolves
/// as an empty `Ok`, and the HTTP layer returns an empty array.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Malformed channel descriptor; a caller bug, rejected before any
    /// store or registry interaction.
    #[error("invalid channel: {0}")]
    Channel(#[from] ChannelError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The dispatcher was never started or has been stopped. Distinct
    /// from an empty result so clients cannot mistake "disabled" for
    /// "nothing new".
    #[error("bus dispatcher is not running")]
    NotRunning,
}

pub struct PollDispatcher {
    store: NotificationStore,
    registry: Arc<WaiterRegistry>,
    config: BusConfig,
    running: AtomicBool,
}

impl PollDispatcher {
    pub fn new(pool: PgPool, config: BusConfig) -> Self {
        Self {
            store: NotificationStore::new(pool, config),
            registry: WaiterRegistry::new(),
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    pub fn registry(&self) -> &Arc<WaiterRegistry> {
        &self.registry
    }

    /// Start the background tasks: the cross-process waker and the GC
    /// sweeper. Returns their join handles; they exit when `shutdown_rx`
    /// flips to `true`.
    pub fn start(&self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        self.running.store(true, Ordering::SeqCst);

        let waker = CrossProcessWaker::new(self.store.pool().clone(), Arc::clone(&self.registry));
        let sweeper = GcSweeper::new(self.store.clone());

        vec![
            tokio::spawn(waker.run(shutdown_rx.clone())),
            tokio::spawn(sweeper.run(shutdown_rx)),
        ]
    }

    /// Stop accepting polls and release every suspended waiter.
    ///
    /// In-flight calls run their final read and return; new calls get
    /// [`DispatchError::NotRunning`].
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.registry.wake_all();
    }

    /// Service one long-poll call.
    ///
    /// `last == 0` means catch-up (everything within the catch-up
    /// window); `last > 0` resumes exactly after that id. `peek` always
    /// resolves immediately, empty or not.
    pub async fn dispatch(
        &self,
        tenant: &str,
        channels: &[ChannelDescriptor],
        last: i64,
        peek: bool,
    ) -> Result<Vec<Notification>, DispatchError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(DispatchError::NotRunning);
        }

        // Canonicalize everything up front; the implicit broadcast key
        // comes first so every poll hears tenant-wide announcements.
        let mut keys = Vec::with_capacity(channels.len() + 1);
        keys.push(ChannelKey::broadcast(tenant)?);
        for descriptor in channels {
            keys.push(ChannelKey::canonicalize(tenant, descriptor)?);
        }
        let keys: Vec<ChannelKey> = keys.into_iter().unique().collect();

        let found = self.store.poll(&keys, last).await?;
        if peek || !found.is_empty() {
            return Ok(found);
        }

        let guard = self.registry.register(keys.clone());

        // A publisher that committed between the read above and the
        // registration has already sent its notify to nobody; one
        // re-read closes that window.
        let found = self.store.poll(&keys, last).await?;
        if !found.is_empty() {
            return Ok(found);
        }

        // The only suspension point. Timeout and wake converge on the
        // same final read: whatever it returns is the answer, and empty
        // is a normal answer.
        let timed_out = tokio::time::timeout(self.config.poll_timeout, guard.wait())
            .await
            .is_err();
        debug!(tenant, timed_out, "Poll resumed");

        let found = self.store.poll(&keys, last).await?;
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use super::*;

    fn lazy_dispatcher() -> PollDispatcher {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://pollbus@localhost/pollbus")
            .unwrap_or_else(|_| unreachable!("lazy pool creation does not connect"));
        PollDispatcher::new(pool, BusConfig::default())
    }

    #[tokio::test]
    async fn dispatch_before_start_is_a_configuration_error() {
        let dispatcher = lazy_dispatcher();
        let result = dispatcher
            .dispatch("acme", &[ChannelDescriptor::name("orders")], 0, false)
            .await;
        assert!(matches!(result, Err(DispatchError::NotRunning)));
    }

    #[tokio::test]
    async fn stop_releases_registered_waiters() {
        let dispatcher = lazy_dispatcher();
        let guard = dispatcher.registry().register(vec![
            ChannelKey::broadcast("acme").unwrap_or_else(|_| unreachable!()),
        ]);
        dispatcher.stop();
        assert!(dispatcher.registry().is_empty());
        tokio::time::timeout(std::time::Duration::from_millis(50), guard.wait())
            .await
            .unwrap_or_else(|_| panic!("stop must wake suspended waiters"));
    }
}
