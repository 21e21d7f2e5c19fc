//! In-process table of suspended polls.
//!
//! Maps channel keys to the waiters currently blocked on them. Wakes are
//! one-shot: signalling a waiter removes it from every set it was
//! registered in, so it can never be woken twice. The registry is never
//! persisted; a process restart simply terminates in-flight polls and
//! clients re-poll.
//!
//! Two maps, both sharded ([`DashMap`]), so unrelated channels do not
//! contend on one lock. Removal from `waiters` is the single
//! linearization point: whichever of wake / wake-all / guard-drop takes
//! the entry out first owns the waiter, and everyone else sees a miss.

use crate::channel::ChannelKey;
use dashmap::DashMap;
use itertools::Itertools;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;

struct WaiterEntry {
    keys: Vec<ChannelKey>,
    notify: Arc<Notify>,
}

#[derive(Default)]
pub struct WaiterRegistry {
    next_id: AtomicU64,
    waiters: DashMap<u64, WaiterEntry>,
    by_key: DashMap<ChannelKey, HashSet<u64>>,
}

impl WaiterRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a waiter on a set of channel keys.
    ///
    /// Duplicate keys register once. The returned guard removes the
    /// waiter from every set on drop, which covers the timeout path and
    /// an aborted HTTP caller alike.
    pub fn register(self: &Arc<Self>, channel_keys: Vec<ChannelKey>) -> WaiterGuard {
        let keys: Vec<ChannelKey> = channel_keys.into_iter().unique().collect();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let notify = Arc::new(Notify::new());

        self.waiters.insert(
            id,
            WaiterEntry {
                keys: keys.clone(),
                notify: notify.clone(),
            },
        );
        for key in keys {
            self.by_key.entry(key).or_default().insert(id);
        }

        WaiterGuard {
            registry: Arc::clone(self),
            id,
            notify,
        }
    }

    /// Wake every waiter registered on any of the given keys.
    pub fn wake(&self, channel_keys: &[ChannelKey]) {
        let mut ids = Vec::new();
        for key in channel_keys {
            if let Some((_, set)) = self.by_key.remove(key) {
                ids.extend(set);
            }
        }
        for id in ids {
            self.signal(id);
        }
    }

    /// Wake every registered waiter.
    ///
    /// The cross-process signal does not say which channels changed, so
    /// this is the fan-out the waker falls back to; each woken poll
    /// re-reads with its own filter and absorbs the spurious cases.
    pub fn wake_all(&self) {
        let ids: Vec<u64> = self.waiters.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.signal(id);
        }
    }

    /// Number of currently registered waiters.
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    fn signal(&self, id: u64) {
        if let Some(entry) = self.take(id) {
            entry.notify.notify_one();
        }
    }

    /// Remove a waiter from both maps. Returns `None` if someone else
    /// already took it.
    fn take(&self, id: u64) -> Option<WaiterEntry> {
        let (_, entry) = self.waiters.remove(&id)?;
        for key in &entry.keys {
            if let Some(mut set) = self.by_key.get_mut(key) {
                set.remove(&id);
            }
            self.by_key.remove_if(key, |_, set| set.is_empty());
        }
        Some(entry)
    }
}

/// RAII handle for one registered waiter.
pub struct WaiterGuard {
    registry: Arc<WaiterRegistry>,
    id: u64,
    notify: Arc<Notify>,
}

impl WaiterGuard {
    /// Suspend until woken.
    ///
    /// `Notify::notify_one` stores a permit, so a wake delivered between
    /// registration and this await is not lost.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.registry.take(self.id);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn keys(names: &[&str]) -> Vec<ChannelKey> {
        names
            .iter()
            .map(|n| ChannelKey::from_canonical(format!(r#"["t","{n}"]"#)))
            .collect()
    }

    #[tokio::test]
    async fn wake_signals_and_removes_waiter() {
        let registry = WaiterRegistry::new();
        let guard = registry.register(keys(&["a"]));
        assert_eq!(registry.len(), 1);

        registry.wake(&keys(&["a"]));
        assert!(registry.is_empty());

        // The permit is already stored; wait resolves immediately.
        timeout(Duration::from_millis(50), guard.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wake_only_touches_matching_keys() {
        let registry = WaiterRegistry::new();
        let _a = registry.register(keys(&["a"]));
        let b = registry.register(keys(&["b"]));

        registry.wake(&keys(&["a"]));
        assert_eq!(registry.len(), 1);

        // Waiter b was not signalled.
        assert!(
            timeout(Duration::from_millis(50), b.wait()).await.is_err(),
            "waiter on another channel must not be woken"
        );
    }

    #[tokio::test]
    async fn waiter_on_many_keys_is_woken_once_and_fully_removed() {
        let registry = WaiterRegistry::new();
        let guard = registry.register(keys(&["a", "b", "c"]));

        registry.wake(&keys(&["b"]));
        assert!(registry.is_empty());
        timeout(Duration::from_millis(50), guard.wait())
            .await
            .unwrap();

        // Waking its other keys again finds nothing.
        registry.wake(&keys(&["a", "c"]));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn duplicate_keys_register_once() {
        let registry = WaiterRegistry::new();
        let _guard = registry.register(keys(&["a", "a", "a"]));
        assert_eq!(registry.len(), 1);
        registry.wake(&keys(&["a"]));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn wake_all_signals_everyone() {
        let registry = WaiterRegistry::new();
        let a = registry.register(keys(&["a"]));
        let b = registry.register(keys(&["b"]));

        registry.wake_all();
        assert!(registry.is_empty());
        timeout(Duration::from_millis(50), a.wait()).await.unwrap();
        timeout(Duration::from_millis(50), b.wait()).await.unwrap();
    }

    #[tokio::test]
    async fn dropping_the_guard_expires_the_waiter() {
        let registry = WaiterRegistry::new();
        let guard = registry.register(keys(&["a"]));
        assert_eq!(registry.len(), 1);

        drop(guard);
        assert!(registry.is_empty());

        // A later wake on the same key is a no-op.
        registry.wake(&keys(&["a"]));
    }

    #[tokio::test]
    async fn concurrent_register_and_wake_never_leak() {
        let registry = WaiterRegistry::new();
        let mut handles = Vec::new();

        for i in 0..64u64 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let key = keys(&[if i % 2 == 0 { "even" } else { "odd" }]);
                let guard = registry.register(key);
                timeout(Duration::from_secs(5), guard.wait()).await
            }));
        }

        // Let every task reach its suspension point, then wake both keys.
        tokio::time::sleep(Duration::from_millis(100)).await;
        registry.wake(&keys(&["even"]));
        registry.wake_all();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert!(registry.is_empty());
    }
}
