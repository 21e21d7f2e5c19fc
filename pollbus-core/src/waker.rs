//! Cross-process wake bridge.
//!
//! Each worker process holds one persistent `LISTEN` subscription on the
//! bus NOTIFY channel. A notification payload that decodes as a JSON
//! array of canonical channel keys wakes only the matching local
//! waiters; anything else (empty payload, oversized-set fallback,
//! undecodable bytes) wakes every local waiter and lets each poll's
//! re-read do the discrimination. Over-notifying is always safe here;
//! missing a wake is not.

use crate::channel::ChannelKey;
use crate::registry::WaiterRegistry;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Postgres NOTIFY channel the bus signals on.
pub const WAKE_CHANNEL: &str = "pollbus_wake";

const RECONNECT_DELAY_MIN: Duration = Duration::from_secs(1);
const RECONNECT_DELAY_MAX: Duration = Duration::from_secs(30);

/// What one NOTIFY payload asks the local registry to do.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum WakeScope {
    All,
    Channels(Vec<ChannelKey>),
}

/// Decode a NOTIFY payload.
///
/// Publishers send the affected canonical keys, or an empty payload when
/// the set would not fit. Anything unexpected decodes as `All`.
pub(crate) fn decode_wake_payload(payload: &str) -> WakeScope {
    if payload.is_empty() {
        return WakeScope::All;
    }
    match serde_json::from_str::<Vec<String>>(payload) {
        Ok(keys) if !keys.is_empty() => {
            WakeScope::Channels(keys.into_iter().map(ChannelKey::from_canonical).collect())
        }
        _ => WakeScope::All,
    }
}

/// Bridges database NOTIFY events into local registry wakes.
pub struct CrossProcessWaker {
    pool: PgPool,
    registry: Arc<WaiterRegistry>,
}

impl CrossProcessWaker {
    pub fn new(pool: PgPool, registry: Arc<WaiterRegistry>) -> Self {
        Self { pool, registry }
    }

    /// Run until shutdown is signalled.
    ///
    /// Reconnects with capped backoff if the subscription connection
    /// drops. After every (re)subscribe the registry is woken wholesale:
    /// anything committed while the subscription was down produced
    /// notifies this process never saw.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("CrossProcessWaker started");
        let mut reconnect_delay = RECONNECT_DELAY_MIN;

        'outer: loop {
            let mut listener = match self.subscribe().await {
                Ok(listener) => listener,
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_in = ?reconnect_delay,
                        "Failed to subscribe to wake channel"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(reconnect_delay) => {}
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                break 'outer;
                            }
                        }
                    }
                    reconnect_delay = (reconnect_delay * 2).min(RECONNECT_DELAY_MAX);
                    continue;
                }
            };
            reconnect_delay = RECONNECT_DELAY_MIN;
            self.registry.wake_all();

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("CrossProcessWaker received shutdown signal");
                            break 'outer;
                        }
                    }

                    result = listener.recv() => {
                        match result {
                            Ok(notification) => self.on_notify(notification.payload()),
                            Err(e) => {
                                warn!(error = %e, "Wake subscription lost, reconnecting");
                                break;
                            }
                        }
                    }
                }
            }
        }

        info!("CrossProcessWaker shutdown complete");
    }

    async fn subscribe(&self) -> Result<PgListener, sqlx::Error> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(WAKE_CHANNEL).await?;
        Ok(listener)
    }

    fn on_notify(&self, payload: &str) {
        match decode_wake_payload(payload) {
            WakeScope::All => {
                debug!(waiters = self.registry.len(), "Wake notify: all");
                self.registry.wake_all();
            }
            WakeScope::Channels(keys) => {
                debug!(channels = keys.len(), "Wake notify: channel set");
                self.registry.wake(&keys);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_wakes_all() {
        assert_eq!(decode_wake_payload(""), WakeScope::All);
    }

    #[test]
    fn key_array_payload_wakes_those_channels() {
        let payload = r#"["[\"acme\",\"orders\"]","[\"acme\",\"broadcast\"]"]"#;
        let scope = decode_wake_payload(payload);
        assert_eq!(
            scope,
            WakeScope::Channels(vec![
                ChannelKey::from_canonical(r#"["acme","orders"]"#),
                ChannelKey::from_canonical(r#"["acme","broadcast"]"#),
            ])
        );
    }

    #[test]
    fn garbage_payload_errs_toward_waking_all() {
        assert_eq!(decode_wake_payload("not json"), WakeScope::All);
        assert_eq!(decode_wake_payload("{\"a\":1}"), WakeScope::All);
        assert_eq!(decode_wake_payload("[]"), WakeScope::All);
        assert_eq!(decode_wake_payload("[1,2,3]"), WakeScope::All);
    }
}
