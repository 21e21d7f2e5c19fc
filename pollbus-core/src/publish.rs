//! The publisher contract.
//!
//! Business code hands over `(tenant, channel, type, payload)` entries;
//! the publisher canonicalizes every channel, writes one row per entry
//! in one transaction, and emits the cross-process NOTIFY strictly after
//! the commit. Emitting before commit visibility would let sibling
//! processes wake, read under their isolation level, find nothing, and
//! go back to sleep — a missed delivery, not just a spurious wake.

use crate::channel::{ChannelDescriptor, ChannelError, ChannelKey};
use crate::entities::notification::NotificationInsert;
use crate::store::NotificationStore;
use crate::waker::WAKE_CHANNEL;
use compact_str::CompactString;
use itertools::Itertools;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

/// Postgres caps a NOTIFY payload just under 8000 bytes; past this we
/// stop itemizing keys and tell every process to wake everyone.
const NOTIFY_PAYLOAD_LIMIT: usize = 7000;

/// Errors from the publish path.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("invalid channel: {0}")]
    Channel(#[from] ChannelError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One notification to publish.
#[derive(Debug, Clone)]
pub struct OutboundNotification {
    pub tenant: CompactString,
    pub channel: ChannelDescriptor,
    pub notification_type: CompactString,
    pub payload: serde_json::Value,
}

/// Encode the post-commit NOTIFY payload for a set of affected keys.
///
/// Deduplicates, then falls back to the empty wake-all payload when the
/// encoding would exceed the NOTIFY budget.
pub(crate) fn encode_wake_payload(keys: &[ChannelKey]) -> String {
    let unique: Vec<&str> = keys.iter().map(ChannelKey::as_str).unique().collect();
    match serde_json::to_string(&unique) {
        Ok(encoded) if encoded.len() <= NOTIFY_PAYLOAD_LIMIT => encoded,
        Ok(_) | Err(_) => String::new(),
    }
}

#[derive(Clone)]
pub struct NotificationPublisher {
    store: NotificationStore,
}

impl NotificationPublisher {
    pub fn new(store: NotificationStore) -> Self {
        Self { store }
    }

    /// Persist a batch of notifications and wake cross-process waiters.
    ///
    /// Canonicalization happens before the transaction opens, so caller
    /// errors never cost a connection. An empty batch is a no-op. The
    /// returned count is the number of rows written.
    #[tracing::instrument(skip_all, err, fields(entries = entries.len()))]
    pub async fn send_many(
        &self,
        entries: Vec<OutboundNotification>,
    ) -> Result<u64, PublishError> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut rows = Vec::with_capacity(entries.len());
        let mut keys = Vec::with_capacity(entries.len());
        for entry in entries {
            let key = ChannelKey::canonicalize(&entry.tenant, &entry.channel)?;
            rows.push(NotificationInsert {
                channel_key: key.clone(),
                message: json!({
                    "type": entry.notification_type,
                    "payload": entry.payload,
                }),
            });
            keys.push(key);
        }

        let mut tx = self.store.pool().begin().await?;
        let written = self.store.append_tx(&mut tx, rows).await?;
        tx.commit().await?;

        // Post-commit only. If the notify itself fails the rows are
        // already durable; waiters catch up on their next timeout-driven
        // re-poll, so this is a warning, not an error to the caller.
        let payload = encode_wake_payload(&keys);
        if let Err(e) = sqlx::query("SELECT pg_notify($1, $2)")
            .bind(WAKE_CHANNEL)
            .bind(&payload)
            .execute(self.store.pool())
            .await
        {
            warn!(error = %e, "Post-commit wake notify failed");
        } else {
            debug!(written, "Published notifications");
        }

        Ok(written)
    }

    /// Single-entry sugar over [`send_many`](Self::send_many).
    pub async fn send_one(
        &self,
        tenant: impl AsRef<str>,
        channel: ChannelDescriptor,
        notification_type: impl AsRef<str>,
        payload: serde_json::Value,
    ) -> Result<(), PublishError> {
        self.send_many(vec![OutboundNotification {
            tenant: CompactString::from(tenant.as_ref()),
            channel,
            notification_type: CompactString::from(notification_type.as_ref()),
            payload,
        }])
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use super::*;
    use crate::waker::{WakeScope, decode_wake_payload};

    fn canonical(tenant: &str, name: &str) -> ChannelKey {
        ChannelKey::canonicalize(tenant, &ChannelDescriptor::name(name)).unwrap()
    }

    #[test]
    fn payload_deduplicates_keys() {
        let keys = vec![
            canonical("acme", "orders"),
            canonical("acme", "orders"),
            canonical("acme", "stock"),
        ];
        let payload = encode_wake_payload(&keys);
        match decode_wake_payload(&payload) {
            WakeScope::Channels(decoded) => assert_eq!(
                decoded,
                vec![canonical("acme", "orders"), canonical("acme", "stock")]
            ),
            WakeScope::All => panic!("expected a channel set"),
        }
    }

    #[test]
    fn oversized_key_set_falls_back_to_wake_all() {
        let keys: Vec<ChannelKey> = (0..1000)
            .map(|i| canonical("acme", &format!("channel-{i}")))
            .collect();
        let payload = encode_wake_payload(&keys);
        assert!(payload.is_empty());
        assert_eq!(decode_wake_payload(&payload), WakeScope::All);
    }

    #[test]
    fn payload_round_trips_through_the_waker() {
        let keys = vec![canonical("acme", "orders")];
        let payload = encode_wake_payload(&keys);
        assert_eq!(decode_wake_payload(&payload), WakeScope::Channels(keys));
    }
}
