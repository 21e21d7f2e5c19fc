//! The durable notification buffer.
//!
//! Thin facade over the `bus_notifications` table: append inside a
//! caller transaction, filtered range reads, GC. All timing windows come
//! from [`BusConfig`] so they cannot drift from the blocking-poll
//! timeout.

use crate::channel::ChannelKey;
use crate::config::BusConfig;
use crate::entities::notification::{
    DeleteExpiredNotifications, Notification, NotificationInsert, PollNotifications,
};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use sqlx::PgPool;

#[derive(Clone)]
pub struct NotificationStore {
    db: DatabaseProcessor,
    config: BusConfig,
}

impl NotificationStore {
    pub fn new(pool: PgPool, config: BusConfig) -> Self {
        Self {
            db: DatabaseProcessor::new(pool),
            config,
        }
    }

    pub fn config(&self) -> BusConfig {
        self.config
    }

    pub fn pool(&self) -> &PgPool {
        &self.db.pool
    }

    /// Append rows inside the caller's transaction.
    pub async fn append_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        rows: Vec<NotificationInsert>,
    ) -> Result<u64, sqlx::Error> {
        Notification::insert_many_tx(tx, rows).await
    }

    /// Read everything new for the given keys.
    ///
    /// Each call is its own short transaction; nothing is held open
    /// across a dispatcher suspension.
    pub async fn poll(
        &self,
        channel_keys: &[ChannelKey],
        cursor: i64,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        self.db
            .process(PollNotifications {
                channel_keys: channel_keys.iter().map(|k| k.as_str().to_owned()).collect(),
                cursor,
                catch_up_window: self.config.catch_up_window(),
            })
            .await
    }

    /// Delete rows older than the retention window; returns the count.
    pub async fn gc(&self) -> Result<u64, sqlx::Error> {
        self.db
            .process(DeleteExpiredNotifications {
                retention_window: self.config.retention_window(),
            })
            .await
    }
}
