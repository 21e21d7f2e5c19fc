use crate::channel::ChannelKey;
use crate::entities::utc_cutoff;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use std::time::Duration;

/// One persisted bus notification.
///
/// Rows are immutable once written; `id` comes off a sequence and is the
/// resumption cursor, `created_at` exists only for the catch-up window
/// and GC.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    pub channel_key: String,
    pub message: serde_json::Value,
    pub created_at: time::PrimitiveDateTime,
}

/// Data for one row of a bulk insert.
#[derive(Debug, Clone)]
pub struct NotificationInsert {
    pub channel_key: ChannelKey,
    pub message: serde_json::Value,
}

impl Notification {
    /// Insert many notifications inside the caller's transaction.
    ///
    /// The caller commits; the cross-process wake is the publisher's
    /// post-commit duty, never this function's.
    pub async fn insert_many_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        rows: Vec<NotificationInsert>,
    ) -> Result<u64, sqlx::Error> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut query_builder =
            sqlx::QueryBuilder::new("INSERT INTO bus_notifications (channel_key, message) ");

        query_builder.push_values(rows, |mut b, row| {
            b.push_bind(row.channel_key.into_string())
                .push_bind(row.message);
        });

        let result = query_builder.build().execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone)]
/// Read notifications for a set of canonical channel keys.
///
/// `cursor == 0` is the catch-up read: everything younger than
/// `catch_up_window`. `cursor > 0` is exact resumption: everything with
/// a greater id. Both are filtered to the given keys and ordered
/// ascending by id.
pub struct PollNotifications {
    pub channel_keys: Vec<String>,
    pub cursor: i64,
    pub catch_up_window: Duration,
}

impl Processor<PollNotifications> for DatabaseProcessor {
    type Output = Vec<Notification>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:PollNotifications")]
    async fn process(&self, query: PollNotifications) -> Result<Vec<Notification>, sqlx::Error> {
        if query.channel_keys.is_empty() {
            return Ok(Vec::new());
        }

        let notifications = if query.cursor > 0 {
            sqlx::query_as::<_, Notification>(
                r#"
                SELECT id, channel_key, message, created_at
                FROM bus_notifications
                WHERE channel_key = ANY($1) AND id > $2
                ORDER BY id
                "#,
            )
            .bind(&query.channel_keys)
            .bind(query.cursor)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, Notification>(
                r#"
                SELECT id, channel_key, message, created_at
                FROM bus_notifications
                WHERE channel_key = ANY($1) AND created_at >= $2
                ORDER BY id
                "#,
            )
            .bind(&query.channel_keys)
            .bind(utc_cutoff(query.catch_up_window))
            .fetch_all(&self.pool)
            .await?
        };

        Ok(notifications)
    }
}

#[derive(Debug, Clone)]
/// Delete notifications older than the retention window.
pub struct DeleteExpiredNotifications {
    pub retention_window: Duration,
}

impl Processor<DeleteExpiredNotifications> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:DeleteExpiredNotifications")]
    async fn process(&self, delete: DeleteExpiredNotifications) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM bus_notifications WHERE created_at < $1")
            .bind(utc_cutoff(delete.retention_window))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
