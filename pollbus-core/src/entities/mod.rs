pub mod notification;

use time::{Duration as TimeDuration, OffsetDateTime, PrimitiveDateTime};

/// `now - window` as the naive UTC timestamp type the
/// `bus_notifications` table stores, for catch-up and retention cutoffs.
pub(crate) fn utc_cutoff(window: std::time::Duration) -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc() - TimeDuration::try_from(window).unwrap_or(TimeDuration::ZERO);
    PrimitiveDateTime::new(now.date(), now.time())
}
