//! Bus timing configuration.
//!
//! The bus runs off a single duration, `poll_timeout`. The catch-up
//! window for cursor-less polls equals it and the GC retention window is
//! double it. Deriving all three from one value keeps the blocking wait,
//! the catch-up read and row retention from drifting apart; if they were
//! tuned independently a client could lose messages between its first
//! poll and its first cursor.

use std::time::Duration;

/// Timing configuration shared by the dispatcher, the store and the GC
/// sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// How long a blocking poll waits before resolving empty.
    pub poll_timeout: Duration,
}

impl BusConfig {
    /// Default blocking-poll timeout.
    pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(50);

    pub fn new(poll_timeout: Duration) -> Self {
        Self { poll_timeout }
    }

    /// How far back a `last == 0` poll looks.
    pub fn catch_up_window(&self) -> Duration {
        self.poll_timeout
    }

    /// How long a notification row survives before GC deletes it.
    ///
    /// Twice the poll timeout, so a row stays visible for a full
    /// timeout-length even if it was committed the instant a catch-up
    /// window opened.
    pub fn retention_window(&self) -> Duration {
        self.poll_timeout * 2
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Self::DEFAULT_POLL_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_stay_derived_from_one_constant() {
        let config = BusConfig::new(Duration::from_secs(7));
        assert_eq!(config.catch_up_window(), Duration::from_secs(7));
        assert_eq!(config.retention_window(), Duration::from_secs(14));
    }

    #[test]
    fn default_timeout() {
        assert_eq!(
            BusConfig::default().poll_timeout,
            Duration::from_secs(50)
        );
    }
}
