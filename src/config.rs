//! # Reader runtime configuration.
//!
//! Provides [`ReaderConfig`], the settings consumed by the [`RootReader`](crate::RootReader)
//! and every feed it drives. Loading these values (files, CLI, environment) is the embedder's
//! concern; the runtime only reads the struct.
//!
//! ## Sentinel values
//! - `timeout = 0s` → partition reads run without a deadline
//! - `progress_interval = 0s` → no periodic progress report
//! - `heartbeat` and `bus_capacity` are clamped to sane minimums by their accessors

use std::time::Duration;

/// Global configuration for a read operation.
///
/// ## Field semantics
/// - `timeout`: per-partition-read deadline (`0s` = unlimited)
/// - `heartbeat`: upper bound on one wait between two resource acquisition attempts
/// - `bus_capacity`: runtime event bus ring buffer size (min 1)
/// - `progress_interval`: period of the active-task dump (`0s` = disabled)
///
/// All fields are public; prefer the accessors to avoid sprinkling sentinel checks.
#[derive(Clone, Debug)]
pub struct ReaderConfig {
    /// Maximum duration of a single partition read.
    ///
    /// When the deadline is hit the read is interrupted, its checkpoint is still
    /// collected and the round carries on. Readers flagged as unlimited-time ignore it.
    pub timeout: Duration,

    /// Maximum wait between two `RETRY_LATER` resource acquisition attempts.
    ///
    /// Waiters are woken earlier whenever a resource is released in the same feed.
    pub heartbeat: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Period of the progress report listing active feeds and partition reads.
    pub progress_interval: Duration,
}

impl ReaderConfig {
    /// Returns the partition read timeout as an `Option`.
    ///
    /// - `None` → no timeout
    /// - `Some(d)` → deadline applied to each partition read
    #[inline]
    pub fn partition_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns the heartbeat clamped to a minimum of 1ms to avoid busy-polling.
    #[inline]
    pub fn heartbeat_clamped(&self) -> Duration {
        self.heartbeat.max(Duration::from_millis(1))
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the progress report period, `None` when disabled.
    #[inline]
    pub fn progress_period(&self) -> Option<Duration> {
        if self.progress_interval == Duration::ZERO {
            None
        } else {
            Some(self.progress_interval)
        }
    }
}

impl Default for ReaderConfig {
    /// Default configuration:
    ///
    /// - `timeout = 5min`
    /// - `heartbeat = 100ms`
    /// - `bus_capacity = 1024`
    /// - `progress_interval = 60s`
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            heartbeat: Duration::from_millis(100),
            bus_capacity: 1024,
            progress_interval: Duration::from_secs(60),
        }
    }
}
