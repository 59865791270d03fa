//! # LogWriter: renders runtime events through `tracing`
//!
//! Levels follow severity: failures are `warn`, lifecycle milestones are `info`,
//! per-partition traffic is `debug`, resource retries are `trace`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  feedvisor: feed starting feed="public_users"
//! DEBUG feedvisor: partitions created feed="public_users" round=1 count=3
//! DEBUG feedvisor: partition read timed out feed="public_users" round=1 partition=2 timeout_ms=300000 records=812
//! WARN  feedvisor: partition read failed feed="public_users" round=1 partition=3 reason="connection reset"
//! WARN  feedvisor: feed failed feed="public_users" reason="..."
//! ```

use async_trait::async_trait;
use tracing::{debug, info, trace, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let feed = e.feed.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::ReadStarting => info!(feeds = e.count, "read starting"),
            EventKind::ReadCompleted => info!("read completed"),
            EventKind::ReadFailed => warn!(failed = e.count, reason, "read failed"),
            EventKind::FeedStarting => info!(feed, "feed starting"),
            EventKind::FeedCompleted => info!(feed, rounds = e.round, "feed completed"),
            EventKind::FeedFailed => warn!(feed, reason, "feed failed"),
            EventKind::FeedCancelled => warn!(feed, reason, "feed cancelled"),
            EventKind::CreatorStarting => debug!(feed, round = e.round, "creator starting"),
            EventKind::PartitionsCreated => {
                debug!(feed, round = e.round, count = e.count, "partitions created")
            }
            EventKind::ResourcesUnavailable => trace!(
                feed,
                round = e.round,
                partition = e.partition,
                "resources unavailable"
            ),
            EventKind::PartitionReadStarting => debug!(
                feed,
                round = e.round,
                partition = e.partition,
                "partition read starting"
            ),
            EventKind::PartitionReadCompleted => debug!(
                feed,
                round = e.round,
                partition = e.partition,
                records = e.records,
                "partition read completed"
            ),
            EventKind::PartitionReadTimedOut => debug!(
                feed,
                round = e.round,
                partition = e.partition,
                timeout_ms = e.timeout_ms,
                records = e.records,
                "partition read timed out"
            ),
            EventKind::PartitionReadFailed => warn!(
                feed,
                round = e.round,
                partition = e.partition,
                reason,
                "partition read failed"
            ),
            EventKind::PartitionReadCancelled => debug!(
                feed,
                round = e.round,
                partition = e.partition,
                reason,
                "partition read cancelled"
            ),
            EventKind::CheckpointApplied => trace!(
                feed,
                round = e.round,
                partition = e.partition,
                records = e.records,
                "checkpoint applied"
            ),
            EventKind::CheckpointEmitted => {
                debug!(feed, round = e.round, count = e.count, "checkpoint emitted")
            }
            EventKind::SubscriberOverflow => {
                warn!(subscriber = e.subscriber, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                warn!(subscriber = e.subscriber, reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
