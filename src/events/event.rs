//! # Runtime events emitted by the root reader and the feed readers.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Read events**: the read as a whole (starting, completed, failed)
//! - **Feed events**: one feed task (starting, completed, failed, cancelled)
//! - **Round events**: creator and partition reads of one round, checkpoints
//! - **Subscriber events**: overflow and panics of event subscribers
//!
//! The [`Event`] struct carries additional metadata such as timestamps, feed label, round and
//! partition numbers, record counts and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use feedvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::PartitionReadFailed)
//!     .with_feed("public_users")
//!     .with_round(2)
//!     .with_partition(3)
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::PartitionReadFailed);
//! assert_eq!(ev.feed.as_deref(), Some("public_users"));
//! assert_eq!(ev.task_key().as_deref(), Some("public_users/2/3"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `subscriber`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `subscriber`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Read events ===
    /// The root reader is starting the feed tasks.
    ///
    /// Sets:
    /// - `count`: number of feeds
    ReadStarting,

    /// Every feed completed.
    ReadCompleted,

    /// At least one feed failed; every feed task has been joined.
    ///
    /// Sets:
    /// - `count`: number of failed feeds
    /// - `reason`: aggregated failure message
    ReadFailed,

    // === Feed events ===
    /// A feed task started.
    ///
    /// Sets:
    /// - `feed`: feed label
    FeedStarting,

    /// A feed ran out of partitions.
    ///
    /// Sets:
    /// - `feed`: feed label
    /// - `round`: terminal round
    FeedCompleted,

    /// A feed task failed.
    ///
    /// Sets:
    /// - `feed`: feed label
    /// - `reason`: failure message
    FeedFailed,

    /// A global feed was cancelled because some of its streams failed.
    ///
    /// Sets:
    /// - `feed`: feed label
    /// - `reason`: cancellation cause
    FeedCancelled,

    // === Round events ===
    /// A partitions creator acquired its resources and is about to run.
    ///
    /// Sets:
    /// - `feed`, `round`
    CreatorStarting,

    /// A partitions creator produced the partitions of a round.
    ///
    /// Sets:
    /// - `feed`, `round`
    /// - `count`: number of partitions (0 completes the feed)
    PartitionsCreated,

    /// A resource acquisition attempt returned `RetryLater`.
    ///
    /// Sets:
    /// - `feed`, `round`
    /// - `partition`: partition index, unset for the creator
    ResourcesUnavailable,

    /// A partition reader acquired its resources and is about to run.
    ///
    /// Sets:
    /// - `feed`, `round`, `partition`
    PartitionReadStarting,

    /// A partition read finished.
    ///
    /// Sets:
    /// - `feed`, `round`, `partition`
    /// - `records`: records reported by the checkpoint
    PartitionReadCompleted,

    /// A partition read hit the read timeout; its checkpoint was still collected.
    ///
    /// Sets:
    /// - `feed`, `round`, `partition`
    /// - `timeout_ms`: configured timeout (ms)
    /// - `records`: records reported by the checkpoint
    PartitionReadTimedOut,

    /// A partition read failed.
    ///
    /// Sets:
    /// - `feed`, `round`, `partition`
    /// - `reason`: failure message
    PartitionReadFailed,

    /// A partition read was cancelled because an earlier partition failed.
    ///
    /// Sets:
    /// - `feed`, `round`, `partition`
    /// - `reason`: the earlier failure
    PartitionReadCancelled,

    /// A partition checkpoint was applied to the feed state.
    ///
    /// Sets:
    /// - `feed`, `round`, `partition`
    /// - `records`: records reported by the checkpoint
    CheckpointApplied,

    /// Checkpoint messages were handed to the output consumer.
    ///
    /// Sets:
    /// - `feed`, `round`
    /// - `count`: number of messages
    CheckpointEmitted,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Label of the feed, if applicable.
    pub feed: Option<Arc<str>>,
    /// Round number (starting from 1).
    pub round: Option<u64>,
    /// Partition index within the round (starting from 1).
    pub partition: Option<usize>,
    /// Number of records.
    pub records: Option<u64>,
    /// Generic count (feeds, partitions, messages).
    pub count: Option<usize>,
    /// Partition read timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Name of the subscriber, for subscriber events.
    pub subscriber: Option<&'static str>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            feed: None,
            round: None,
            partition: None,
            records: None,
            count: None,
            timeout_ms: None,
            reason: None,
            subscriber: None,
        }
    }

    /// Attaches a feed label.
    #[inline]
    pub fn with_feed(mut self, feed: impl Into<Arc<str>>) -> Self {
        self.feed = Some(feed.into());
        self
    }

    /// Attaches a round number.
    #[inline]
    pub fn with_round(mut self, round: u64) -> Self {
        self.round = Some(round);
        self
    }

    /// Attaches a partition index.
    #[inline]
    pub fn with_partition(mut self, partition: usize) -> Self {
        self.partition = Some(partition);
        self
    }

    /// Attaches a record count.
    #[inline]
    pub fn with_records(mut self, records: u64) -> Self {
        self.records = Some(records);
        self
    }

    /// Attaches a generic count.
    #[inline]
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        let mut ev = Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"));
        ev.subscriber = Some(subscriber);
        ev
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        let mut ev = Event::new(EventKind::SubscriberPanicked).with_reason(info);
        ev.subscriber = Some(subscriber);
        ev
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }

    /// Key of the runtime task the event is about.
    ///
    /// - `feed` for feed events
    /// - `feed/round` for creator events
    /// - `feed/round/partition` for partition read events
    pub fn task_key(&self) -> Option<String> {
        let feed = self.feed.as_deref()?;
        Some(match (self.round, self.partition) {
            (Some(round), Some(partition)) => format!("{feed}/{round}/{partition}"),
            (Some(round), None) => format!("{feed}/{round}"),
            _ => feed.to_string(),
        })
    }
}
