//! Error types used by the feed reading runtime and by connector code.
//!
//! A single enum, [`ReadError`], covers both sides of the boundary:
//!
//! - connector-supplied code (partitions creators, partition readers, resource probes)
//!   reports its own failures with [`ReadError::Fail`] (see [`ReadError::fail`]);
//! - the runtime wraps those failures with context (feed, round, partition) and adds its own
//!   variants for factory exhaustion, cascade cancellation and cross-feed aggregation.
//!
//! The type is `Clone` because one failure can be attached as the cause of every partition
//! read it cancels. Helper methods (`as_label`, `as_message`) are provided for logs.

use std::sync::Arc;

use thiserror::Error;

/// # Errors produced while reading feeds.
///
/// Timeouts and `RETRY_LATER` resource acquisition outcomes are **not** errors and never
/// surface through this type.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ReadError {
    /// Connector code failed (creator, reader or resource probe).
    #[error("read failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// No configured factory produced a partitions creator for the feed.
    #[error("no partitions creator factory accepted feed '{feed}'")]
    FactoryExhausted {
        /// Label of the feed.
        feed: String,
    },

    /// The feed is not known to the state manager.
    #[error("feed '{feed}' is not tracked by the state manager")]
    UnknownFeed {
        /// Label of the feed.
        feed: String,
    },

    /// The partitions creator of a round failed.
    #[error("feed '{feed}' round {round}: partitions creator failed")]
    CreatorFailed {
        /// Label of the feed.
        feed: String,
        /// Round number (1-based).
        round: u64,
        /// What the creator reported.
        #[source]
        source: Arc<ReadError>,
    },

    /// A partition reader of a round failed.
    #[error("feed '{feed}' round {round}: partition {partition} failed")]
    PartitionFailed {
        /// Label of the feed.
        feed: String,
        /// Round number (1-based).
        round: u64,
        /// Partition index (1-based, creation order).
        partition: usize,
        /// What the reader reported.
        #[source]
        source: Arc<ReadError>,
    },

    /// A partition read was cancelled because an earlier partition of the same round failed.
    #[error("feed '{feed}' round {round}: partition {partition} cancelled after an earlier partition failed")]
    PartitionCancelled {
        /// Label of the feed.
        feed: String,
        /// Round number (1-based).
        round: u64,
        /// Partition index (1-based, creation order).
        partition: usize,
        /// The failure which triggered the cancellation.
        #[source]
        cause: Arc<ReadError>,
    },

    /// A global feed was cancelled because at least one of its streams failed.
    #[error("feed '{feed}' cancelled: at least one of its streams did not complete")]
    FeedCancelled {
        /// Label of the feed.
        feed: String,
        /// The (possibly aggregated) stream failures.
        #[source]
        cause: Arc<ReadError>,
    },

    /// A feed task panicked.
    #[error("feed '{feed}' task panicked: {message}")]
    Panicked {
        /// Label of the feed.
        feed: String,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// Work was cancelled by its parent context.
    #[error("context cancelled")]
    Canceled,

    /// Several feeds failed; the first one is primary, the others are suppressed.
    #[error("{primary} (and {} suppressed)", .suppressed.len())]
    Aggregate {
        /// First failure; stream feeds come before global feeds.
        #[source]
        primary: Box<ReadError>,
        /// Remaining failures.
        suppressed: Vec<ReadError>,
    },
}

impl ReadError {
    /// Shorthand for connector code: `ReadError::Fail` from anything printable.
    ///
    /// # Example
    /// ```
    /// use feedvisor::ReadError;
    ///
    /// let err = ReadError::fail("connection reset");
    /// assert_eq!(err.to_string(), "read failed: connection reset");
    /// ```
    pub fn fail(error: impl std::fmt::Display) -> Self {
        ReadError::Fail {
            error: error.to_string(),
        }
    }

    /// Combines errors into one: `None` when empty, the error itself when alone,
    /// otherwise an [`ReadError::Aggregate`] with the first one as primary.
    pub fn aggregate(errors: impl IntoIterator<Item = ReadError>) -> Option<ReadError> {
        let mut errors = errors.into_iter();
        let primary = errors.next()?;
        let suppressed: Vec<ReadError> = errors.collect();
        if suppressed.is_empty() {
            return Some(primary);
        }
        Some(ReadError::Aggregate {
            primary: Box::new(primary),
            suppressed,
        })
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use feedvisor::ReadError;
    ///
    /// let err = ReadError::FactoryExhausted { feed: "public_users".into() };
    /// assert_eq!(err.as_label(), "factory_exhausted");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ReadError::Fail { .. } => "read_failed",
            ReadError::FactoryExhausted { .. } => "factory_exhausted",
            ReadError::UnknownFeed { .. } => "unknown_feed",
            ReadError::CreatorFailed { .. } => "creator_failed",
            ReadError::PartitionFailed { .. } => "partition_failed",
            ReadError::PartitionCancelled { .. } => "partition_cancelled",
            ReadError::FeedCancelled { .. } => "feed_cancelled",
            ReadError::Panicked { .. } => "feed_panicked",
            ReadError::Canceled => "read_canceled",
            ReadError::Aggregate { .. } => "aggregate",
        }
    }

    /// Returns a human-readable message which includes the whole cause chain.
    pub fn as_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }

    /// Indicates whether the error is a cancellation rather than a failure of its own.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            ReadError::Canceled
                | ReadError::PartitionCancelled { .. }
                | ReadError::FeedCancelled { .. }
        )
    }

    /// Returns the innermost cause of the error chain (the error itself when it has no source).
    pub fn root_cause(&self) -> &ReadError {
        match self {
            ReadError::CreatorFailed { source, .. } | ReadError::PartitionFailed { source, .. } => {
                source.root_cause()
            }
            ReadError::PartitionCancelled { cause, .. } | ReadError::FeedCancelled { cause, .. } => {
                cause.root_cause()
            }
            ReadError::Aggregate { primary, .. } => primary.root_cause(),
            other => other,
        }
    }
}
