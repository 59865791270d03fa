//! # Connector-facing partition contracts.
//!
//! This module provides the units of work a connector plugs into the runtime:
//! - [`PartitionsCreatorFactory`] - picks a creator for a feed, given a [`FeedBootstrap`]
//! - [`PartitionsCreator`] - produces the ordered partitions of one round
//! - [`PartitionReader`] - reads one partition and reports a [`PartitionReadCheckpoint`]
//!
//! Creators and readers share a two-phase protocol:
//!
//! ```text
//! try_acquire_resources() ──► RetryLater ──► (wait for availability or heartbeat) ──┐
//!        ▲                                                                          │
//!        └──────────────────────────────────────────────────────────────────────────┘
//!        │
//!        └─► ReadyToRun ──► run() ──► release_resources()   (exactly once)
//!                                 └─► checkpoint()          (readers only, after run or timeout)
//! ```

mod bootstrap;
mod creator;
mod reader;

pub use bootstrap::FeedBootstrap;
pub use creator::{PartitionsCreator, PartitionsCreatorFactory};
pub use reader::{PartitionReadCheckpoint, PartitionReader};

/// Outcome of a resource acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryAcquireResourcesStatus {
    /// Resources are held; `run()` may be called.
    ReadyToRun,
    /// Resources are not available yet; try again later.
    RetryLater,
}
