//! # Checkpoint accounting.
//!
//! The [`StateManager`] owns one checkpoint slot per feed (and per member stream of a global
//! feed). Each slot separates the state already emitted downstream (`current`) from the
//! progress made since (`pending`):
//!
//! ```text
//! StateScope::set(state, n) ──► pending = state, pending_num_records += n
//!                                     │
//! StateManager::checkpoint() ─────────┴─► current = pending, pending_num_records = 0
//!                                         └─► CheckpointMessage
//! ```
//!
//! Slots are independently locked; [`StateScope`] handles are cheap to clone and are handed
//! to the feed readers.

mod manager;
mod slot;

pub use manager::{StateManager, StateScope};

use crate::feeds::Feed;

/// Connector-defined checkpoint payload. Never interpreted by the runtime.
pub type OpaqueStateValue = serde_json::Value;

/// Read-only view over the last checkpointed state of every feed.
///
/// Given to partitions creator factories so they can look at feeds other than their own.
pub trait StateQuerier {
    /// All feeds of the read, global feed first.
    fn feeds(&self) -> &[Feed];

    /// Last checkpointed state of `feed`, `None` if it has none or is unknown.
    fn current(&self, feed: &Feed) -> Option<OpaqueStateValue>;
}
