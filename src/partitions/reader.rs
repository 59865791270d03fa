use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::ReadError;
use crate::partitions::TryAcquireResourcesStatus;
use crate::state::OpaqueStateValue;

/// Forward progress made by one partition read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionReadCheckpoint {
    /// Connector-defined state to resume from.
    pub opaque_state: OpaqueStateValue,
    /// Number of records emitted since the read started.
    pub num_records: u64,
}

impl PartitionReadCheckpoint {
    pub fn new(opaque_state: OpaqueStateValue, num_records: u64) -> Self {
        Self {
            opaque_state,
            num_records,
        }
    }
}

/// # Reads one partition.
///
/// Lifecycle, driven by the feed reader:
/// 1. [`try_acquire_resources`](PartitionReader::try_acquire_resources) until `ReadyToRun`
/// 2. [`run`](PartitionReader::run) once, possibly interrupted by the read timeout
/// 3. [`release_resources`](PartitionReader::release_resources) once, however `run` ended
/// 4. [`checkpoint`](PartitionReader::checkpoint) once, only if `run` finished or timed out
///
/// When `run` is interrupted by the timeout its future is dropped: every bit of progress
/// made so far must already be reflected in the state returned by `checkpoint`.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use serde_json::json;
/// use tokio_util::sync::CancellationToken;
/// use feedvisor::{PartitionReadCheckpoint, PartitionReader, ReadError, TryAcquireResourcesStatus};
///
/// struct Range { next: u64, end: u64 }
///
/// #[async_trait]
/// impl PartitionReader for Range {
///     fn try_acquire_resources(&mut self) -> Result<TryAcquireResourcesStatus, ReadError> {
///         Ok(TryAcquireResourcesStatus::ReadyToRun)
///     }
///
///     async fn run(&mut self, ctx: CancellationToken) -> Result<(), ReadError> {
///         while self.next < self.end && !ctx.is_cancelled() {
///             // emit record `self.next`...
///             self.next += 1;
///         }
///         Ok(())
///     }
///
///     fn release_resources(&mut self) {}
///
///     fn checkpoint(&mut self) -> PartitionReadCheckpoint {
///         PartitionReadCheckpoint::new(json!({ "next": self.next }), self.next)
///     }
/// }
/// ```
#[async_trait]
pub trait PartitionReader: Send + 'static {
    /// Attempts to acquire whatever the reader needs to run.
    ///
    /// Runs under the feed's resource coordinator lock: must be fast and must not block.
    fn try_acquire_resources(&mut self) -> Result<TryAcquireResourcesStatus, ReadError>;

    /// Reads the partition.
    ///
    /// `ctx` is cancelled when the read times out or when the read is cancelled.
    async fn run(&mut self, ctx: CancellationToken) -> Result<(), ReadError>;

    /// Releases the resources acquired by a successful acquisition.
    fn release_resources(&mut self);

    /// Reports the progress made by [`run`](PartitionReader::run).
    fn checkpoint(&mut self) -> PartitionReadCheckpoint;

    /// Readers returning `true` are never interrupted by the read timeout.
    fn is_unlimited_time(&self) -> bool {
        false
    }
}
