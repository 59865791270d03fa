use async_trait::async_trait;

use crate::error::ReadError;
use crate::partitions::{FeedBootstrap, PartitionReader, TryAcquireResourcesStatus};

/// # Produces the partitions of one round of a feed.
///
/// One creator is made per round. The runtime calls
/// [`try_acquire_resources`](PartitionsCreator::try_acquire_resources) until it returns
/// [`TryAcquireResourcesStatus::ReadyToRun`], then [`run`](PartitionsCreator::run) once,
/// then [`release_resources`](PartitionsCreator::release_resources) once.
///
/// An empty partition list means the feed has no more data: the feed completes.
#[async_trait]
pub trait PartitionsCreator: Send + 'static {
    /// Attempts to acquire whatever the creator needs to run.
    ///
    /// Runs under the feed's resource coordinator lock: must be fast and must not block.
    fn try_acquire_resources(&mut self) -> Result<TryAcquireResourcesStatus, ReadError>;

    /// Creates the ordered partition readers of this round.
    async fn run(&mut self) -> Result<Vec<Box<dyn PartitionReader>>, ReadError>;

    /// Releases the resources acquired by a successful acquisition.
    fn release_resources(&mut self);
}

/// # Makes partitions creators for feeds.
///
/// Factories are tried in their configured order until one returns `Some`.
/// The [`FeedBootstrap`] exposes the current state of every feed, so a factory may
/// synchronize its work with other feeds.
///
/// # Example
/// ```
/// use feedvisor::{FeedBootstrap, PartitionsCreator, PartitionsCreatorFactory};
///
/// struct GlobalOnly;
///
/// impl PartitionsCreatorFactory for GlobalOnly {
///     fn make(&self, bootstrap: &FeedBootstrap) -> Option<Box<dyn PartitionsCreator>> {
///         if !bootstrap.feed().is_global() {
///             return None;
///         }
///         // build the creator for the change feed here...
///         None
///     }
/// }
/// ```
pub trait PartitionsCreatorFactory: Send + Sync + 'static {
    fn make(&self, bootstrap: &FeedBootstrap) -> Option<Box<dyn PartitionsCreator>>;
}
