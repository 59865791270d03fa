//! # FeedReader: round scheduler of one feed.
//!
//! ```text
//! round = 1
//! loop {
//!   ├─► factories ─► PartitionsCreator            (none → FactoryExhausted)
//!   ├─► acquire creator resources (coordinator)
//!   ├─► round 1: notify stream status "starting"
//!   ├─► creator.run() ─► [r1 … rN] ─► release
//!   │     └─► N = 0: emit checkpoint, notify "complete", return Ok
//!   ├─► spawn N partition tasks (chained acquisition, concurrent reads)
//!   ├─► fan-in completions; apply checkpoints in index order
//!   │     └─► first failure at k: cancel every unfinished task > k
//!   ├─► emit checkpoint (always, once per round)
//!   ├─► failure → return the lowest-index error
//!   └─► round += 1
//! }
//! ```
//!
//! ## Rules
//! - Checkpoints are applied to the feed scope strictly in partition order.
//! - A failure cancels only later partitions of the same round.
//! - Cancelled partitions are recorded without waiting for their task to end.
//! - Checkpoint emission happens from this single call site for the feed.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::select;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::ReaderConfig;
use crate::core::coordinator::ResourceCoordinator;
use crate::core::runner::{run_partition, PartitionRun};
use crate::error::ReadError;
use crate::events::{Bus, Event, EventKind};
use crate::feeds::Feed;
use crate::output::{MetaFieldDecorator, OutputConsumer};
use crate::partitions::{
    FeedBootstrap, PartitionReadCheckpoint, PartitionReader, PartitionsCreator,
    PartitionsCreatorFactory,
};
use crate::state::{StateManager, StateScope};
use crate::status::StreamStatusManager;
use crate::subscribers::panic_message;

/// Collaborators shared by every feed task of a read.
pub(crate) struct ReadContext {
    pub(crate) config: ReaderConfig,
    pub(crate) bus: Bus,
    pub(crate) state_manager: Arc<StateManager>,
    pub(crate) status: StreamStatusManager,
    pub(crate) output: Arc<dyn OutputConsumer>,
    pub(crate) factories: Vec<Arc<dyn PartitionsCreatorFactory>>,
    pub(crate) decorator: Arc<dyn MetaFieldDecorator>,
}

type PartitionResult = Result<PartitionReadCheckpoint, ReadError>;

/// Drives successive rounds of one feed until it runs out of partitions or fails.
pub(crate) struct FeedReader {
    ctx: Arc<ReadContext>,
    feed: Feed,
    label: Arc<str>,
    coordinator: ResourceCoordinator,
}

impl FeedReader {
    pub(crate) fn new(ctx: Arc<ReadContext>, feed: Feed) -> Self {
        let label = Arc::from(feed.label());
        Self {
            ctx,
            feed,
            label,
            coordinator: ResourceCoordinator::new(),
        }
    }

    /// Runs rounds until completion; returns the first fatal error.
    pub(crate) async fn read(self, token: CancellationToken) -> Result<(), ReadError> {
        let scope = self
            .ctx
            .state_manager
            .scoped(&self.feed)
            .ok_or_else(|| ReadError::UnknownFeed {
                feed: self.label.to_string(),
            })?;

        let mut round: u64 = 1;
        loop {
            let creator = self.make_creator()?;
            let readers = self.create_partitions(creator, round, &token).await?;
            if readers.is_empty() {
                self.emit_checkpoint(round);
                self.ctx.status.notify_complete(&self.feed);
                self.ctx.bus.publish(
                    Event::new(EventKind::FeedCompleted)
                        .with_feed(self.label.clone())
                        .with_round(round),
                );
                return Ok(());
            }

            let res = self.read_partitions(&scope, round, readers, &token).await;
            self.emit_checkpoint(round);
            res?;
            round += 1;
        }
    }

    fn make_creator(&self) -> Result<Box<dyn PartitionsCreator>, ReadError> {
        let bootstrap = FeedBootstrap::new(
            self.ctx.state_manager.clone(),
            self.feed.clone(),
            self.ctx.output.clone(),
        )
        .with_meta_field_decorator(self.ctx.decorator.clone());
        self.ctx
            .factories
            .iter()
            .find_map(|factory| factory.make(&bootstrap))
            .ok_or_else(|| ReadError::FactoryExhausted {
                feed: self.label.to_string(),
            })
    }

    async fn create_partitions(
        &self,
        mut creator: Box<dyn PartitionsCreator>,
        round: u64,
        token: &CancellationToken,
    ) -> Result<Vec<Box<dyn PartitionReader>>, ReadError> {
        let wrap = |source: ReadError| ReadError::CreatorFailed {
            feed: self.label.to_string(),
            round,
            source: Arc::new(source),
        };

        match self
            .coordinator
            .acquire(
                || creator.try_acquire_resources(),
                self.ctx.config.heartbeat_clamped(),
                token,
                || self.publish_round(EventKind::ResourcesUnavailable, round),
            )
            .await
        {
            Ok(()) => {}
            Err(ReadError::Canceled) if token.is_cancelled() => return Err(ReadError::Canceled),
            Err(e) => return Err(wrap(e)),
        }

        if round == 1 {
            self.ctx.status.notify_starting(&self.feed);
        }
        self.publish_round(EventKind::CreatorStarting, round);

        let res = select! {
            res = creator.run() => res.map_err(wrap),
            _ = token.cancelled() => Err(ReadError::Canceled),
        };
        creator.release_resources();
        self.coordinator.notify_availability();

        let readers = res?;
        self.ctx.bus.publish(
            Event::new(EventKind::PartitionsCreated)
                .with_feed(self.label.clone())
                .with_round(round)
                .with_count(readers.len()),
        );
        Ok(readers)
    }

    async fn read_partitions(
        &self,
        scope: &StateScope,
        round: u64,
        readers: Vec<Box<dyn PartitionReader>>,
        token: &CancellationToken,
    ) -> Result<(), ReadError> {
        let n = readers.len();
        let mut tokens = Vec::with_capacity(n);
        let mut tasks = FuturesUnordered::new();
        let mut previous: Option<oneshot::Receiver<()>> = None;

        for (index, reader) in readers.into_iter().enumerate() {
            let child = token.child_token();
            let (acquired, next) = oneshot::channel();
            let run = PartitionRun {
                bus: self.ctx.bus.clone(),
                coordinator: self.coordinator.clone(),
                feed: self.label.clone(),
                round,
                partition: index + 1,
                heartbeat: self.ctx.config.heartbeat_clamped(),
                timeout: self.ctx.config.partition_timeout(),
            };
            let handle = tokio::spawn(run_partition(
                run,
                reader,
                child.clone(),
                previous.take(),
                acquired,
            ));
            tasks.push(async move { (index, handle.await) });
            tokens.push(child);
            previous = Some(next);
        }

        let mut results: Vec<Option<PartitionResult>> = (0..n).map(|_| None).collect();
        let mut pending_apply = 0;
        let mut recorded = 0;

        while recorded < n {
            let Some((index, joined)) = tasks.next().await else {
                break;
            };
            if results[index].is_some() {
                continue;
            }
            let result = match joined {
                Ok(result) => result,
                Err(join_err) => Err(ReadError::Panicked {
                    feed: self.label.to_string(),
                    message: if join_err.is_panic() {
                        panic_message(join_err.into_panic().as_ref())
                    } else {
                        join_err.to_string()
                    },
                }),
            };
            let result = result.map_err(|e| match e {
                ReadError::Canceled if token.is_cancelled() => ReadError::Canceled,
                e => ReadError::PartitionFailed {
                    feed: self.label.to_string(),
                    round,
                    partition: index + 1,
                    source: Arc::new(e),
                },
            });

            if let Err(failure) = &result {
                let cause = Arc::new(failure.clone());
                for later in index + 1..n {
                    if results[later].is_some() {
                        continue;
                    }
                    tokens[later].cancel();
                    results[later] = Some(Err(ReadError::PartitionCancelled {
                        feed: self.label.to_string(),
                        round,
                        partition: later + 1,
                        cause: cause.clone(),
                    }));
                    recorded += 1;
                }
            }
            results[index] = Some(result);
            recorded += 1;

            while let Some(Some(Ok(checkpoint))) = results.get(pending_apply) {
                scope.set(checkpoint.opaque_state.clone(), checkpoint.num_records);
                self.ctx.bus.publish(
                    Event::new(EventKind::CheckpointApplied)
                        .with_feed(self.label.clone())
                        .with_round(round)
                        .with_partition(pending_apply + 1)
                        .with_records(checkpoint.num_records),
                );
                pending_apply += 1;
            }
        }

        let failure = results.into_iter().flatten().find_map(Result::err);
        match failure {
            None => Ok(()),
            Some(e) if token.is_cancelled() && e.is_cancellation() => Err(ReadError::Canceled),
            Some(e) => Err(e),
        }
    }

    fn emit_checkpoint(&self, round: u64) {
        let count = self.ctx.state_manager.emit(self.ctx.output.as_ref());
        if count > 0 {
            self.ctx.bus.publish(
                Event::new(EventKind::CheckpointEmitted)
                    .with_feed(self.label.clone())
                    .with_round(round)
                    .with_count(count),
            );
        }
    }

    fn publish_round(&self, kind: EventKind, round: u64) {
        self.ctx.bus.publish(
            Event::new(kind)
                .with_feed(self.label.clone())
                .with_round(round),
        );
    }
}
