//! # RootReader: supervises one task per feed.
//!
//! ```text
//! read_with_cancellation(token):
//!   ├─► Bus + listener task ─► SubscriberSet { ActiveTracker, LogWriter, custom ... }
//!   ├─► progress task (optional) ─► logs ActiveTracker::snapshot() every interval
//!   ├─► spawn one task per feed ─► FeedReader::read(child token)
//!   │        └─► outcome captured, never propagated early
//!   ├─► join every stream feed task
//!   ├─► for each unfinished global feed with failed member streams:
//!   │        set the aggregated cause, cancel its token
//!   ├─► join every global feed task
//!   ├─► stop progress task, drain subscribers
//!   └─► errors? ─► Err(first, others suppressed) : Ok(())
//! ```
//!
//! ## Stream status on feed exit
//! - `Ok`                                → reported complete by the feed reader itself
//! - `Canceled` with a cause (global)    → `notify_stopped`, error becomes `FeedCancelled`
//! - any other error, or a panic         → `notify_failure`
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use feedvisor::{
//!     BufferingOutputConsumer, FeedBootstrap, PartitionsCreator, PartitionsCreatorFactory,
//!     ReaderConfig, RootReader, StateManager,
//! };
//!
//! struct NoFactory;
//!
//! impl PartitionsCreatorFactory for NoFactory {
//!     fn make(&self, _bootstrap: &FeedBootstrap) -> Option<Box<dyn PartitionsCreator>> {
//!         None
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let reader = RootReader::new(
//!         Arc::new(StateManager::streams(Vec::new())),
//!         ReaderConfig::default(),
//!         Arc::new(BufferingOutputConsumer::new()),
//!         vec![Arc::new(NoFactory)],
//!     );
//!     // No feeds: nothing to read.
//!     assert!(reader.read().await.is_ok());
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ReaderConfig;
use crate::core::feed_reader::{FeedReader, ReadContext};
use crate::error::ReadError;
use crate::events::{Bus, Event, EventKind};
use crate::feeds::{Feed, StreamId};
use crate::output::{MetaFieldDecorator, NoOpMetaFieldDecorator, OutputConsumer};
use crate::partitions::PartitionsCreatorFactory;
use crate::state::StateManager;
use crate::status::StreamStatusManager;
use crate::subscribers::{panic_message, ActiveTracker, LogWriter, Subscribe, SubscriberSet};

/// A spawned feed task.
struct FeedTask {
    feed: Feed,
    token: CancellationToken,
    cause: Arc<OnceLock<ReadError>>,
    handle: JoinHandle<Result<(), ReadError>>,
}

/// Reads every feed of a [`StateManager`] concurrently.
pub struct RootReader {
    state_manager: Arc<StateManager>,
    config: ReaderConfig,
    output: Arc<dyn OutputConsumer>,
    factories: Vec<Arc<dyn PartitionsCreatorFactory>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    decorator: Arc<dyn MetaFieldDecorator>,
    active: Arc<ActiveTracker>,
}

impl RootReader {
    /// Creates a reader; `factories` are tried in order for each round of each feed.
    pub fn new(
        state_manager: Arc<StateManager>,
        config: ReaderConfig,
        output: Arc<dyn OutputConsumer>,
        factories: Vec<Arc<dyn PartitionsCreatorFactory>>,
    ) -> Self {
        Self {
            state_manager,
            config,
            output,
            factories,
            subscribers: Vec::new(),
            decorator: Arc::new(NoOpMetaFieldDecorator),
            active: Arc::new(ActiveTracker::new()),
        }
    }

    /// Adds event subscribers next to the built-in `ActiveTracker` and `LogWriter`.
    #[must_use]
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers.extend(subscribers);
        self
    }

    /// Sets the decorator handed to every [`FeedBootstrap`](crate::FeedBootstrap).
    #[must_use]
    pub fn with_meta_field_decorator(mut self, decorator: Arc<dyn MetaFieldDecorator>) -> Self {
        self.decorator = decorator;
        self
    }

    /// Tracker of the feeds and partition reads currently running.
    pub fn active(&self) -> &Arc<ActiveTracker> {
        &self.active
    }

    /// The state manager the feeds are read from.
    pub fn state_manager(&self) -> &Arc<StateManager> {
        &self.state_manager
    }

    /// Reads every feed to completion.
    pub async fn read(&self) -> Result<(), ReadError> {
        self.read_with_cancellation(CancellationToken::new()).await
    }

    /// Reads every feed to completion or until `token` is cancelled.
    ///
    /// Returns only once every feed task has been joined. Feed errors are combined with
    /// [`ReadError::aggregate`]: stream feeds first, then global feeds, each in feed order.
    /// When `token` was cancelled and no feed failed on its own, the result is
    /// [`ReadError::Canceled`].
    pub async fn read_with_cancellation(&self, token: CancellationToken) -> Result<(), ReadError> {
        let bus = Bus::new(self.config.bus_capacity_clamped());
        let stop = CancellationToken::new();
        let listener = self.subscriber_listener(&bus, stop.clone());
        let progress = self.progress_reporter(stop.clone());

        let feeds = self.state_manager.feeds().to_vec();
        let ctx = Arc::new(ReadContext {
            config: self.config.clone(),
            bus: bus.clone(),
            state_manager: self.state_manager.clone(),
            status: StreamStatusManager::new(&feeds, self.output.clone()),
            output: self.output.clone(),
            factories: self.factories.clone(),
            decorator: self.decorator.clone(),
        });

        bus.publish(Event::new(EventKind::ReadStarting).with_count(feeds.len()));
        let errors = self.run_feeds(&ctx, feeds, &token).await;
        let failed = errors.len();
        let outcome = if token.is_cancelled()
            && !errors.is_empty()
            && errors.iter().all(ReadError::is_cancellation)
        {
            Some(ReadError::Canceled)
        } else {
            ReadError::aggregate(errors)
        };
        let result = match outcome {
            None => {
                bus.publish(Event::new(EventKind::ReadCompleted));
                Ok(())
            }
            Some(err) => {
                bus.publish(
                    Event::new(EventKind::ReadFailed)
                        .with_count(failed)
                        .with_reason(err.as_message()),
                );
                Err(err)
            }
        };

        stop.cancel();
        if let Some(progress) = progress {
            let _ = progress.await;
        }
        let _ = listener.await;
        result
    }

    async fn run_feeds(
        &self,
        ctx: &Arc<ReadContext>,
        feeds: Vec<Feed>,
        token: &CancellationToken,
    ) -> Vec<ReadError> {
        let (globals, streams): (Vec<FeedTask>, Vec<FeedTask>) = feeds
            .into_iter()
            .map(|feed| spawn_feed(ctx, feed, token))
            .partition(|task| task.feed.is_global());

        let mut errors = Vec::new();
        let mut stream_errors: HashMap<StreamId, ReadError> = HashMap::new();
        for task in streams {
            let id = task.feed.as_stream().map(|stream| stream.id.clone());
            if let Err(e) = join_feed(ctx, task).await {
                if let Some(id) = id {
                    stream_errors.insert(id, e.clone());
                }
                errors.push(e);
            }
        }

        for task in &globals {
            if task.handle.is_finished() {
                continue;
            }
            let member_errors = task
                .feed
                .streams()
                .iter()
                .filter_map(|stream| stream_errors.get(&stream.id).cloned());
            if let Some(cause) = ReadError::aggregate(member_errors) {
                let _ = task.cause.set(cause);
                task.token.cancel();
            }
        }

        for task in globals {
            if let Err(e) = join_feed(ctx, task).await {
                errors.push(e);
            }
        }
        errors
    }

    /// Forwards bus events to the subscriber set until `stop`, then drains what is left.
    fn subscriber_listener(&self, bus: &Bus, stop: CancellationToken) -> JoinHandle<()> {
        let active: Arc<dyn Subscribe> = self.active.clone();
        let mut subscribers: Vec<Arc<dyn Subscribe>> = vec![active, Arc::new(LogWriter::new())];
        subscribers.extend(self.subscribers.iter().cloned());
        let set = SubscriberSet::new(subscribers, bus.clone());
        debug!(subscribers = set.len(), "event listener started");
        let mut rx = bus.subscribe();

        tokio::spawn(async move {
            loop {
                select! {
                    biased;
                    res = rx.recv() => match res {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "event listener lagged");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = stop.cancelled() => break,
                }
            }
            loop {
                match rx.try_recv() {
                    Ok(ev) => set.emit(&ev),
                    Err(TryRecvError::Lagged(skipped)) => {
                        warn!(skipped, "event listener lagged");
                    }
                    Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                }
            }
            set.shutdown().await;
        })
    }

    /// Periodically logs the active feeds and partition reads.
    fn progress_reporter(&self, stop: CancellationToken) -> Option<JoinHandle<()>> {
        let period = self.config.progress_period()?;
        let active = self.active.clone();
        Some(tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.tick().await;
            loop {
                select! {
                    _ = ticker.tick() => {
                        let snapshot = active.snapshot().await;
                        info!(
                            active = snapshot.len(),
                            tasks = %snapshot.join(", "),
                            "read in progress"
                        );
                    }
                    _ = stop.cancelled() => break,
                }
            }
        }))
    }
}

fn spawn_feed(ctx: &Arc<ReadContext>, feed: Feed, token: &CancellationToken) -> FeedTask {
    let token = token.child_token();
    let cause = Arc::new(OnceLock::new());
    let handle = tokio::spawn(run_feed(
        ctx.clone(),
        feed.clone(),
        token.clone(),
        cause.clone(),
    ));
    FeedTask {
        feed,
        token,
        cause,
        handle,
    }
}

async fn run_feed(
    ctx: Arc<ReadContext>,
    feed: Feed,
    token: CancellationToken,
    cause: Arc<OnceLock<ReadError>>,
) -> Result<(), ReadError> {
    let label = feed.label();
    ctx.bus
        .publish(Event::new(EventKind::FeedStarting).with_feed(label.as_str()));

    match FeedReader::new(ctx.clone(), feed.clone()).read(token).await {
        Ok(()) => Ok(()),
        Err(ReadError::Canceled) if cause.get().is_some() => {
            let cause = cause.get().cloned().unwrap_or(ReadError::Canceled);
            ctx.status.notify_stopped(&feed);
            let err = ReadError::FeedCancelled {
                feed: label.clone(),
                cause: Arc::new(cause),
            };
            ctx.bus.publish(
                Event::new(EventKind::FeedCancelled)
                    .with_feed(label.as_str())
                    .with_reason(err.as_message()),
            );
            Err(err)
        }
        Err(err) => {
            ctx.status.notify_failure(&feed);
            ctx.bus.publish(
                Event::new(EventKind::FeedFailed)
                    .with_feed(label.as_str())
                    .with_reason(err.as_message()),
            );
            Err(err)
        }
    }
}

async fn join_feed(ctx: &ReadContext, task: FeedTask) -> Result<(), ReadError> {
    match task.handle.await {
        Ok(res) => res,
        Err(join_err) => {
            let label = task.feed.label();
            let message = if join_err.is_panic() {
                panic_message(join_err.into_panic().as_ref())
            } else {
                join_err.to_string()
            };
            ctx.status.notify_failure(&task.feed);
            ctx.bus.publish(
                Event::new(EventKind::FeedFailed)
                    .with_feed(label.as_str())
                    .with_reason(message.as_str()),
            );
            Err(ReadError::Panicked {
                feed: label,
                message,
            })
        }
    }
}
