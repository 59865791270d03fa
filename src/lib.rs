//! # feedvisor
//!
//! **Feedvisor** is the orchestration core of a feed-reading connector.
//!
//! A connector describes *what* to read as a set of feeds (single streams, and optionally one
//! global feed sharing state across several streams) and *how* to read it through
//! [`PartitionsCreatorFactory`], [`PartitionsCreator`] and [`PartitionReader`] implementations.
//! The runtime schedules rounds of partition reads, coordinates resource acquisition,
//! applies checkpoints in order, emits state and stream status messages, and reports
//! failures with full context.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ Feed::Stream │   │ Feed::Stream │   │ Feed::Global │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  RootReader (runtime orchestrator)                                │
//! │  - Bus (broadcast events)                                         │
//! │  - ActiveTracker (running feeds and partitions, by sequence)      │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! │  - StreamStatusManager (STARTED / COMPLETE / INCOMPLETE traces)   │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//!     │  FeedReader  │   │  FeedReader  │   │  FeedReader  │   │
//!     │ (round loop) │   │ (round loop) │   │ (round loop) │   │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘   │
//!      │ partitions       │                  │                 │
//!      │ ─► StateScope    │                  │                 │
//!      │ ─► StateManager::emit ─► OutputConsumer               │
//!      ▼                  ▼                  ▼                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │               (capacity: ReaderConfig::bus_capacity)              │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber_listener   │
//!                       │    (in RootReader)     │
//!                       └───┬────────────────┬───┘
//!                           ▼                ▼
//!                    ActiveTracker     SubscriberSet
//!                  (sequence-based)   (per-sub queues)
//! ```
//!
//! ### Round lifecycle
//! ```text
//! round = 1
//! loop {
//!   ├─► first factory returning Some(creator)          (none → FactoryExhausted)
//!   ├─► acquire creator resources, run it, release
//!   ├─► no partition readers → emit state, stream status COMPLETE, exit
//!   ├─► acquire each reader in order, read them concurrently (timeout per read)
//!   ├─► apply checkpoints in creation order as they become contiguous
//!   │     └─ failure at k: cancel readers > k still running
//!   ├─► emit state messages once
//!   └─► failure → stream status INCOMPLETE, exit with error; else round += 1
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                                     |
//! |-------------------|---------------------------------------------------------------|--------------------------------------------------------|
//! | **Reading**       | Read every feed concurrently, in rounds of partitions.        | [`RootReader`], [`ReaderConfig`]                       |
//! | **Partitions**    | Connector extension points.                                   | [`PartitionsCreatorFactory`], [`PartitionReader`]      |
//! | **State**         | Per-feed opaque state, checkpoint message generation.         | [`StateManager`], [`StateQuerier`], [`FeedBootstrap`]  |
//! | **Output**        | Records, state and stream status messages.                    | [`OutputConsumer`], [`StreamRecordConsumer`]           |
//! | **Subscriber API**| Hook into runtime events (logging, metrics, progress).        | [`Subscribe`], [`LogWriter`], [`ActiveTracker`]        |
//! | **Errors**        | Typed errors carrying feed, round and partition context.      | [`ReadError`]                                          |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use serde_json::json;
//! use tokio_util::sync::CancellationToken;
//! use feedvisor::{
//!     BufferingOutputConsumer, FeedBootstrap, Field, PartitionReadCheckpoint, PartitionReader,
//!     PartitionsCreator, PartitionsCreatorFactory, ReadError, ReaderConfig, RootReader,
//!     StateManager, Stream, StreamId, TryAcquireResourcesStatus,
//! };
//!
//! struct OnePage;
//!
//! #[async_trait]
//! impl PartitionReader for OnePage {
//!     fn try_acquire_resources(&mut self) -> Result<TryAcquireResourcesStatus, ReadError> {
//!         Ok(TryAcquireResourcesStatus::ReadyToRun)
//!     }
//!     async fn run(&mut self, _ctx: CancellationToken) -> Result<(), ReadError> {
//!         Ok(())
//!     }
//!     fn release_resources(&mut self) {}
//!     fn checkpoint(&mut self) -> PartitionReadCheckpoint {
//!         PartitionReadCheckpoint::new(json!({"cursor": 1}), 10)
//!     }
//! }
//!
//! struct Pages;
//!
//! #[async_trait]
//! impl PartitionsCreator for Pages {
//!     fn try_acquire_resources(&mut self) -> Result<TryAcquireResourcesStatus, ReadError> {
//!         Ok(TryAcquireResourcesStatus::ReadyToRun)
//!     }
//!     async fn run(&mut self) -> Result<Vec<Box<dyn PartitionReader>>, ReadError> {
//!         Ok(vec![Box::new(OnePage)])
//!     }
//!     fn release_resources(&mut self) {}
//! }
//!
//! struct Factory;
//!
//! impl PartitionsCreatorFactory for Factory {
//!     fn make(&self, bootstrap: &FeedBootstrap) -> Option<Box<dyn PartitionsCreator>> {
//!         // Read once: stop as soon as a state exists.
//!         match bootstrap.current_state() {
//!             None => Some(Box::new(Pages)),
//!             Some(_) => Some(Box::new(Done)),
//!         }
//!     }
//! }
//!
//! struct Done;
//!
//! #[async_trait]
//! impl PartitionsCreator for Done {
//!     fn try_acquire_resources(&mut self) -> Result<TryAcquireResourcesStatus, ReadError> {
//!         Ok(TryAcquireResourcesStatus::ReadyToRun)
//!     }
//!     async fn run(&mut self) -> Result<Vec<Box<dyn PartitionReader>>, ReadError> {
//!         Ok(Vec::new())
//!     }
//!     fn release_resources(&mut self) {}
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), ReadError> {
//!     let users = Stream::new(StreamId::new("users", None), vec![Field::new("id")]);
//!     let state = Arc::new(StateManager::streams(vec![(users, None)]));
//!     let output = Arc::new(BufferingOutputConsumer::new());
//!
//!     let reader = RootReader::new(state, ReaderConfig::default(), output.clone(), vec![Arc::new(Factory)]);
//!     reader.read().await?;
//!
//!     assert_eq!(output.states().len(), 1);
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod feeds;
mod output;
mod partitions;
mod state;
mod status;
mod subscribers;

// ---- Public re-exports ----

pub use config::ReaderConfig;
pub use core::{ResourceCoordinator, RootReader};
pub use error::ReadError;
pub use events::{Bus, Event, EventKind};
pub use feeds::{ConfiguredSyncMode, Feed, Field, Global, Stream, StreamId};
pub use output::{
    BufferingOutputConsumer, CheckpointMessage, FieldValueChange, Message, MetaFieldDecorator,
    NoOpMetaFieldDecorator, OutputConsumer, RecordChange, RecordChangeReason, RecordMessage,
    RecordMeta, RecordMetaChange, StreamRecordConsumer, StreamState, StreamStatus,
    StreamStatusTrace,
};
pub use partitions::{
    FeedBootstrap, PartitionReadCheckpoint, PartitionReader, PartitionsCreator,
    PartitionsCreatorFactory, TryAcquireResourcesStatus,
};
pub use state::{OpaqueStateValue, StateManager, StateQuerier, StateScope};
pub use status::{StatusState, StreamStatusManager};
pub use subscribers::{ActiveTracker, LogWriter, Subscribe, SubscriberSet};
