//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the root reader, the feed
//! readers and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `RootReader`, `FeedReader`, `run_partition`,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the root reader's subscriber listener (fans out to `SubscriberSet`,
//!   which includes the `ActiveTracker` and the `LogWriter`).
//!
//! See `core/mod.rs` for the system-level wiring diagram.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
