//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and the
//! built-in subscribers wired by the [`RootReader`](crate::RootReader).
//!
//! ```text
//!   FeedReader ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!                                                            │
//!                                           ┌────────────────┼──────────────┐
//!                                           ▼                ▼              ▼
//!                                       LogWriter      ActiveTracker     custom ...
//!                                     (tracing output)  (progress dump)
//! ```
//!
//! - **Passive subscribers** observe and react to events (logging, metrics, alerts).
//! - **Stateful subscribers** maintain internal state from events ([`ActiveTracker`]).

mod active;
mod log;
mod set;
mod subscriber;

pub use active::ActiveTracker;
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;

pub(crate) use set::panic_message;
