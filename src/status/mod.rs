//! # Per-stream lifecycle.
//!
//! A stream may be referenced by several feeds (its own stream feed and the global feed it
//! belongs to). [`StreamStatusManager`] aggregates their notifications into one lifecycle per
//! stream:
//!
//! ```text
//! PENDING ──starting──► SUCCESS ──last feed stopped──► DONE   (COMPLETE)
//!                          │
//!                       failure
//!                          ▼
//!                       FAILURE ──last feed stopped──► DONE   (INCOMPLETE)
//! ```
//!
//! STARTED is emitted on the way out of PENDING; completion and failure auto-promote a
//! PENDING stream first so STARTED always precedes COMPLETE/INCOMPLETE.

mod manager;

pub use manager::{StatusState, StreamStatusManager};
