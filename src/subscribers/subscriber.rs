//! # Event subscriber trait.
//!
//! [`Subscribe`] is the extension point for observing a read: plug custom handlers into the
//! [`RootReader`](crate::RootReader) with `with_subscribers`.
//!
//! Each subscriber gets a dedicated worker task fed by its own bounded queue
//! (capacity via [`Subscribe::queue_capacity`]). Panics in `on_event` are caught and
//! reported as `EventKind::SubscriberPanicked`.
//!
//! ```text
//! SubscriberSet ──► [bounded queue] ──► worker task ──► subscriber.on_event()
//!                                    └─► panic caught → EventKind::SubscriberPanicked
//! ```
//!
//! A full queue drops the event for that subscriber only and publishes
//! `EventKind::SubscriberOverflow`. Events are processed in FIFO order per subscriber.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use feedvisor::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct RecordCounter(AtomicU64);
//!
//! #[async_trait]
//! impl Subscribe for RecordCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::CheckpointApplied) {
//!             self.0.fetch_add(ev.records.unwrap_or(0), Ordering::Relaxed);
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "record-counter" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber for runtime observability.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
/// - Slow processing affects only this subscriber's queue.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event, from the subscriber's worker task.
    async fn on_event(&self, event: &Event);

    /// Name used in logs and in overflow/panic events.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue capacity for this subscriber (clamped to a minimum of 1).
    ///
    /// Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
