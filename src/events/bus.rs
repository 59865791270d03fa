//! # Event bus for runtime events of one read.
//!
//! [`Bus`] wraps a [`tokio::sync::broadcast`] channel. Feed tasks, partition tasks and
//! subscriber workers publish without blocking; the root reader's listener is the single
//! receiver and fans events out to the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ```text
//!   FeedReader (feed 1) ──┐
//!   FeedReader (feed N) ──┼──► Bus ──► listener (RootReader) ──► SubscriberSet
//!   partition tasks     ──┤
//!   RootReader          ──┘
//! ```
//!
//! The ring buffer keeps the last `capacity` events. A listener which falls behind skips the
//! oldest ones and observes `RecvError::Lagged(n)`. Events published while nobody listens
//! are dropped.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events; cheap to clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus with a ring buffer of `capacity` events (min 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event; never blocks, never fails.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver observing events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
