use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::output::{CheckpointMessage, Message, RecordMessage, StreamStatusTrace};

/// Downstream sink for everything a read produces.
///
/// Calls are fire-and-forget: no backpressure is signalled through this interface.
/// Implementations are shared by every feed task and must be internally synchronized.
pub trait OutputConsumer: Send + Sync + 'static {
    fn accept(&self, message: Message);

    /// No more messages will be sent through this handle.
    fn close(&self) {}
}

/// Output consumer which keeps every message in memory, in arrival order.
#[derive(Debug, Default)]
pub struct BufferingOutputConsumer {
    messages: Mutex<Vec<Message>>,
    closed: AtomicBool,
}

impl BufferingOutputConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once `close` was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// All messages received so far.
    pub fn messages(&self) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Checkpoint messages received so far.
    pub fn states(&self) -> Vec<CheckpointMessage> {
        self.filter(|m| match m {
            Message::State(state) => Some(state.clone()),
            _ => None,
        })
    }

    /// Stream status traces received so far.
    pub fn traces(&self) -> Vec<StreamStatusTrace> {
        self.filter(|m| match m {
            Message::Trace(trace) => Some(trace.clone()),
            _ => None,
        })
    }

    /// Records received so far.
    pub fn records(&self) -> Vec<RecordMessage> {
        self.filter(|m| match m {
            Message::Record(record) => Some(record.clone()),
            _ => None,
        })
    }

    fn filter<T>(&self, f: impl Fn(&Message) -> Option<T>) -> Vec<T> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(f)
            .collect()
    }
}

impl OutputConsumer for BufferingOutputConsumer {
    fn accept(&self, message: Message) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
