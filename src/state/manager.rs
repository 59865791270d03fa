use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use crate::feeds::{Feed, Global, Stream, StreamId};
use crate::output::{CheckpointMessage, Message, OutputConsumer, StreamState};
use crate::state::slot::StateSlot;
use crate::state::{OpaqueStateValue, StateQuerier};

/// Handle on the checkpoint slot of one feed.
#[derive(Debug, Clone)]
pub struct StateScope {
    slot: Arc<StateSlot>,
}

impl StateScope {
    /// Last checkpointed state.
    pub fn current(&self) -> Option<OpaqueStateValue> {
        self.slot.current()
    }

    /// Records forward progress: overwrites the pending state and adds `num_records` to the
    /// pending record count. Never blocks on anything but the slot lock.
    pub fn set(&self, state: OpaqueStateValue, num_records: u64) {
        self.slot.set(state, num_records);
    }

    /// Clears the state; the next checkpoint reports the cleared state.
    pub fn reset(&self) {
        self.slot.reset();
    }
}

/// # Per-feed checkpoint accounting for one read.
///
/// Feeds are the global feed (if any) followed by every stream given at construction, in
/// order. Streams which are members of the global feed have their own slot but never produce
/// a standalone stream message: their state is bundled into the global message.
///
/// # Example
/// ```
/// use serde_json::json;
/// use feedvisor::{CheckpointMessage, Feed, Field, StateManager, Stream, StreamId};
///
/// let users = Stream::new(StreamId::new("users", None), vec![Field::new("id")]);
/// let manager = StateManager::streams(vec![(users.clone(), None)]);
///
/// let scope = manager.scoped(&Feed::from(users)).unwrap();
/// scope.set(json!({"cursor": 10}), 3);
///
/// let messages = manager.checkpoint();
/// assert_eq!(messages.len(), 1);
/// assert_eq!(messages[0].num_records(), 3);
/// assert!(manager.checkpoint().is_empty());
/// ```
#[derive(Debug)]
pub struct StateManager {
    feeds: Vec<Feed>,
    global: Option<(Global, Arc<StateSlot>)>,
    streams: HashMap<StreamId, Arc<StateSlot>>,
    standalone: Vec<StreamId>,
    emit_lock: Mutex<()>,
}

impl StateManager {
    /// Creates a manager for stream feeds only.
    pub fn streams(initial_stream_states: Vec<(Stream, Option<OpaqueStateValue>)>) -> Self {
        Self::build(None, initial_stream_states)
    }

    /// Creates a manager for a global feed and stream feeds.
    ///
    /// Members of `global` absent from `initial_stream_states` get an empty slot.
    pub fn with_global(
        global: Global,
        initial_global_state: Option<OpaqueStateValue>,
        initial_stream_states: Vec<(Stream, Option<OpaqueStateValue>)>,
    ) -> Self {
        Self::build(Some((global, initial_global_state)), initial_stream_states)
    }

    fn build(
        global: Option<(Global, Option<OpaqueStateValue>)>,
        initial_stream_states: Vec<(Stream, Option<OpaqueStateValue>)>,
    ) -> Self {
        let mut feeds = Vec::with_capacity(initial_stream_states.len() + 1);
        let global = global.map(|(global, initial)| {
            feeds.push(Feed::Global(global.clone()));
            (global, Arc::new(StateSlot::new(initial)))
        });

        let mut streams = HashMap::with_capacity(initial_stream_states.len());
        let mut standalone = Vec::new();
        for (stream, initial) in initial_stream_states {
            if streams.contains_key(&stream.id) {
                continue;
            }
            let is_member = global
                .as_ref()
                .is_some_and(|(global, _)| global.contains(&stream.id));
            if !is_member {
                standalone.push(stream.id.clone());
            }
            streams.insert(stream.id.clone(), Arc::new(StateSlot::new(initial)));
            feeds.push(Feed::Stream(stream));
        }
        if let Some((global, _)) = &global {
            for stream in &global.streams {
                streams
                    .entry(stream.id.clone())
                    .or_insert_with(|| Arc::new(StateSlot::new(None)));
            }
        }

        Self {
            feeds,
            global,
            streams,
            standalone,
            emit_lock: Mutex::new(()),
        }
    }

    /// All feeds, global feed first.
    pub fn feeds(&self) -> &[Feed] {
        &self.feeds
    }

    /// The global feed, if any.
    pub fn global(&self) -> Option<&Global> {
        self.global.as_ref().map(|(global, _)| global)
    }

    /// Returns the scope of `feed`, `None` if the feed is not tracked.
    pub fn scoped(&self, feed: &Feed) -> Option<StateScope> {
        match feed {
            Feed::Global(global) => self
                .global
                .as_ref()
                .filter(|(own, _)| own == global)
                .map(|(_, slot)| StateScope { slot: slot.clone() }),
            Feed::Stream(stream) => self.stream_scope(&stream.id),
        }
    }

    /// Returns the scope of a stream, including global member streams which are not feeds.
    pub fn stream_scope(&self, stream: &StreamId) -> Option<StateScope> {
        self.streams
            .get(stream)
            .map(|slot| StateScope { slot: slot.clone() })
    }

    /// Swaps every pending state and returns the resulting checkpoint messages.
    ///
    /// - global feed: one message when at least one of its slots (shared or member) was
    ///   pending, carrying the latest state of every member stream;
    /// - standalone streams: one message per stream with pending state.
    ///
    /// Calling it again without intervening `set` returns nothing.
    pub fn checkpoint(&self) -> Vec<CheckpointMessage> {
        let mut messages = Vec::new();
        if let Some(message) = self.global_checkpoint() {
            messages.push(message);
        }
        for id in &self.standalone {
            let Some(slot) = self.streams.get(id) else {
                continue;
            };
            if let Some((state, num_records)) = slot.swap() {
                messages.push(CheckpointMessage::Stream {
                    stream: id.clone(),
                    state: state.unwrap_or(Value::Null),
                    num_records,
                });
            }
        }
        messages
    }

    /// Checkpoints and hands the messages to `output`, returning how many were emitted.
    ///
    /// Concurrent callers are serialized so that messages reach `output` in swap order.
    pub fn emit(&self, output: &dyn OutputConsumer) -> usize {
        let _guard = self.emit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let messages = self.checkpoint();
        let count = messages.len();
        for message in messages {
            output.accept(Message::State(message));
        }
        count
    }

    fn global_checkpoint(&self) -> Option<CheckpointMessage> {
        let (global, shared) = self.global.as_ref()?;
        let (mut swapped, shared_state, mut num_records) = shared.swap_or_current();
        let mut stream_states = Vec::with_capacity(global.streams.len());
        for stream in &global.streams {
            let Some(slot) = self.streams.get(&stream.id) else {
                continue;
            };
            let (stream_swapped, state, stream_records) = slot.swap_or_current();
            swapped |= stream_swapped;
            num_records = num_records.saturating_add(stream_records);
            stream_states.push(StreamState {
                stream: stream.id.clone(),
                state: state.unwrap_or(Value::Null),
            });
        }
        swapped.then(|| CheckpointMessage::Global {
            shared_state: shared_state.unwrap_or(Value::Null),
            stream_states,
            num_records,
        })
    }
}

impl StateQuerier for StateManager {
    fn feeds(&self) -> &[Feed] {
        &self.feeds
    }

    fn current(&self, feed: &Feed) -> Option<OpaqueStateValue> {
        self.scoped(feed)?.current()
    }
}
