use std::collections::HashMap;
use std::sync::Arc;

use crate::feeds::{ConfiguredSyncMode, Feed, Global, Stream, StreamId};
use crate::output::{
    MetaFieldDecorator, NoOpMetaFieldDecorator, OutputConsumer, StreamRecordConsumer,
};
use crate::state::{OpaqueStateValue, StateManager, StateQuerier};

/// # Input of a [`PartitionsCreatorFactory`](crate::PartitionsCreatorFactory).
///
/// Packages the feed to create partitions for with the state of every feed of the read and
/// the output the records of this feed go to.
#[derive(Clone)]
pub struct FeedBootstrap {
    state_manager: Arc<StateManager>,
    feed: Feed,
    output: Arc<dyn OutputConsumer>,
    decorator: Arc<dyn MetaFieldDecorator>,
}

impl FeedBootstrap {
    pub fn new(state_manager: Arc<StateManager>, feed: Feed, output: Arc<dyn OutputConsumer>) -> Self {
        Self {
            state_manager,
            feed,
            output,
            decorator: Arc::new(NoOpMetaFieldDecorator),
        }
    }

    /// Sets the decorator applied to the records of this feed's streams.
    #[must_use]
    pub fn with_meta_field_decorator(mut self, decorator: Arc<dyn MetaFieldDecorator>) -> Self {
        self.decorator = decorator;
        self
    }

    /// The feed partitions are created for.
    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    /// Every feed of the read.
    pub fn feeds(&self) -> &[Feed] {
        self.state_manager.feeds()
    }

    /// Last checkpointed state of this feed.
    pub fn current_state(&self) -> Option<OpaqueStateValue> {
        self.current_state_of(&self.feed)
    }

    /// Last checkpointed state of any feed.
    pub fn current_state_of(&self, feed: &Feed) -> Option<OpaqueStateValue> {
        self.state_manager.current(feed)
    }

    /// Resets the state of this feed and of each of its streams.
    pub fn reset_all(&self) {
        if let Some(scope) = self.state_manager.scoped(&self.feed) {
            scope.reset();
        }
        for stream in self.feed.streams() {
            if let Some(scope) = self.state_manager.stream_scope(&stream.id) {
                scope.reset();
            }
        }
    }

    /// One record consumer per stream of this feed.
    ///
    /// Records are decorated with meta fields when this feed is a stream that also belongs
    /// to the global feed, using the global's current state, or when the stream is read
    /// incrementally on the source's global cursor outside of any global feed.
    pub fn stream_record_consumers(&self) -> HashMap<StreamId, StreamRecordConsumer> {
        self.feed
            .streams()
            .iter()
            .map(|stream| (stream.id.clone(), self.record_consumer(stream)))
            .collect()
    }

    fn record_consumer(&self, stream: &Stream) -> StreamRecordConsumer {
        let consumer = StreamRecordConsumer::new(stream.clone(), self.output.clone());
        let preceding_global = self.preceding_global(stream);
        let decorate = (!self.feed.is_global() && preceding_global.is_some())
            || (preceding_global.is_none() && self.is_global_cursor_stream(stream));
        if !decorate {
            return consumer;
        }
        let global_state = preceding_global
            .and_then(|global| self.state_manager.current(&Feed::Global(global.clone())));
        consumer.decorated(self.decorator.as_ref(), global_state.as_ref())
    }

    fn preceding_global(&self, stream: &Stream) -> Option<&Global> {
        self.state_manager
            .global()
            .filter(|global| global.contains(&stream.id))
    }

    /// Incremental on the global cursor, which is not a field of the stream itself.
    fn is_global_cursor_stream(&self, stream: &Stream) -> bool {
        let Some(cursor) = self.decorator.global_cursor() else {
            return false;
        };
        stream.configured_sync_mode == ConfiguredSyncMode::Incremental
            && stream.schema.iter().all(|field| field.id != cursor.id)
            && stream
                .configured_cursor
                .as_ref()
                .is_some_and(|configured| configured.id == cursor.id)
    }
}

impl StateQuerier for FeedBootstrap {
    fn feeds(&self) -> &[Feed] {
        self.state_manager.feeds()
    }

    fn current(&self, feed: &Feed) -> Option<OpaqueStateValue> {
        self.current_state_of(feed)
    }
}
