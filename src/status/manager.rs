use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::feeds::{Feed, StreamId};
use crate::output::{Message, OutputConsumer, StreamStatus, StreamStatusTrace};

/// Lifecycle state of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusState {
    /// No referencing feed has started.
    #[default]
    Pending,
    /// Started, no referencing feed failed so far.
    Success,
    /// Started, at least one referencing feed failed.
    Failure,
    /// Every referencing feed stopped; the final trace was emitted.
    Done,
}

#[derive(Debug, Default)]
struct StatusRecord {
    referencing: HashSet<Feed>,
    state: StatusState,
    stopped: HashSet<Feed>,
    /// At least one referencing feed completed on its own.
    completed: bool,
}

#[derive(Debug, Clone, Copy)]
enum Stop {
    Complete,
    Failure,
    Cancelled,
}

/// # Stream status state machine shared by every feed task.
///
/// One record per stream identifier, built from the full feed list. Every notification is
/// idempotent and the outcome does not depend on which referencing feed reports first.
/// Traces are emitted under the stream's lock.
pub struct StreamStatusManager {
    records: HashMap<StreamId, Mutex<StatusRecord>>,
    output: Arc<dyn OutputConsumer>,
}

impl StreamStatusManager {
    pub fn new(feeds: &[Feed], output: Arc<dyn OutputConsumer>) -> Self {
        let mut records: HashMap<StreamId, StatusRecord> = HashMap::new();
        for feed in feeds {
            for stream in feed.streams() {
                records
                    .entry(stream.id.clone())
                    .or_default()
                    .referencing
                    .insert(feed.clone());
            }
        }
        Self {
            records: records
                .into_iter()
                .map(|(id, record)| (id, Mutex::new(record)))
                .collect(),
            output,
        }
    }

    /// `feed` is about to read its first partitions.
    pub fn notify_starting(&self, feed: &Feed) {
        self.for_each_stream(feed, |id, record| self.start(id, record));
    }

    /// `feed` finished without error.
    pub fn notify_complete(&self, feed: &Feed) {
        self.stop(feed, Stop::Complete);
    }

    /// `feed` failed.
    pub fn notify_failure(&self, feed: &Feed) {
        self.stop(feed, Stop::Failure);
    }

    /// `feed` stopped without an outcome of its own (cancelled because another feed failed).
    ///
    /// A stream whose referencing feeds all stopped this way ends incomplete.
    pub fn notify_stopped(&self, feed: &Feed) {
        self.stop(feed, Stop::Cancelled);
    }

    /// Current state of a stream, `None` if no feed references it.
    pub fn state_of(&self, stream: &StreamId) -> Option<StatusState> {
        self.records.get(stream).map(|record| {
            record
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .state
        })
    }

    fn stop(&self, feed: &Feed, stop: Stop) {
        self.for_each_stream(feed, |id, record| {
            self.start(id, record);
            match stop {
                Stop::Failure if record.state == StatusState::Success => {
                    record.state = StatusState::Failure;
                }
                Stop::Complete => record.completed = true,
                _ => {}
            }
            record.stopped.insert(feed.clone());
            if !record.referencing.is_subset(&record.stopped) {
                return;
            }
            let status = match record.state {
                StatusState::Success if record.completed => StreamStatus::Complete,
                StatusState::Success | StatusState::Failure => StreamStatus::Incomplete,
                StatusState::Pending | StatusState::Done => return,
            };
            record.state = StatusState::Done;
            self.emit(id, status);
        });
    }

    fn start(&self, id: &StreamId, record: &mut StatusRecord) {
        if record.state == StatusState::Pending {
            record.state = StatusState::Success;
            self.emit(id, StreamStatus::Started);
        }
    }

    fn emit(&self, id: &StreamId, status: StreamStatus) {
        debug!(stream = %id, ?status, "stream status");
        self.output.accept(Message::Trace(StreamStatusTrace {
            stream: id.clone(),
            status,
        }));
    }

    fn for_each_stream(&self, feed: &Feed, mut f: impl FnMut(&StreamId, &mut StatusRecord)) {
        for stream in feed.streams() {
            if let Some(record) = self.records.get(&stream.id) {
                let mut record = record.lock().unwrap_or_else(PoisonError::into_inner);
                f(&stream.id, &mut record);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::{Field, Global, Stream};
    use crate::output::BufferingOutputConsumer;

    fn stream(name: &str) -> Stream {
        Stream::new(StreamId::new(name, None), vec![Field::new("id")])
    }

    fn statuses(output: &BufferingOutputConsumer, name: &str) -> Vec<StreamStatus> {
        output
            .traces()
            .into_iter()
            .filter(|t| t.stream.name == name)
            .map(|t| t.status)
            .collect()
    }

    #[test]
    fn single_feed_lifecycle() {
        let output = Arc::new(BufferingOutputConsumer::new());
        let feed = Feed::Stream(stream("a"));
        let manager = StreamStatusManager::new(std::slice::from_ref(&feed), output.clone());

        manager.notify_starting(&feed);
        manager.notify_starting(&feed);
        assert_eq!(manager.state_of(&stream("a").id), Some(StatusState::Success));
        manager.notify_complete(&feed);
        manager.notify_complete(&feed);

        assert_eq!(
            statuses(&output, "a"),
            vec![StreamStatus::Started, StreamStatus::Complete]
        );
        assert_eq!(manager.state_of(&stream("a").id), Some(StatusState::Done));
    }

    #[test]
    fn failure_without_start_is_promoted_first() {
        let output = Arc::new(BufferingOutputConsumer::new());
        let feed = Feed::Stream(stream("a"));
        let manager = StreamStatusManager::new(std::slice::from_ref(&feed), output.clone());

        manager.notify_failure(&feed);
        assert_eq!(
            statuses(&output, "a"),
            vec![StreamStatus::Started, StreamStatus::Incomplete]
        );
    }

    #[test]
    fn shared_stream_waits_for_every_feed() {
        for global_first in [true, false] {
            let output = Arc::new(BufferingOutputConsumer::new());
            let stream_feed = Feed::Stream(stream("a"));
            let global = Feed::Global(Global::new(vec![stream("a")]));
            let manager = StreamStatusManager::new(
                &[global.clone(), stream_feed.clone()],
                output.clone(),
            );

            manager.notify_starting(&stream_feed);
            manager.notify_starting(&global);
            let (first, second) = if global_first {
                (&global, &stream_feed)
            } else {
                (&stream_feed, &global)
            };
            manager.notify_complete(first);
            assert_eq!(statuses(&output, "a"), vec![StreamStatus::Started]);
            manager.notify_complete(second);
            assert_eq!(
                statuses(&output, "a"),
                vec![StreamStatus::Started, StreamStatus::Complete]
            );
        }
    }

    #[test]
    fn one_failing_feed_makes_stream_incomplete() {
        let output = Arc::new(BufferingOutputConsumer::new());
        let stream_feed = Feed::Stream(stream("a"));
        let global = Feed::Global(Global::new(vec![stream("a")]));
        let manager =
            StreamStatusManager::new(&[global.clone(), stream_feed.clone()], output.clone());

        manager.notify_failure(&stream_feed);
        manager.notify_complete(&global);
        assert_eq!(
            statuses(&output, "a"),
            vec![StreamStatus::Started, StreamStatus::Incomplete]
        );
    }

    #[test]
    fn stopped_feed_keeps_outcome_of_others() {
        let output = Arc::new(BufferingOutputConsumer::new());
        let feed_a = Feed::Stream(stream("a"));
        let feed_b = Feed::Stream(stream("b"));
        let global = Feed::Global(Global::new(vec![stream("a"), stream("b")]));
        let manager = StreamStatusManager::new(
            &[global.clone(), feed_a.clone(), feed_b.clone()],
            output.clone(),
        );

        manager.notify_starting(&global);
        manager.notify_failure(&feed_a);
        manager.notify_complete(&feed_b);
        assert_eq!(statuses(&output, "b"), vec![StreamStatus::Started]);

        manager.notify_stopped(&global);
        assert_eq!(
            statuses(&output, "a"),
            vec![StreamStatus::Started, StreamStatus::Incomplete]
        );
        assert_eq!(
            statuses(&output, "b"),
            vec![StreamStatus::Started, StreamStatus::Complete]
        );
    }

    #[test]
    fn stream_only_read_by_a_stopped_feed_is_incomplete() {
        let output = Arc::new(BufferingOutputConsumer::new());
        let feed_a = Feed::Stream(stream("a"));
        let global = Feed::Global(Global::new(vec![stream("a"), stream("cdc_only")]));
        let manager =
            StreamStatusManager::new(&[global.clone(), feed_a.clone()], output.clone());

        manager.notify_starting(&global);
        manager.notify_failure(&feed_a);
        manager.notify_stopped(&global);
        assert_eq!(
            statuses(&output, "cdc_only"),
            vec![StreamStatus::Started, StreamStatus::Incomplete]
        );
        assert_eq!(manager.state_of(&stream("cdc_only").id), Some(StatusState::Done));
    }
}
