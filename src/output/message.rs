use serde::Serialize;
use serde_json::{Map, Value};

use crate::feeds::StreamId;
use crate::output::RecordMeta;

/// One unit of output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    Record(RecordMessage),
    State(CheckpointMessage),
    Trace(StreamStatusTrace),
}

/// A record of a stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordMessage {
    pub stream: StreamId,
    /// Milliseconds since the Unix epoch.
    pub emitted_at_ms: u64,
    pub data: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<RecordMeta>,
}

/// State of one stream inside a global checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamState {
    pub stream: StreamId,
    /// `Value::Null` when the stream has no state yet.
    pub state: Value,
}

/// A checkpoint: durable forward progress plus the records counted since the previous one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckpointMessage {
    /// Checkpoint of a stream feed which is not part of a global feed.
    Stream {
        stream: StreamId,
        state: Value,
        num_records: u64,
    },
    /// Checkpoint of the global feed bundled with the state of each of its streams.
    Global {
        shared_state: Value,
        stream_states: Vec<StreamState>,
        num_records: u64,
    },
}

impl CheckpointMessage {
    /// Records counted since the previous checkpoint.
    pub fn num_records(&self) -> u64 {
        match self {
            CheckpointMessage::Stream { num_records, .. }
            | CheckpointMessage::Global { num_records, .. } => *num_records,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, CheckpointMessage::Global { .. })
    }
}

/// Stream lifecycle status reported downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamStatus {
    Started,
    Complete,
    Incomplete,
}

/// Stream status trace message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamStatusTrace {
    pub stream: StreamId,
    pub status: StreamStatus,
}
