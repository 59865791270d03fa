//! # Messages produced by a read and the sink they go to.
//!
//! - [`Message`] the three kinds of output: records, checkpoints and stream status traces
//! - [`OutputConsumer`] fire-and-forget sink implemented by the embedder
//! - [`BufferingOutputConsumer`] in-memory sink, handy for tests and small embedders
//! - [`StreamRecordConsumer`] per-stream record builder used by partition readers
//!
//! Serializing messages onto a wire is left to the [`OutputConsumer`] implementation; all
//! message types derive `serde::Serialize` to make that straightforward.

mod consumer;
mod message;
mod record;

pub use consumer::{BufferingOutputConsumer, OutputConsumer};
pub use message::{
    CheckpointMessage, Message, RecordMessage, StreamState, StreamStatus, StreamStatusTrace,
};
pub use record::{
    FieldValueChange, MetaFieldDecorator, NoOpMetaFieldDecorator, RecordChange,
    RecordChangeReason, RecordMeta, RecordMetaChange, StreamRecordConsumer,
};
