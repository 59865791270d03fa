use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::feeds::{Field, Stream};
use crate::output::{Message, OutputConsumer, RecordMessage};
use crate::state::OpaqueStateValue;

/// How a field value was altered on its way out of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldValueChange {
    RecordSizeLimitationErasure,
    RecordSizeLimitationTruncation,
    FieldSizeLimitationErasure,
    FieldSizeLimitationTruncation,
    DeserializationFailureTotal,
    DeserializationFailurePartial,
    RetrievalFailureTotal,
    RetrievalFailurePartial,
}

impl FieldValueChange {
    /// Erasures and total failures null the value, the rest truncate it.
    pub fn change(self) -> RecordChange {
        match self {
            FieldValueChange::RecordSizeLimitationErasure
            | FieldValueChange::FieldSizeLimitationErasure
            | FieldValueChange::DeserializationFailureTotal
            | FieldValueChange::RetrievalFailureTotal => RecordChange::Nulled,
            FieldValueChange::RecordSizeLimitationTruncation
            | FieldValueChange::FieldSizeLimitationTruncation
            | FieldValueChange::DeserializationFailurePartial
            | FieldValueChange::RetrievalFailurePartial => RecordChange::Truncated,
        }
    }

    pub fn reason(self) -> RecordChangeReason {
        match self {
            FieldValueChange::RecordSizeLimitationErasure
            | FieldValueChange::RecordSizeLimitationTruncation => {
                RecordChangeReason::SourceRecordSizeLimitation
            }
            FieldValueChange::FieldSizeLimitationErasure
            | FieldValueChange::FieldSizeLimitationTruncation => {
                RecordChangeReason::SourceFieldSizeLimitation
            }
            FieldValueChange::DeserializationFailureTotal
            | FieldValueChange::DeserializationFailurePartial => {
                RecordChangeReason::SourceSerializationError
            }
            FieldValueChange::RetrievalFailureTotal | FieldValueChange::RetrievalFailurePartial => {
                RecordChangeReason::SourceRetrievalError
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordChange {
    Nulled,
    Truncated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordChangeReason {
    SourceRecordSizeLimitation,
    SourceFieldSizeLimitation,
    SourceSerializationError,
    SourceRetrievalError,
}

/// One altered field of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordMetaChange {
    pub field: String,
    pub change: RecordChange,
    pub reason: RecordChangeReason,
}

/// Record metadata: the fields altered on the way out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordMeta {
    pub changes: Vec<RecordMetaChange>,
}

/// Adds connector-specific meta fields to the records of a stream.
///
/// Decoration happens once per [`StreamRecordConsumer`], on the default record: a decorated
/// field keeps its value unless the record provides one.
pub trait MetaFieldDecorator: Send + Sync + 'static {
    /// Cursor shared by every stream of the source, if any.
    fn global_cursor(&self) -> Option<&Field> {
        None
    }

    /// Writes the meta fields of `stream` into `data`.
    ///
    /// `global_state` is the current state of the global feed the stream belongs to.
    fn decorate_record_data(
        &self,
        emitted_at_ms: u64,
        global_state: Option<&OpaqueStateValue>,
        stream: &Stream,
        data: &mut Map<String, Value>,
    );
}

/// Decorator which adds nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpMetaFieldDecorator;

impl MetaFieldDecorator for NoOpMetaFieldDecorator {
    fn decorate_record_data(
        &self,
        _emitted_at_ms: u64,
        _global_state: Option<&OpaqueStateValue>,
        _stream: &Stream,
        _data: &mut Map<String, Value>,
    ) {
    }
}

/// # Emits the records of one stream.
///
/// Every record carries exactly the fields of the stream schema: missing fields are set to
/// null, fields outside the schema are dropped. The emission timestamp is fixed when the
/// consumer is created.
pub struct StreamRecordConsumer {
    stream: Stream,
    output: Arc<dyn OutputConsumer>,
    emitted_at_ms: u64,
    default_data: Map<String, Value>,
}

impl StreamRecordConsumer {
    pub fn new(stream: Stream, output: Arc<dyn OutputConsumer>) -> Self {
        let default_data = stream
            .schema
            .iter()
            .map(|field| (field.id.clone(), Value::Null))
            .collect();
        let emitted_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        Self {
            stream,
            output,
            emitted_at_ms,
            default_data,
        }
    }

    /// Applies `decorator` to the default record of this consumer.
    #[must_use]
    pub fn decorated(
        mut self,
        decorator: &dyn MetaFieldDecorator,
        global_state: Option<&OpaqueStateValue>,
    ) -> Self {
        decorator.decorate_record_data(
            self.emitted_at_ms,
            global_state,
            &self.stream,
            &mut self.default_data,
        );
        self
    }

    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// Closes the underlying output.
    pub fn close(&self) {
        self.output.close();
    }

    /// Emits one record.
    pub fn accept(&self, data: Map<String, Value>) {
        self.output.accept(Message::Record(self.record(data, None)));
    }

    /// Emits one record along with the changes applied to some of its fields.
    ///
    /// An empty `changes` slice is the same as [`accept`](StreamRecordConsumer::accept).
    pub fn accept_with_changes(
        &self,
        data: Map<String, Value>,
        changes: &[(Field, FieldValueChange)],
    ) {
        let meta = (!changes.is_empty()).then(|| RecordMeta {
            changes: changes
                .iter()
                .map(|(field, change)| RecordMetaChange {
                    field: field.id.clone(),
                    change: change.change(),
                    reason: change.reason(),
                })
                .collect(),
        });
        self.output.accept(Message::Record(self.record(data, meta)));
    }

    fn record(&self, mut data: Map<String, Value>, meta: Option<RecordMeta>) -> RecordMessage {
        let mut filled = self.default_data.clone();
        for (name, value) in filled.iter_mut() {
            if let Some(provided) = data.remove(name) {
                *value = provided;
            }
        }
        RecordMessage {
            stream: self.stream.id.clone(),
            emitted_at_ms: self.emitted_at_ms,
            data: filled,
            meta,
        }
    }
}
