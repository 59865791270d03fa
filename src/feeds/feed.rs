use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

/// Identifier of a stream: its name and optional namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StreamId {
    /// Stream name.
    pub name: String,
    /// Stream namespace (schema, dataset, ...), if the source has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl StreamId {
    /// Creates an identifier.
    pub fn new(name: impl Into<String>, namespace: Option<String>) -> Self {
        Self {
            name: name.into(),
            namespace,
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}_{}", namespace, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A field of a stream schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Field {
    /// Field identifier, as it appears in record data.
    pub id: String,
}

impl Field {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Sync mode configured for a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfiguredSyncMode {
    FullRefresh,
    Incremental,
}

/// A configured stream.
///
/// Identity is the [`StreamId`] alone: two `Stream` values with the same name and namespace
/// are the same stream.
#[derive(Debug, Clone)]
pub struct Stream {
    pub id: StreamId,
    pub schema: Vec<Field>,
    pub configured_sync_mode: ConfiguredSyncMode,
    pub configured_primary_key: Option<Vec<Field>>,
    pub configured_cursor: Option<Field>,
}

impl Stream {
    /// Creates a full-refresh stream without primary key nor cursor.
    pub fn new(id: StreamId, schema: Vec<Field>) -> Self {
        Self {
            id,
            schema,
            configured_sync_mode: ConfiguredSyncMode::FullRefresh,
            configured_primary_key: None,
            configured_cursor: None,
        }
    }

    /// Switches the stream to incremental sync with the given cursor.
    pub fn incremental(mut self, cursor: Field) -> Self {
        self.configured_sync_mode = ConfiguredSyncMode::Incremental;
        self.configured_cursor = Some(cursor);
        self
    }

    /// Sets the primary key.
    pub fn with_primary_key(mut self, key: Vec<Field>) -> Self {
        self.configured_primary_key = Some(key);
        self
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.id.namespace.as_deref()
    }
}

impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Stream {}

impl Hash for Stream {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A global change-feed spanning an ordered list of streams.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Global {
    pub streams: Vec<Stream>,
}

impl Global {
    pub fn new(streams: Vec<Stream>) -> Self {
        Self { streams }
    }

    /// Returns true if `stream` is one of the streams of this global feed.
    pub fn contains(&self, stream: &StreamId) -> bool {
        self.streams.iter().any(|s| &s.id == stream)
    }
}

/// What is being read: a single stream or a global change-feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Feed {
    Stream(Stream),
    Global(Global),
}

impl Feed {
    /// Human-readable label used for task names, logs and errors.
    pub fn label(&self) -> String {
        match self {
            Feed::Stream(stream) => stream.id.to_string(),
            Feed::Global(_) => "global".to_string(),
        }
    }

    /// Streams covered by this feed.
    pub fn streams(&self) -> &[Stream] {
        match self {
            Feed::Stream(stream) => std::slice::from_ref(stream),
            Feed::Global(global) => &global.streams,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Feed::Stream(stream) => Some(stream),
            Feed::Global(_) => None,
        }
    }

    pub fn as_global(&self) -> Option<&Global> {
        match self {
            Feed::Global(global) => Some(global),
            Feed::Stream(_) => None,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Feed::Global(_))
    }
}

impl From<Stream> for Feed {
    fn from(stream: Stream) -> Self {
        Feed::Stream(stream)
    }
}

impl From<Global> for Feed {
    fn from(global: Global) -> Self {
        Feed::Global(global)
    }
}
