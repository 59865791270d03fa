//! # Feed data model.
//!
//! A [`Feed`] is the unit a checkpoint is scoped to:
//! - [`Stream`] a single configured stream,
//! - [`Global`] a change-feed spanning several streams.
//!
//! Feeds are built once per read from the validated catalog and never change afterwards.

mod feed;

pub use feed::{ConfiguredSyncMode, Feed, Field, Global, Stream, StreamId};
