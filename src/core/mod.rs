//! Runtime core: feed orchestration.
//!
//! The public API of this module is [`RootReader`], which drives every feed of a read, and
//! [`ResourceCoordinator`], which connectors may use to share resource acquisition rules.
//!
//! Internal modules:
//! - [`root_reader`]: spawns one task per feed, cancels globals whose streams failed, aggregates errors;
//! - [`feed_reader`]: runs the rounds of one feed and applies checkpoints in partition order;
//! - [`runner`]: executes one partition read with chained acquisition, timeout and events;
//! - [`coordinator`]: serializes resource probes of one feed and wakes waiters on release.

mod coordinator;
mod feed_reader;
mod root_reader;
mod runner;

pub use coordinator::ResourceCoordinator;
pub use root_reader::RootReader;
