//! # Tracker of active feeds, creators and partition reads.
//!
//! Maintains which runtime tasks of a read are currently running, keyed by
//! [`Event::task_key`]:
//!
//! ```text
//! "public_users"          feed task
//! "public_users/3"        partitions creator of round 3
//! "public_users/3/2"      partition read 2 of round 3
//! ```
//!
//! ## Rules
//! - `FeedStarting`, `CreatorStarting`, `PartitionReadStarting` insert a key
//! - `PartitionsCreated` and every partition read outcome remove it
//! - feed outcomes remove the feed and every key below it, and leave a stop marker
//! - events of a stopped feed are **rejected** unless they restart it with a newer `seq`
//! - events with `seq <= last_seq` for a tracked key are **rejected** (stale)
//!
//! Only running tasks are kept, plus one stop marker per feed.
//! The root reader's progress reporter logs [`ActiveTracker::snapshot`] periodically.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

#[derive(Debug, Default)]
struct Tracked {
    /// Running task key -> seq of its last event.
    active: HashMap<String, u64>,
    /// Stopped feed -> seq of its outcome event.
    stopped: HashMap<String, u64>,
}

/// Thread-safe tracker of active runtime tasks.
pub struct ActiveTracker {
    state: RwLock<Tracked>,
}

impl ActiveTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Tracked::default()),
        }
    }

    /// Applies an event if it is newer than what is known for its key.
    ///
    /// Returns true when the active state of at least one key changed.
    pub async fn update(&self, ev: &Event) -> bool {
        let Some(key) = ev.task_key() else {
            return false;
        };
        let feed = key.split_once('/').map_or(key.as_str(), |(feed, _)| feed);
        let active = match ev.kind {
            EventKind::FeedStarting
            | EventKind::CreatorStarting
            | EventKind::PartitionReadStarting => true,
            EventKind::PartitionsCreated
            | EventKind::PartitionReadCompleted
            | EventKind::PartitionReadTimedOut
            | EventKind::PartitionReadFailed
            | EventKind::PartitionReadCancelled => false,
            EventKind::FeedCompleted | EventKind::FeedFailed | EventKind::FeedCancelled => {
                return self.stop_feed(ev, feed).await;
            }
            _ => return false,
        };

        let mut state = self.state.write().await;
        let stopped = state.stopped.get(feed).copied();
        if let Some(stopped) = stopped {
            if ev.seq <= stopped || ev.kind != EventKind::FeedStarting {
                return false;
            }
            state.stopped.remove(feed);
        }
        let last = state.active.get(&key).copied();
        match last {
            Some(last) if ev.seq <= last => false,
            Some(_) if active => {
                state.active.insert(key, ev.seq);
                false
            }
            Some(_) => {
                state.active.remove(&key);
                true
            }
            None if active => {
                state.active.insert(key, ev.seq);
                true
            }
            None => false,
        }
    }

    async fn stop_feed(&self, ev: &Event, feed: &str) -> bool {
        let prefix = format!("{feed}/");
        let mut state = self.state.write().await;
        if state.stopped.get(feed).is_some_and(|&last| ev.seq <= last) {
            return false;
        }
        state.stopped.insert(feed.to_string(), ev.seq);
        let before = state.active.len();
        state
            .active
            .retain(|key, _| key != feed && !key.starts_with(&prefix));
        state.active.len() != before
    }

    /// Returns the sorted keys of active tasks.
    pub async fn snapshot(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut active: Vec<String> = state.active.keys().cloned().collect();
        active.sort_unstable();
        active
    }

    /// Returns true if the task is currently active.
    pub async fn is_active(&self, key: &str) -> bool {
        self.state.read().await.active.contains_key(key)
    }
}

impl Default for ActiveTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Subscribe for ActiveTracker {
    async fn on_event(&self, ev: &Event) {
        self.update(ev).await;
    }

    fn name(&self) -> &'static str {
        "ActiveTracker"
    }

    fn queue_capacity(&self) -> usize {
        2048
    }
}
