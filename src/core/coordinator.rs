//! # Feed-scoped resource acquisition.
//!
//! [`ResourceCoordinator`] serializes the resource probes of every partitions creator and
//! partition reader of one feed, and wakes waiters when resources are released.
//!
//! ```text
//! acquire(probe):
//!   loop {
//!     ├─► register for the next release notification
//!     ├─► lock ─► probe() ─► unlock
//!     │     ├─► ReadyToRun → return Ok
//!     │     ├─► Err(e)     → return Err(e) (not retried)
//!     │     └─► RetryLater
//!     └─► wait: release notification | heartbeat | cancellation
//!   }
//! ```
//!
//! Registering before probing means a release happening between a `RetryLater` and the wait
//! is never missed. Each feed owns its coordinator; feeds probe independently.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::error::ReadError;
use crate::partitions::TryAcquireResourcesStatus;

#[derive(Debug, Default)]
struct Inner {
    probe_lock: Mutex<()>,
    available: Notify,
}

/// Serializes resource probes of one feed; cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct ResourceCoordinator {
    inner: Arc<Inner>,
}

impl ResourceCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `probe` under the feed-wide probe lock. Probe errors are returned as is.
    pub async fn try_acquire<F>(&self, probe: F) -> Result<TryAcquireResourcesStatus, ReadError>
    where
        F: FnOnce() -> Result<TryAcquireResourcesStatus, ReadError>,
    {
        let _guard = self.inner.probe_lock.lock().await;
        probe()
    }

    /// Waits until resources are released or `heartbeat` elapses.
    pub async fn wait_for_availability(&self, heartbeat: Duration) {
        let _ = time::timeout(heartbeat, self.inner.available.notified()).await;
    }

    /// Wakes every current waiter.
    pub fn notify_availability(&self) {
        self.inner.available.notify_waiters();
    }

    /// Probes until `ReadyToRun`, waiting between `RetryLater` attempts.
    ///
    /// `on_retry` is called after each `RetryLater`. Returns `ReadError::Canceled` as soon as
    /// `token` is cancelled; a probe which already ran is never interrupted.
    pub async fn acquire<F, R>(
        &self,
        mut probe: F,
        heartbeat: Duration,
        token: &CancellationToken,
        mut on_retry: R,
    ) -> Result<(), ReadError>
    where
        F: FnMut() -> Result<TryAcquireResourcesStatus, ReadError>,
        R: FnMut(),
    {
        loop {
            if token.is_cancelled() {
                return Err(ReadError::Canceled);
            }
            let notified = self.inner.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let status = select! {
                status = self.try_acquire(&mut probe) => status?,
                _ = token.cancelled() => return Err(ReadError::Canceled),
            };
            if status == TryAcquireResourcesStatus::ReadyToRun {
                return Ok(());
            }
            on_retry();

            select! {
                _ = time::timeout(heartbeat, notified) => {}
                _ = token.cancelled() => return Err(ReadError::Canceled),
            }
        }
    }
}
