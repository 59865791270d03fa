//! # Run a single partition read.
//!
//! Drives one [`PartitionReader`] through its whole protocol and publishes its lifecycle
//! events to the [`Bus`]:
//!
//! ```text
//! wait for the previous reader's acquisition ──► acquire (chained) ──► signal next reader
//!     │
//!     ▼
//! PartitionReadStarting ──► reader.run(child) under timeout ──► release + notify availability
//!                                │
//!                                ├─► Ok        → checkpoint() → PartitionReadCompleted
//!                                ├─► timeout   → cancel child → checkpoint() → PartitionReadTimedOut
//!                                ├─► cancelled → PartitionReadCancelled
//!                                └─► Err(e)    → PartitionReadFailed
//! ```
//!
//! ## Rules
//! - The acquisition signal is always sent, whatever the acquisition outcome.
//! - `release_resources` runs exactly once after a successful acquisition.
//! - `checkpoint` runs only after `run` finished or timed out.
//! - A timeout is not an error; readers flagged unlimited-time get no timeout at all.
//! - Cancellation takes precedence: a read interrupted by `token` never checkpoints.
//! - Derives a **child token** per `run` call: the timeout cancels only that call.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::core::coordinator::ResourceCoordinator;
use crate::error::ReadError;
use crate::events::{Bus, Event, EventKind};
use crate::partitions::{PartitionReadCheckpoint, PartitionReader};

/// How a partition read ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadOutcome {
    Completed,
    TimedOut,
}

/// Everything a partition task needs besides the reader itself.
pub(crate) struct PartitionRun {
    pub(crate) bus: Bus,
    pub(crate) coordinator: ResourceCoordinator,
    pub(crate) feed: Arc<str>,
    pub(crate) round: u64,
    /// 1-based, creation order.
    pub(crate) partition: usize,
    pub(crate) heartbeat: Duration,
    pub(crate) timeout: Option<Duration>,
}

impl PartitionRun {
    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind)
            .with_feed(self.feed.clone())
            .with_round(self.round)
            .with_partition(self.partition)
    }
}

/// Runs one partition read to its end.
///
/// `previous` resolves once the previous reader of the round is done acquiring; `acquired`
/// is signalled once this reader is.
pub(crate) async fn run_partition(
    run: PartitionRun,
    mut reader: Box<dyn PartitionReader>,
    token: CancellationToken,
    previous: Option<oneshot::Receiver<()>>,
    acquired: oneshot::Sender<()>,
) -> Result<PartitionReadCheckpoint, ReadError> {
    let acquisition = acquire_after(&run, reader.as_mut(), &token, previous).await;
    let _ = acquired.send(());

    let outcome = match acquisition {
        Ok(()) => {
            run.bus.publish(run.event(EventKind::PartitionReadStarting));
            let timeout = if reader.is_unlimited_time() {
                None
            } else {
                run.timeout
            };
            let outcome = execute(reader.as_mut(), &token, timeout).await;
            reader.release_resources();
            run.coordinator.notify_availability();
            outcome
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok(outcome) => {
            let checkpoint = reader.checkpoint();
            let ev = match outcome {
                ReadOutcome::Completed => run.event(EventKind::PartitionReadCompleted),
                ReadOutcome::TimedOut => {
                    let ev = run.event(EventKind::PartitionReadTimedOut);
                    match timeout_of(&run, reader.as_ref()) {
                        Some(dur) => ev.with_timeout(dur),
                        None => ev,
                    }
                }
            };
            run.bus.publish(ev.with_records(checkpoint.num_records));
            Ok(checkpoint)
        }
        Err(ReadError::Canceled) if token.is_cancelled() => {
            run.bus.publish(
                run.event(EventKind::PartitionReadCancelled)
                    .with_reason(ReadError::Canceled.to_string()),
            );
            Err(ReadError::Canceled)
        }
        Err(e) => {
            run.bus.publish(
                run.event(EventKind::PartitionReadFailed)
                    .with_reason(e.as_message()),
            );
            Err(e)
        }
    }
}

fn timeout_of(run: &PartitionRun, reader: &dyn PartitionReader) -> Option<Duration> {
    run.timeout.filter(|_| !reader.is_unlimited_time())
}

/// Waits for the previous reader's acquisition, then acquires this reader's resources.
async fn acquire_after(
    run: &PartitionRun,
    reader: &mut dyn PartitionReader,
    token: &CancellationToken,
    previous: Option<oneshot::Receiver<()>>,
) -> Result<(), ReadError> {
    if let Some(previous) = previous {
        select! {
            // A dropped sender (previous task gone) also releases the chain.
            _ = previous => {}
            _ = token.cancelled() => return Err(ReadError::Canceled),
        }
    }
    run.coordinator
        .acquire(
            || reader.try_acquire_resources(),
            run.heartbeat,
            token,
            || run.bus.publish(run.event(EventKind::ResourcesUnavailable)),
        )
        .await
}

/// Calls `reader.run` once, bounded by `timeout` and by `token`.
async fn execute(
    reader: &mut dyn PartitionReader,
    token: &CancellationToken,
    timeout: Option<Duration>,
) -> Result<ReadOutcome, ReadError> {
    let child = token.child_token();
    let mut read = reader.run(child.clone());

    // Cancellation wins over a read that returned because it was cancelled.
    let res = match timeout {
        Some(dur) => select! {
            biased;
            _ = token.cancelled() => Err(ReadError::Canceled),
            res = time::timeout(dur, &mut read) => match res {
                Ok(res) => res.map(|()| ReadOutcome::Completed),
                Err(_elapsed) => Ok(ReadOutcome::TimedOut),
            },
        },
        None => select! {
            biased;
            _ = token.cancelled() => Err(ReadError::Canceled),
            res = &mut read => res.map(|()| ReadOutcome::Completed),
        },
    };
    child.cancel();
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partitions::TryAcquireResourcesStatus;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Sleepy {
        sleep: Duration,
        progress: u64,
        unlimited: bool,
        released: Arc<AtomicBool>,
        fail: bool,
    }

    impl Sleepy {
        fn new(sleep: Duration) -> Self {
            Self {
                sleep,
                progress: 0,
                unlimited: false,
                released: Arc::new(AtomicBool::new(false)),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl PartitionReader for Sleepy {
        fn try_acquire_resources(&mut self) -> Result<TryAcquireResourcesStatus, ReadError> {
            Ok(TryAcquireResourcesStatus::ReadyToRun)
        }

        async fn run(&mut self, _ctx: CancellationToken) -> Result<(), ReadError> {
            self.progress = 1;
            time::sleep(self.sleep).await;
            if self.fail {
                return Err(ReadError::fail("boom"));
            }
            self.progress = 2;
            Ok(())
        }

        fn release_resources(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }

        fn checkpoint(&mut self) -> PartitionReadCheckpoint {
            PartitionReadCheckpoint::new(json!(self.progress), self.progress)
        }

        fn is_unlimited_time(&self) -> bool {
            self.unlimited
        }
    }

    fn partition_run(bus: &Bus, timeout: Option<Duration>) -> PartitionRun {
        PartitionRun {
            bus: bus.clone(),
            coordinator: ResourceCoordinator::new(),
            feed: Arc::from("users"),
            round: 1,
            partition: 1,
            heartbeat: Duration::from_millis(1),
            timeout,
        }
    }

    #[tokio::test]
    async fn test_completed_read_reports_checkpoint() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let reader = Sleepy::new(Duration::ZERO);
        let released = reader.released.clone();
        let (tx, acquired) = oneshot::channel();

        let checkpoint = run_partition(
            partition_run(&bus, Some(Duration::from_secs(5))),
            Box::new(reader),
            CancellationToken::new(),
            None,
            tx,
        )
        .await
        .unwrap();

        assert_eq!(checkpoint, PartitionReadCheckpoint::new(json!(2), 2));
        assert!(released.load(Ordering::SeqCst));
        assert!(acquired.await.is_ok());
        assert_eq!(
            rx.recv().await.unwrap().kind,
            EventKind::PartitionReadStarting
        );
        let done = rx.recv().await.unwrap();
        assert_eq!(done.kind, EventKind::PartitionReadCompleted);
        assert_eq!(done.records, Some(2));
    }

    #[tokio::test]
    async fn test_timeout_still_checkpoints() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let reader = Sleepy::new(Duration::from_secs(30));
        let released = reader.released.clone();
        let (tx, _acquired) = oneshot::channel();

        let checkpoint = run_partition(
            partition_run(&bus, Some(Duration::from_millis(20))),
            Box::new(reader),
            CancellationToken::new(),
            None,
            tx,
        )
        .await
        .unwrap();

        assert_eq!(checkpoint.num_records, 1);
        assert!(released.load(Ordering::SeqCst));
        let _starting = rx.recv().await.unwrap();
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::PartitionReadTimedOut);
        assert_eq!(ev.timeout_ms, Some(20));
    }

    #[tokio::test]
    async fn test_unlimited_time_reader_ignores_timeout() {
        let bus = Bus::new(16);
        let mut reader = Sleepy::new(Duration::from_millis(60));
        reader.unlimited = true;
        let (tx, _acquired) = oneshot::channel();

        let checkpoint = run_partition(
            partition_run(&bus, Some(Duration::from_millis(5))),
            Box::new(reader),
            CancellationToken::new(),
            None,
            tx,
        )
        .await
        .unwrap();
        assert_eq!(checkpoint.num_records, 2);
    }

    #[tokio::test]
    async fn test_failure_releases_and_skips_checkpoint() {
        let bus = Bus::new(16);
        let mut reader = Sleepy::new(Duration::ZERO);
        reader.fail = true;
        let released = reader.released.clone();
        let (tx, _acquired) = oneshot::channel();

        let res = run_partition(
            partition_run(&bus, None),
            Box::new(reader),
            CancellationToken::new(),
            None,
            tx,
        )
        .await;
        assert!(matches!(res, Err(ReadError::Fail { .. })));
        assert!(released.load(Ordering::SeqCst));
    }

    /// Returns `Ok` as soon as its token is cancelled.
    struct Obedient;

    #[async_trait]
    impl PartitionReader for Obedient {
        fn try_acquire_resources(&mut self) -> Result<TryAcquireResourcesStatus, ReadError> {
            Ok(TryAcquireResourcesStatus::ReadyToRun)
        }

        async fn run(&mut self, ctx: CancellationToken) -> Result<(), ReadError> {
            ctx.cancelled().await;
            Ok(())
        }

        fn release_resources(&mut self) {}

        fn checkpoint(&mut self) -> PartitionReadCheckpoint {
            PartitionReadCheckpoint::new(json!("interrupted"), 1)
        }
    }

    #[tokio::test]
    async fn test_cancelled_read_never_checkpoints() {
        for _ in 0..32 {
            let bus = Bus::new(16);
            let token = CancellationToken::new();
            let (tx, _acquired) = oneshot::channel();
            let cancel = token.clone();
            tokio::spawn(async move {
                time::sleep(Duration::from_millis(1)).await;
                cancel.cancel();
            });

            let res = run_partition(partition_run(&bus, None), Box::new(Obedient), token, None, tx)
                .await;
            assert!(matches!(res, Err(ReadError::Canceled)));
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_previous_acquired() {
        let bus = Bus::new(16);
        let reader = Sleepy::new(Duration::ZERO);
        let released = reader.released.clone();
        let (_previous_tx, previous) = oneshot::channel::<()>();
        let (tx, acquired) = oneshot::channel();
        let token = CancellationToken::new();
        token.cancel();

        let res = run_partition(
            partition_run(&bus, None),
            Box::new(reader),
            token,
            Some(previous),
            tx,
        )
        .await;
        assert!(matches!(res, Err(ReadError::Canceled)));
        assert!(!released.load(Ordering::SeqCst));
        assert!(acquired.await.is_ok());
    }
}
