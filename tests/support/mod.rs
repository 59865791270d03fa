//! Scenario DSL shared by the integration tests.
//!
//! A [`TestCase`] describes how a one-stream read proceeds, round by round:
//!
//! ```text
//! TestCase::new("failure-2-3r", vec![
//!     create(vec![Read, Read]),                  // round 1: two successful readers
//!     create(vec![Read, ReaderCase::Failure, Read]),  // round 2: reader 2 fails
//! ])
//! ```
//!
//! Every successful reader checkpoints `[creator_id, reader_id]`; the factory resumes from the
//! creator id found in the current state. All creators and readers of a case share one
//! semaphore, which models a connection pool of `resource` slots.
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use feedvisor::{
    BufferingOutputConsumer, CheckpointMessage, FeedBootstrap, Message, PartitionReadCheckpoint,
    PartitionReader, PartitionsCreator, PartitionsCreatorFactory, ReadError, ReaderConfig,
    RootReader, StateManager, Stream, StreamId, StreamStatus, StreamStatusTrace,
    TryAcquireResourcesStatus,
};

/// Upper bound of any single scenario.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Effectively unlimited number of resource slots.
pub const UNCONSTRAINED: usize = 100_000;

/// Two resource slots: at most two creators or readers hold resources at once.
pub const CONSTRAINED: usize = 2;

/// Leaves room to back off many times within [`TEST_TIMEOUT`].
pub const SLOW_HEARTBEAT: Duration = Duration::from_millis(100);

/// Scenarios must never hit the partition read timeout.
pub const EXCESSIVE_TIMEOUT: Duration = Duration::from_secs(20);

pub fn config() -> ReaderConfig {
    ReaderConfig {
        timeout: EXCESSIVE_TIMEOUT,
        heartbeat: SLOW_HEARTBEAT,
        bus_capacity: 4096,
        progress_interval: Duration::ZERO,
    }
}

/// How a partitions creator behaves.
#[derive(Debug, Clone)]
pub enum CreatorCase {
    /// Answers `RetryLater` once, then behaves like the inner case.
    BackOff(Box<CreatorCase>),
    Failure,
    Create(Vec<ReaderCase>),
}

/// How a partition reader behaves.
#[derive(Debug, Clone)]
pub enum ReaderCase {
    /// Answers `RetryLater` once, then behaves like the inner case.
    BackOff(Box<ReaderCase>),
    Failure,
    Read,
}

pub use ReaderCase::Read;

pub fn create(readers: Vec<ReaderCase>) -> CreatorCase {
    CreatorCase::Create(readers)
}

pub fn creator_backoff(next: CreatorCase) -> CreatorCase {
    CreatorCase::BackOff(Box::new(next))
}

pub fn reader_backoff(next: ReaderCase) -> ReaderCase {
    ReaderCase::BackOff(Box::new(next))
}

impl CreatorCase {
    fn is_successful(&self) -> bool {
        match self {
            CreatorCase::BackOff(next) => next.is_successful(),
            CreatorCase::Failure => false,
            CreatorCase::Create(readers) => readers.iter().all(ReaderCase::is_successful),
        }
    }

    fn readers(&self) -> &[ReaderCase] {
        match self {
            CreatorCase::BackOff(next) => next.readers(),
            CreatorCase::Failure => &[],
            CreatorCase::Create(readers) => readers,
        }
    }
}

impl ReaderCase {
    fn is_successful(&self) -> bool {
        match self {
            ReaderCase::BackOff(next) => next.is_successful(),
            ReaderCase::Failure => false,
            ReaderCase::Read => true,
        }
    }
}

/// The catalog of scenarios exercised in every resource mode.
pub fn test_cases() -> Vec<TestCase> {
    vec![
        TestCase::new("simple-1", vec![create(vec![Read]), create(vec![])]),
        TestCase::new(
            "simple-3",
            vec![create(vec![Read, Read, Read]), create(vec![])],
        ),
        TestCase::new(
            "simple-3-2",
            vec![
                create(vec![Read, Read, Read]),
                create(vec![Read, Read]),
                create(vec![]),
            ],
        ),
        TestCase::new(
            "backoff-1",
            vec![
                creator_backoff(create(vec![Read])),
                creator_backoff(creator_backoff(create(vec![]))),
            ],
        ),
        TestCase::new(
            "backoff-2",
            vec![
                create(vec![reader_backoff(reader_backoff(Read)), reader_backoff(Read)]),
                create(vec![]),
            ],
        ),
        TestCase::new("failure-1-c", vec![create(vec![Read]), CreatorCase::Failure]),
        TestCase::new(
            "failure-1-1r",
            vec![create(vec![Read]), create(vec![ReaderCase::Failure])],
        ),
        TestCase::new(
            "failure-2-2r",
            vec![
                create(vec![Read, Read]),
                create(vec![ReaderCase::Failure, Read]),
            ],
        ),
        TestCase::new(
            "failure-2-3r",
            vec![
                create(vec![Read, Read]),
                create(vec![Read, ReaderCase::Failure, Read]),
            ],
        ),
    ]
}

/// A one-stream read scenario.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: &'static str,
    pub creator_cases: Vec<CreatorCase>,
    pub resource: usize,
}

impl TestCase {
    pub fn new(name: &'static str, creator_cases: Vec<CreatorCase>) -> Self {
        Self {
            name,
            creator_cases,
            resource: UNCONSTRAINED,
        }
    }

    pub fn with_resource(mut self, resource: usize) -> Self {
        self.resource = resource;
        self
    }

    pub fn stream(&self) -> Stream {
        Stream::new(StreamId::new(self.name, Some("test".into())), Vec::new())
    }

    /// Whether the read is expected to succeed.
    pub fn is_successful(&self) -> bool {
        self.creator_cases.iter().all(CreatorCase::is_successful)
    }

    /// States expected in each round: the checkpoints of the leading successful readers.
    ///
    /// The list stops at the first round which cannot make any progress, or right after the
    /// first round which fails part way.
    pub fn expected_states(&self) -> Vec<BTreeSet<(u64, u64)>> {
        let mut expected = Vec::new();
        for (index, case) in self.creator_cases.iter().enumerate() {
            let creator_id = index as u64 + 1;
            let readers = case.readers();
            let leading: BTreeSet<(u64, u64)> = readers
                .iter()
                .take_while(|reader| reader.is_successful())
                .enumerate()
                .map(|(reader, _)| (creator_id, reader as u64 + 1))
                .collect();
            if leading.is_empty() {
                break;
            }
            let partial = leading.len() < readers.len();
            expected.push(leading);
            if partial {
                break;
            }
        }
        expected
    }

    /// Reads the case as a one-stream catalog and verifies the output.
    pub async fn run(&self) {
        let output = Arc::new(BufferingOutputConsumer::new());
        let reader = RootReader::new(
            Arc::new(StateManager::streams(vec![(self.stream(), None)])),
            config(),
            output.clone(),
            vec![Arc::new(TestPartitionsCreatorFactory::new(
                self.resource,
                vec![self.clone()],
            ))],
        );

        let res = tokio::time::timeout(TEST_TIMEOUT, reader.read())
            .await
            .unwrap_or_else(|_| panic!("case {} timed out", self.name));
        match res {
            Ok(()) => assert!(
                self.is_successful(),
                "expected case {} to fail, but it succeeded",
                self.name
            ),
            Err(e) => assert!(
                !self.is_successful(),
                "expected case {} to succeed, but it failed: {e}",
                self.name
            ),
        }
        self.verify(&output);
    }

    /// Checks message order (traces, then states, then traces) and their content.
    pub fn verify(&self, output: &BufferingOutputConsumer) {
        let mut in_trace_prefix = true;
        let mut in_trace_suffix = false;
        for message in output.messages() {
            match message {
                Message::Trace(_) => {
                    if !in_trace_prefix && !in_trace_suffix {
                        in_trace_suffix = true;
                    }
                }
                Message::State(state) => {
                    in_trace_prefix = false;
                    assert!(
                        !in_trace_suffix,
                        "unexpected state message {state:?} in case {}",
                        self.name
                    );
                }
                other => panic!("unexpected message {other:?} in case {}", self.name),
            }
        }
        self.verify_traces(&output.traces());
        self.verify_states(&output.states());
    }

    pub fn verify_traces(&self, traces: &[StreamStatusTrace]) {
        let name = self.name;
        let mut started = false;
        let mut completed = false;
        let mut incomplete = false;
        for trace in traces {
            assert_eq!(trace.stream.name, name);
            match trace.status {
                StreamStatus::Started => {
                    assert!(!started, "case {name} emitted STARTED twice");
                    assert!(!completed && !incomplete, "case {name} emitted STARTED too late");
                    started = true;
                }
                StreamStatus::Complete => {
                    assert!(started, "case {name} emitted COMPLETE before STARTED");
                    completed = true;
                }
                StreamStatus::Incomplete => {
                    assert!(started, "case {name} emitted INCOMPLETE before STARTED");
                    incomplete = true;
                }
            }
        }
        assert!(started, "case {name} should have emitted a STARTED trace");
        if self.is_successful() {
            assert!(completed, "case {name} should have emitted COMPLETE");
            assert!(!incomplete, "case {name} should not have emitted INCOMPLETE");
        } else {
            assert!(!completed, "case {name} should not have emitted COMPLETE");
            assert!(incomplete, "case {name} should have emitted INCOMPLETE");
        }
    }

    /// Groups the emitted stream states by creator id and checks each group against
    /// [`TestCase::expected_states`].
    pub fn verify_states(&self, states: &[CheckpointMessage]) {
        let name = self.name;
        let mut actual: Vec<BTreeSet<(u64, u64)>> = Vec::new();
        let mut previous_creator = 0;
        for message in states {
            let CheckpointMessage::Stream { stream, state, .. } = message else {
                panic!("case {name} emitted a global state: {message:?}");
            };
            assert_eq!(stream.name, name);
            let (creator_id, reader_id) = parse_state(state)
                .unwrap_or_else(|| panic!("case {name} emitted a malformed state: {state}"));
            if creator_id == previous_creator {
                if let Some(last) = actual.last_mut() {
                    last.insert((creator_id, reader_id));
                }
            } else {
                actual.push(BTreeSet::from([(creator_id, reader_id)]));
                previous_creator = creator_id;
            }
        }

        let expected = self.expected_states();
        for round in 0..expected.len().max(actual.len()) {
            let Some(expected) = expected.get(round) else {
                assert!(
                    actual.get(round).is_none(),
                    "case {name} should not have emitted any state in round {}: {:?}",
                    round + 1,
                    actual.get(round)
                );
                break;
            };
            let actual = actual.get(round).unwrap_or_else(|| {
                panic!(
                    "case {name} emitted no state in round {}, expected {expected:?}",
                    round + 1
                )
            });
            assert!(
                actual.is_subset(expected),
                "case {name} emitted unexpected states in round {}: {actual:?} vs {expected:?}",
                round + 1
            );
        }
    }
}

/// Parses a `[creator_id, reader_id]` state value.
pub fn parse_state(state: &Value) -> Option<(u64, u64)> {
    let array = state.as_array()?;
    Some((array.first()?.as_u64()?, array.get(1)?.as_u64()?))
}

fn try_acquire(resource: &Semaphore) -> TryAcquireResourcesStatus {
    match resource.try_acquire() {
        Ok(permit) => {
            permit.forget();
            TryAcquireResourcesStatus::ReadyToRun
        }
        Err(_) => TryAcquireResourcesStatus::RetryLater,
    }
}

pub struct TestPartitionsCreator {
    creator_id: u64,
    case: CreatorCase,
    resource: Arc<Semaphore>,
}

#[async_trait]
impl PartitionsCreator for TestPartitionsCreator {
    fn try_acquire_resources(&mut self) -> Result<TryAcquireResourcesStatus, ReadError> {
        if let CreatorCase::BackOff(next) = &self.case {
            self.case = (**next).clone();
            return Ok(TryAcquireResourcesStatus::RetryLater);
        }
        Ok(try_acquire(&self.resource))
    }

    async fn run(&mut self) -> Result<Vec<Box<dyn PartitionReader>>, ReadError> {
        match &self.case {
            CreatorCase::BackOff(_) => unreachable!("back-off is consumed by acquisition"),
            CreatorCase::Failure => Err(ReadError::fail("boom")),
            CreatorCase::Create(readers) => {
                let n = readers.len();
                Ok(readers
                    .iter()
                    .enumerate()
                    .map(|(index, case)| {
                        Box::new(TestPartitionReader {
                            creator_id: self.creator_id,
                            reader_id: index as u64 + 1,
                            case: case.clone(),
                            resource: self.resource.clone(),
                            // Later readers finish first.
                            delay: Duration::from_millis(10 * (n - index) as u64),
                        }) as Box<dyn PartitionReader>
                    })
                    .collect())
            }
        }
    }

    fn release_resources(&mut self) {
        self.resource.add_permits(1);
    }
}

pub struct TestPartitionReader {
    creator_id: u64,
    reader_id: u64,
    case: ReaderCase,
    resource: Arc<Semaphore>,
    delay: Duration,
}

#[async_trait]
impl PartitionReader for TestPartitionReader {
    fn try_acquire_resources(&mut self) -> Result<TryAcquireResourcesStatus, ReadError> {
        if let ReaderCase::BackOff(next) = &self.case {
            self.case = (**next).clone();
            return Ok(TryAcquireResourcesStatus::RetryLater);
        }
        Ok(try_acquire(&self.resource))
    }

    async fn run(&mut self, _ctx: CancellationToken) -> Result<(), ReadError> {
        match self.case {
            ReaderCase::BackOff(_) => unreachable!("back-off is consumed by acquisition"),
            ReaderCase::Failure => Err(ReadError::fail("boom")),
            ReaderCase::Read => {
                tokio::time::sleep(self.delay).await;
                Ok(())
            }
        }
    }

    fn release_resources(&mut self) {
        self.resource.add_permits(1);
    }

    fn checkpoint(&mut self) -> PartitionReadCheckpoint {
        PartitionReadCheckpoint::new(json!([self.creator_id, self.reader_id]), 1)
    }
}

/// How the creators of a global feed behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalCase {
    /// No partitions: the global feed completes in its first round.
    Empty,
    /// The creator fails.
    Failure,
    /// One partition which reads until cancelled, holding no resource.
    Endless,
}

/// Resumes each stream's case from the creator id found in its current state.
pub struct TestPartitionsCreatorFactory {
    resource: Arc<Semaphore>,
    cases: Vec<TestCase>,
    global: GlobalCase,
}

impl TestPartitionsCreatorFactory {
    pub fn new(resource: usize, cases: Vec<TestCase>) -> Self {
        Self {
            resource: Arc::new(Semaphore::new(resource)),
            cases,
            global: GlobalCase::Empty,
        }
    }

    pub fn with_global(mut self, global: GlobalCase) -> Self {
        self.global = global;
        self
    }
}

impl PartitionsCreatorFactory for TestPartitionsCreatorFactory {
    fn make(&self, bootstrap: &FeedBootstrap) -> Option<Box<dyn PartitionsCreator>> {
        let Some(stream) = bootstrap.feed().as_stream() else {
            return Some(Box::new(GlobalCreator(self.global)));
        };
        let case = self.cases.iter().find(|case| case.name == stream.name())?;
        let checkpointed = bootstrap
            .current_state()
            .as_ref()
            .and_then(parse_state)
            .map_or(0, |(creator_id, _)| creator_id);
        let next = case.creator_cases.get(checkpointed as usize)?;
        Some(Box::new(TestPartitionsCreator {
            creator_id: checkpointed + 1,
            case: next.clone(),
            resource: self.resource.clone(),
        }))
    }
}

struct GlobalCreator(GlobalCase);

#[async_trait]
impl PartitionsCreator for GlobalCreator {
    fn try_acquire_resources(&mut self) -> Result<TryAcquireResourcesStatus, ReadError> {
        Ok(TryAcquireResourcesStatus::ReadyToRun)
    }

    async fn run(&mut self) -> Result<Vec<Box<dyn PartitionReader>>, ReadError> {
        match self.0 {
            GlobalCase::Empty => Ok(Vec::new()),
            GlobalCase::Failure => Err(ReadError::fail("some config error")),
            GlobalCase::Endless => Ok(vec![Box::new(EndlessReader)]),
        }
    }

    fn release_resources(&mut self) {}
}

/// Reads until cancelled; would checkpoint a non-null global state.
pub struct EndlessReader;

#[async_trait]
impl PartitionReader for EndlessReader {
    fn try_acquire_resources(&mut self) -> Result<TryAcquireResourcesStatus, ReadError> {
        Ok(TryAcquireResourcesStatus::ReadyToRun)
    }

    async fn run(&mut self, ctx: CancellationToken) -> Result<(), ReadError> {
        ctx.cancelled().await;
        Ok(())
    }

    fn release_resources(&mut self) {}

    fn checkpoint(&mut self) -> PartitionReadCheckpoint {
        PartitionReadCheckpoint::new(json!({"lsn": 42}), 1)
    }

    fn is_unlimited_time(&self) -> bool {
        true
    }
}
