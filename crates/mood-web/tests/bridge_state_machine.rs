//! Stateful property testing for the dequeue bridge.
//!
//! Uses proptest-state-machine to drive a `Bridge` over a `MemoryBroker`
//! against a reference FIFO model. The model tracks:
//!
//! - Pending messages in enqueue order (valid or malformed)
//! - Whether the broker accepts new connections
//! - Whether the bridge currently holds an open channel
//!
//! Every dequeue must return exactly what the model predicts: the oldest
//! pending message once, "empty" when nothing is pending, a connection error
//! only when no channel is cached and the broker is down.

use std::collections::VecDeque;
use std::sync::Arc;

use proptest::prelude::*;
use proptest_state_machine::{ReferenceStateMachine, StateMachineTest, prop_state_machine};
use tokio::runtime::Runtime;

use mood_queue::{
    ConnectionManager, Emotion, EmotionPayload, EmotionSample, MemoryBroker, PayloadError,
    QueueError,
};
use mood_web::{Bridge, BridgeError};

const QUEUE: &str = "emotions";

const LABELS: [&str; 7] = [
    "anger", "disgust", "fear", "joy", "neutral", "sadness", "surprise",
];

/// A message as the producer published it.
#[derive(Debug, Clone, PartialEq)]
pub enum Published {
    Valid(EmotionSample),
    Malformed,
}

/// Operations against the bridge and its broker.
#[derive(Debug, Clone)]
pub enum BridgeOperation {
    /// Producer publishes a valid sample.
    Enqueue(EmotionSample),
    /// Producer publishes a body that is not an emotion payload.
    EnqueueMalformed,
    /// Client calls the bridge once.
    Dequeue,
    /// Broker stops accepting connections.
    BrokerDown,
    /// Broker accepts connections again.
    BrokerUp,
    /// Broker drops every live channel.
    Disconnect,
}

/// What one dequeue should produce.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Sample(EmotionSample),
    Empty,
    Malformed,
    ConnectionFailed,
}

/// Reference model for the bridge.
#[derive(Clone, Debug)]
pub struct BridgeModel {
    pub pending: VecDeque<Published>,
    pub reachable: bool,
    pub connected: bool,
    /// Outcome predicted for the most recent `Dequeue`.
    pub last_outcome: Option<Outcome>,
}

impl Default for BridgeModel {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            reachable: true,
            connected: false,
            last_outcome: None,
        }
    }
}

fn sample_strategy() -> impl Strategy<Value = EmotionSample> {
    prop::collection::vec((0..LABELS.len(), 0u32..=1000u32), 0..4).prop_map(|entries| {
        EmotionSample::new(
            entries
                .into_iter()
                .map(|(i, milli)| Emotion::new(LABELS[i], f64::from(milli) / 1000.0))
                .collect(),
        )
    })
}

impl ReferenceStateMachine for BridgeModel {
    type State = Self;
    type Transition = BridgeOperation;

    fn init_state() -> BoxedStrategy<Self::State> {
        Just(Self::default()).boxed()
    }

    fn transitions(_state: &Self::State) -> BoxedStrategy<Self::Transition> {
        prop_oneof![
            4 => sample_strategy().prop_map(BridgeOperation::Enqueue),
            1 => Just(BridgeOperation::EnqueueMalformed),
            5 => Just(BridgeOperation::Dequeue),
            1 => Just(BridgeOperation::BrokerDown),
            1 => Just(BridgeOperation::BrokerUp),
            1 => Just(BridgeOperation::Disconnect),
        ]
        .boxed()
    }

    fn apply(mut state: Self::State, transition: &Self::Transition) -> Self::State {
        match transition {
            BridgeOperation::Enqueue(sample) => {
                state.pending.push_back(Published::Valid(sample.clone()));
            }
            BridgeOperation::EnqueueMalformed => {
                state.pending.push_back(Published::Malformed);
            }
            BridgeOperation::Dequeue => {
                let outcome = if !state.connected && !state.reachable {
                    Outcome::ConnectionFailed
                } else {
                    state.connected = true;
                    match state.pending.pop_front() {
                        None => Outcome::Empty,
                        Some(Published::Valid(sample)) => Outcome::Sample(sample),
                        Some(Published::Malformed) => Outcome::Malformed,
                    }
                };
                state.last_outcome = Some(outcome);
            }
            BridgeOperation::BrokerDown => state.reachable = false,
            BridgeOperation::BrokerUp => state.reachable = true,
            BridgeOperation::Disconnect => state.connected = false,
        }
        state
    }
}

/// Test harness wrapping a real bridge over an in-memory broker.
pub struct BridgeTestHarness {
    runtime: Runtime,
    broker: MemoryBroker,
    bridge: Arc<Bridge<MemoryBroker>>,
}

impl BridgeTestHarness {
    fn new() -> Self {
        let runtime = Runtime::new().expect("Failed to create tokio runtime");
        let broker = MemoryBroker::new();
        let bridge = Arc::new(Bridge::new(ConnectionManager::new(broker.clone(), QUEUE)));
        Self {
            runtime,
            broker,
            bridge,
        }
    }

    fn dequeue(&self) -> Outcome {
        match self.runtime.block_on(self.bridge.dequeue_one()) {
            Ok(Some(payload)) => Outcome::Sample(payload.into_sample()),
            Ok(None) => Outcome::Empty,
            Err(BridgeError::Malformed(_)) => Outcome::Malformed,
            Err(BridgeError::Queue(QueueError::Connection(_))) => Outcome::ConnectionFailed,
            Err(e) => panic!("unexpected bridge error: {}", e),
        }
    }

    fn apply_operation(&self, op: &BridgeOperation, model: &BridgeModel) {
        match op {
            BridgeOperation::Enqueue(sample) => {
                let payload = EmotionPayload::from_sample(sample.clone())
                    .expect("generated scores are in range");
                let body = payload.to_bytes().expect("payload serializes");
                self.broker.enqueue(QUEUE, body);
            }
            BridgeOperation::EnqueueMalformed => {
                self.broker.enqueue(QUEUE, "{\"label\": \"joy\"");
            }
            BridgeOperation::Dequeue => {
                let actual = self.dequeue();
                assert_eq!(
                    Some(&actual),
                    model.last_outcome.as_ref(),
                    "dequeue mismatch: actual {:?} vs model {:?}",
                    actual,
                    model.last_outcome
                );
            }
            BridgeOperation::BrokerDown => self.broker.set_reachable(false),
            BridgeOperation::BrokerUp => self.broker.set_reachable(true),
            BridgeOperation::Disconnect => self.broker.disconnect_all(),
        }
    }

    fn verify_invariants(&self, model: &BridgeModel) {
        // Invariant 1: nothing is left unacknowledged between requests
        assert_eq!(self.broker.unacked(), 0, "bridge left a delivery unacked");

        // Invariant 2: queue depth matches model
        assert_eq!(
            self.broker.pending(QUEUE),
            model.pending.len(),
            "pending mismatch"
        );
    }
}

impl StateMachineTest for BridgeTestHarness {
    type SystemUnderTest = Self;
    type Reference = BridgeModel;

    fn init_test(
        _ref_state: &<Self::Reference as ReferenceStateMachine>::State,
    ) -> Self::SystemUnderTest {
        Self::new()
    }

    fn apply(
        state: Self::SystemUnderTest,
        ref_state: &<Self::Reference as ReferenceStateMachine>::State,
        transition: <Self::Reference as ReferenceStateMachine>::Transition,
    ) -> Self::SystemUnderTest {
        state.apply_operation(&transition, ref_state);
        state.verify_invariants(ref_state);
        state
    }

    fn check_invariants(
        state: &Self::SystemUnderTest,
        ref_state: &<Self::Reference as ReferenceStateMachine>::State,
    ) {
        state.verify_invariants(ref_state);
    }
}

prop_state_machine! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 10000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn bridge_state_machine_test(sequential 1..60 => BridgeTestHarness);
}

// Additional targeted tests

#[test]
fn test_n_messages_returned_once_in_order() {
    let harness = BridgeTestHarness::new();
    let samples: Vec<EmotionSample> = LABELS
        .iter()
        .map(|label| EmotionSample::new(vec![Emotion::new(*label, 0.5)]))
        .collect();

    for sample in &samples {
        let payload = EmotionPayload::from_sample(sample.clone()).unwrap();
        harness.broker.enqueue(QUEUE, payload.to_bytes().unwrap());
    }

    for sample in &samples {
        assert_eq!(harness.dequeue(), Outcome::Sample(sample.clone()));
    }
    assert_eq!(harness.dequeue(), Outcome::Empty);
}

#[test]
fn test_acknowledged_message_not_returned_after_reconnect() {
    let broker = MemoryBroker::new();
    broker.enqueue(QUEUE, r#"[[{"label":"joy","score":0.8}]]"#);
    let runtime = Runtime::new().unwrap();

    let first = Bridge::new(ConnectionManager::new(broker.clone(), QUEUE));
    assert!(runtime.block_on(first.dequeue_one()).unwrap().is_some());
    drop(first);

    // Restarted bridge process, same durable queue.
    broker.disconnect_all();
    let restarted = Bridge::new(ConnectionManager::new(broker.clone(), QUEUE));
    assert!(runtime.block_on(restarted.dequeue_one()).unwrap().is_none());
}

#[test]
fn test_malformed_shapes_are_rejected() {
    for body in [&b"null"[..], b"{}", b"[\"joy\"]", b"[[{\"label\":\"joy\",\"score\":-0.1}]]"] {
        let err = EmotionPayload::parse(body).unwrap_err();
        assert!(
            matches!(
                err,
                PayloadError::Shape(_) | PayloadError::ScoreOutOfRange { .. }
            ),
            "unexpected error for {:?}: {:?}",
            String::from_utf8_lossy(body),
            err
        );
    }
}
