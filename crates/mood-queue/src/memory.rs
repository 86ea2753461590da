//! In-process broker with durable-queue semantics.
//!
//! Queues live as long as the `MemoryBroker` (and its clones), independent of
//! any channel, so "restarting" a consumer means opening a new channel on the
//! same broker. Unacknowledged deliveries go back to the head of their queue,
//! flagged as redelivered, when their channel is dropped or disconnected.
//!
//! Failure knobs (`set_reachable`, `fail_next_opens`, `fail_next_operations`,
//! `disconnect_all`) let tests drive connection-error paths.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::{Broker, QueueChannel, QueueError, QueueMessage};

#[derive(Debug, Clone)]
struct Stored {
    body: Vec<u8>,
    redelivered: bool,
}

#[derive(Debug)]
struct Unacked {
    queue: String,
    message: Stored,
}

#[derive(Debug)]
struct State {
    queues: HashMap<String, VecDeque<Stored>>,
    /// Outstanding deliveries keyed by (channel id, delivery tag).
    unacked: HashMap<(u64, u64), Unacked>,
    reachable: bool,
    failures_pending: usize,
    operation_failures_pending: usize,
    generation: u64,
    next_channel_id: u64,
    opens: usize,
}

impl Default for State {
    fn default() -> Self {
        Self {
            queues: HashMap::new(),
            unacked: HashMap::new(),
            reachable: true,
            failures_pending: 0,
            operation_failures_pending: 0,
            generation: 0,
            next_channel_id: 1,
            opens: 0,
        }
    }
}

impl State {
    /// Put a channel's outstanding deliveries back at the head of their queues.
    fn requeue_channel(&mut self, channel_id: u64) {
        let mut tags: Vec<u64> = self
            .unacked
            .keys()
            .filter(|(id, _)| *id == channel_id)
            .map(|(_, tag)| *tag)
            .collect();
        // Highest tag first so the oldest delivery ends up at the very front.
        tags.sort_unstable_by(|a, b| b.cmp(a));

        for tag in tags {
            if let Some(Unacked { queue, mut message }) = self.unacked.remove(&(channel_id, tag)) {
                message.redelivered = true;
                self.queues.entry(queue).or_default().push_front(message);
            }
        }
    }
}

/// An in-memory broker. Clones share the same queues.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    /// Append a message to `queue` as an external producer would.
    pub fn enqueue(&self, queue: &str, body: impl Into<Vec<u8>>) {
        self.state()
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back(Stored {
                body: body.into(),
                redelivered: false,
            });
    }

    /// Number of messages ready for delivery on `queue`.
    pub fn pending(&self, queue: &str) -> usize {
        self.state().queues.get(queue).map_or(0, VecDeque::len)
    }

    /// Number of delivered but unacknowledged messages across all channels.
    pub fn unacked(&self) -> usize {
        self.state().unacked.len()
    }

    /// Number of channels successfully opened so far.
    pub fn opens(&self) -> usize {
        self.state().opens
    }

    /// Make every subsequent `open` fail (or succeed again).
    pub fn set_reachable(&self, reachable: bool) {
        self.state().reachable = reachable;
    }

    /// Make the next `count` calls to `open` fail.
    pub fn fail_next_opens(&self, count: usize) {
        self.state().failures_pending = count;
    }

    /// Make the next `count` channel operations fail while the channel stays open.
    pub fn fail_next_operations(&self, count: usize) {
        self.state().operation_failures_pending = count;
    }

    /// Drop every live channel, as a broker restart would.
    pub fn disconnect_all(&self) {
        let mut state = self.state();
        let channel_ids: Vec<u64> = state.unacked.keys().map(|(id, _)| *id).collect();
        for id in channel_ids {
            state.requeue_channel(id);
        }
        state.generation += 1;
        debug!(generation = state.generation, "memory broker disconnected all channels");
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    type Channel = MemoryChannel;

    async fn open(&self, queue: &str) -> Result<MemoryChannel, QueueError> {
        let mut state = self.state();

        if !state.reachable {
            return Err(QueueError::Connection("broker unreachable".to_string()));
        }
        if state.failures_pending > 0 {
            state.failures_pending -= 1;
            return Err(QueueError::Connection(
                "connection refused by broker".to_string(),
            ));
        }

        state.queues.entry(queue.to_string()).or_default();
        state.opens += 1;

        let id = state.next_channel_id;
        state.next_channel_id += 1;

        Ok(MemoryChannel {
            state: Arc::clone(&self.state),
            id,
            generation: state.generation,
            next_tag: Mutex::new(1),
        })
    }
}

/// A channel on a `MemoryBroker`.
#[derive(Debug)]
pub struct MemoryChannel {
    state: Arc<Mutex<State>>,
    id: u64,
    generation: u64,
    next_tag: Mutex<u64>,
}

impl MemoryChannel {
    fn live_state(&self) -> Result<MutexGuard<'_, State>, QueueError> {
        let mut state = lock(&self.state);
        if state.generation != self.generation {
            return Err(QueueError::Operation("channel closed".to_string()));
        }
        if state.operation_failures_pending > 0 {
            state.operation_failures_pending -= 1;
            return Err(QueueError::Operation("channel operation failed".to_string()));
        }
        Ok(state)
    }
}

#[async_trait]
impl QueueChannel for MemoryChannel {
    fn is_open(&self) -> bool {
        lock(&self.state).generation == self.generation
    }

    async fn get(&self, queue: &str) -> Result<Option<QueueMessage>, QueueError> {
        let mut state = self.live_state()?;

        let Some(pending) = state.queues.get_mut(queue) else {
            return Err(QueueError::Operation(format!(
                "NOT_FOUND - no queue '{}'",
                queue
            )));
        };

        let Some(message) = pending.pop_front() else {
            return Ok(None);
        };

        let delivery_tag = {
            let mut next = lock(&self.next_tag);
            let tag = *next;
            *next += 1;
            tag
        };

        let delivered = QueueMessage {
            delivery_tag,
            body: message.body.clone(),
            redelivered: message.redelivered,
        };
        state.unacked.insert(
            (self.id, delivery_tag),
            Unacked {
                queue: queue.to_string(),
                message,
            },
        );

        Ok(Some(delivered))
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), QueueError> {
        let mut state = self.live_state()?;
        match state.unacked.remove(&(self.id, delivery_tag)) {
            Some(_) => Ok(()),
            None => Err(QueueError::Operation(format!(
                "PRECONDITION_FAILED - unknown delivery tag {}",
                delivery_tag
            ))),
        }
    }

    async fn publish(&self, queue: &str, body: &[u8]) -> Result<(), QueueError> {
        let mut state = self.live_state()?;
        state
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back(Stored {
                body: body.to_vec(),
                redelivered: false,
            });
        Ok(())
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        lock(&self.state).requeue_channel(self.id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
