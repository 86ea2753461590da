//! Broker seam.
//!
//! A `Broker` knows how to open a channel with the target queue declared.
//! A `QueueChannel` is the session the connection manager caches and the
//! bridge reads through.

use async_trait::async_trait;

use crate::QueueError;

/// A message taken from the queue and not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Channel-scoped tag used to acknowledge this delivery.
    pub delivery_tag: u64,
    /// Raw message body.
    pub body: Vec<u8>,
    /// Whether the broker delivered this message before without an ack.
    pub redelivered: bool,
}

/// Opens channels to a queue broker.
#[async_trait]
pub trait Broker: Send + Sync + 'static {
    type Channel: QueueChannel;

    /// Connect, create a channel and declare `queue` as durable.
    ///
    /// Declaring is idempotent, so producer and consumer may start in any order.
    async fn open(&self, queue: &str) -> Result<Self::Channel, QueueError>;
}

/// A live session to the broker.
#[async_trait]
pub trait QueueChannel: Send + Sync + 'static {
    /// Whether the channel can still be used.
    fn is_open(&self) -> bool;

    /// Take the oldest pending message without waiting, in manual-ack mode.
    ///
    /// Returns `None` when the queue is empty.
    async fn get(&self, queue: &str) -> Result<Option<QueueMessage>, QueueError>;

    /// Acknowledge a delivery, removing it from the queue for good.
    async fn ack(&self, delivery_tag: u64) -> Result<(), QueueError>;

    /// Publish a persistent message to `queue` through the default exchange.
    async fn publish(&self, queue: &str, body: &[u8]) -> Result<(), QueueError>;
}
