//! Lazily-opened, process-lifetime channel to the target queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{Broker, EmotionPayload, QueueChannel, QueueError};

/// How long one connect, channel setup and declare may take.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the single channel a process uses to reach its queue.
///
/// The channel is opened on first use and cached. A failed open leaves the
/// cache empty so the next call starts over; a channel the broker has closed
/// is dropped and replaced on the next call. Opening is bounded by a
/// timeout, since callers queue behind the open.
pub struct ConnectionManager<B: Broker> {
    broker: B,
    queue: String,
    open_timeout: Duration,
    channel: Mutex<Option<Arc<B::Channel>>>,
}

impl<B: Broker> ConnectionManager<B> {
    pub fn new(broker: B, queue: impl Into<String>) -> Self {
        Self {
            broker,
            queue: queue.into(),
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            channel: Mutex::new(None),
        }
    }

    /// Set the limit on opening a channel.
    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Name of the queue this manager reads from.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    /// Return the cached channel, opening one first if needed.
    ///
    /// Concurrent callers wait on the same lock, so at most one connection
    /// attempt is in progress and at most one channel is ever cached.
    pub async fn get_channel(&self) -> Result<Arc<B::Channel>, QueueError> {
        let mut cached = self.channel.lock().await;

        if let Some(channel) = cached.as_ref() {
            if channel.is_open() {
                return Ok(Arc::clone(channel));
            }
            warn!(queue = %self.queue, "cached channel closed, reconnecting");
            *cached = None;
        }

        debug!(queue = %self.queue, "opening broker channel");
        let opened = tokio::time::timeout(self.open_timeout, self.broker.open(&self.queue))
            .await
            .map_err(|_| {
                QueueError::Connection(format!(
                    "timed out after {}ms opening channel to queue '{}'",
                    self.open_timeout.as_millis(),
                    self.queue
                ))
            })?;
        let channel = Arc::new(opened?);
        *cached = Some(Arc::clone(&channel));
        info!(queue = %self.queue, "broker channel ready");

        Ok(channel)
    }

    /// Forget the cached channel so the next call reconnects.
    pub async fn reset(&self) {
        if self.channel.lock().await.take().is_some() {
            info!(queue = %self.queue, "dropped cached broker channel");
        }
    }

    /// Whether a channel is currently cached.
    pub async fn is_connected(&self) -> bool {
        self.channel.lock().await.is_some()
    }

    /// Publish a payload to the managed queue.
    pub async fn publish(&self, payload: &EmotionPayload) -> Result<(), QueueError> {
        let body = payload
            .to_bytes()
            .map_err(|e| QueueError::Operation(format!("failed to encode payload: {}", e)))?;
        let channel = self.get_channel().await?;
        channel.publish(&self.queue, &body).await
    }
}
