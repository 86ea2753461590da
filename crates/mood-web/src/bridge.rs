//! The dequeue protocol behind `GET /api/emotion`.

use tracing::{debug, info, warn};

use mood_queue::{Broker, ConnectionManager, EmotionPayload, QueueChannel};

use crate::BridgeError;

/// Turns one queue read into one request/response cycle.
pub struct Bridge<B: Broker> {
    connections: ConnectionManager<B>,
}

impl<B: Broker> Bridge<B> {
    pub fn new(connections: ConnectionManager<B>) -> Self {
        Self { connections }
    }

    pub fn connections(&self) -> &ConnectionManager<B> {
        &self.connections
    }

    /// Take at most one message off the queue.
    ///
    /// Returns `Ok(None)` when the queue is empty. A message is acknowledged
    /// before this returns, so it counts as consumed even if the caller never
    /// delivers it. A message that fails to parse is acknowledged too and
    /// reported as `BridgeError::Malformed`; it is not redelivered.
    ///
    /// On a channel error the cached channel is dropped so the next call
    /// reconnects.
    #[tracing::instrument(skip(self), fields(queue = %self.connections.queue()))]
    pub async fn dequeue_one(&self) -> Result<Option<EmotionPayload>, BridgeError> {
        let queue = self.connections.queue();
        let channel = self.connections.get_channel().await?;

        let message = match channel.get(queue).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!("no pending message");
                return Ok(None);
            }
            Err(e) => {
                self.connections.reset().await;
                return Err(e.into());
            }
        };

        if message.redelivered {
            info!(delivery_tag = message.delivery_tag, "message was redelivered");
        }

        let parsed = EmotionPayload::parse(&message.body);

        if let Err(e) = channel.ack(message.delivery_tag).await {
            self.connections.reset().await;
            return Err(e.into());
        }

        match parsed {
            Ok(payload) => {
                debug!(
                    delivery_tag = message.delivery_tag,
                    emotions = payload.sample().len(),
                    "dequeued and acknowledged message"
                );
                Ok(Some(payload))
            }
            Err(e) => {
                warn!(
                    delivery_tag = message.delivery_tag,
                    bytes = message.body.len(),
                    error = %e,
                    "dropped malformed message"
                );
                Err(BridgeError::Malformed(e))
            }
        }
    }
}
