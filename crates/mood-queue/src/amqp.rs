//! AMQP (RabbitMQ) broker backed by lapin.

use async_trait::async_trait;
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties,
    options::{BasicAckOptions, BasicGetOptions, BasicPublishOptions, QueueDeclareOptions},
    types::FieldTable,
};
use tracing::{debug, info, warn};

use crate::{Broker, QueueChannel, QueueError, QueueMessage};

/// Delivery mode marking a message as persistent.
const PERSISTENT: u8 = 2;

/// Opens channels to a RabbitMQ broker at a connection URL.
pub struct AmqpBroker {
    url: String,
}

impl AmqpBroker {
    /// Create a broker for an `amqp://` or `amqps://` URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The broker URL with credentials masked, for logging.
    pub fn display_url(&self) -> String {
        redact_url(&self.url)
    }
}

/// A connection plus the single channel opened on it.
pub struct AmqpChannel {
    connection: Connection,
    channel: Channel,
}

#[async_trait]
impl Broker for AmqpBroker {
    type Channel = AmqpChannel;

    #[tracing::instrument(skip(self), fields(url = %self.display_url()))]
    async fn open(&self, queue: &str) -> Result<AmqpChannel, QueueError> {
        let connection = Connection::connect(&self.url, ConnectionProperties::default())
            .await
            .map_err(|e| QueueError::Connection(format!("failed to connect to broker: {}", e)))?;

        let channel = match connection.create_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                close_quietly(&connection).await;
                return Err(QueueError::Connection(format!(
                    "failed to create channel: {}",
                    e
                )));
            }
        };

        let declared = channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await;

        match declared {
            Ok(declared) => {
                info!(
                    queue,
                    pending = declared.message_count(),
                    "connected to broker and declared queue"
                );
                Ok(AmqpChannel {
                    connection,
                    channel,
                })
            }
            Err(e) => {
                close_quietly(&connection).await;
                Err(QueueError::Connection(format!(
                    "failed to declare queue '{}': {}",
                    queue, e
                )))
            }
        }
    }
}

#[async_trait]
impl QueueChannel for AmqpChannel {
    fn is_open(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }

    async fn get(&self, queue: &str) -> Result<Option<QueueMessage>, QueueError> {
        let message = self
            .channel
            .basic_get(queue, BasicGetOptions { no_ack: false })
            .await
            .map_err(|e| QueueError::Operation(format!("basic.get on '{}' failed: {}", queue, e)))?;

        Ok(message.map(|m| {
            let delivery = m.delivery;
            QueueMessage {
                delivery_tag: delivery.delivery_tag,
                body: delivery.data,
                redelivered: delivery.redelivered,
            }
        }))
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), QueueError> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| QueueError::Operation(format!("basic.ack {} failed: {}", delivery_tag, e)))
    }

    async fn publish(&self, queue: &str, body: &[u8]) -> Result<(), QueueError> {
        let properties = BasicProperties::default()
            .with_delivery_mode(PERSISTENT)
            .with_content_type("application/json".into());

        let confirm = self
            .channel
            .basic_publish("", queue, BasicPublishOptions::default(), body, properties)
            .await
            .map_err(|e| QueueError::Operation(format!("basic.publish to '{}' failed: {}", queue, e)))?;

        confirm
            .await
            .map_err(|e| QueueError::Operation(format!("publish confirmation failed: {}", e)))?;

        debug!(queue, bytes = body.len(), "published message");
        Ok(())
    }
}

async fn close_quietly(connection: &Connection) {
    if let Err(e) = connection.close(0, "setup failed").await {
        warn!(error = %e, "failed to close broker connection");
    }
}

/// Mask the userinfo part of a connection URL.
fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };

    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{}://***{}", scheme, &rest[at..]),
        None => url.to_string(),
    }
}
