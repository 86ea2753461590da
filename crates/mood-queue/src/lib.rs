//! Durable queue access for mood.
//!
//! This crate provides:
//! - The emotion payload model carried by queue messages
//! - A broker seam (`Broker`/`QueueChannel`) with an AMQP implementation
//!   and an in-memory implementation
//! - A `ConnectionManager` owning the single lazily-opened channel

mod error;
mod types;

#[cfg(feature = "amqp")]
pub mod amqp;
mod broker;
mod connection;
pub mod memory;

pub use broker::{Broker, QueueChannel, QueueMessage};
pub use connection::{ConnectionManager, DEFAULT_OPEN_TIMEOUT};
pub use error::{PayloadError, QueueError};
pub use types::{DEFAULT_QUEUE, Emotion, EmotionPayload, EmotionSample};

#[cfg(feature = "amqp")]
pub use amqp::AmqpBroker;
pub use memory::MemoryBroker;
