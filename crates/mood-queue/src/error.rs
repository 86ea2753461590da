//! Error types for queue access and payload parsing.

use thiserror::Error;

/// Errors that can occur when talking to the broker.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Opening the connection, creating the channel or declaring the queue failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// An operation on an established channel failed.
    #[error("queue operation failed: {0}")]
    Operation(String),
}

/// Errors that can occur when parsing a message body into an emotion payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// Body is not valid JSON or entries are not `{label, score}` objects.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Body is JSON but not one of the accepted shapes.
    #[error("unexpected payload shape: {0}")]
    Shape(String),

    /// A score is not finite or lies outside `[0, 1]`.
    #[error("score for '{label}' out of range: {score}")]
    ScoreOutOfRange { label: String, score: f64 },
}
