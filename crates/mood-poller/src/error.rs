//! Error types for the poller.

use thiserror::Error;

/// Poller errors. Fetch failures are logged and never stop the poller.
#[derive(Debug, Error)]
pub enum PollError {
    /// Polling period must be non-zero.
    #[error("polling interval must be greater than zero")]
    ZeroInterval,

    /// Request failed or the body could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Bridge answered with something other than 200 or 204.
    #[error("unexpected status: {0}")]
    UnexpectedStatus(u16),

    /// Bridge answered 200 with a body that is not an emotion payload.
    #[error("invalid payload: {0}")]
    Payload(#[from] mood_queue::PayloadError),
}
