//! Error types for the bridge.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use mood_queue::{PayloadError, QueueError};

/// Errors that can occur while serving a bridge request.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Broker unreachable or a channel operation failed.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The dequeued message was not a valid emotion payload. It has been
    /// acknowledged and dropped.
    #[error("malformed message: {0}")]
    Malformed(#[from] PayloadError),
}

impl BridgeError {
    /// HTTP status reported to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            BridgeError::Queue(QueueError::Connection(_)) => StatusCode::SERVICE_UNAVAILABLE,
            BridgeError::Queue(QueueError::Operation(_)) => StatusCode::BAD_GATEWAY,
            BridgeError::Malformed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = self.status();
        error!(status = status.as_u16(), error = %self, "bridge request failed");
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
