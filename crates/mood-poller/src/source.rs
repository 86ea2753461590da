//! Where the poller fetches from.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::trace;

use mood_queue::{EmotionPayload, EmotionSample};

use crate::PollError;

/// Result of one successful request to the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// A new sample replaces the display state.
    Sample(EmotionSample),
    /// No new data; the display state stays as it is.
    Empty,
}

/// Something the poller can fetch emotion samples from.
#[async_trait]
pub trait EmotionSource: Send + Sync + 'static {
    async fn fetch(&self) -> Result<FetchOutcome, PollError>;
}

/// Fetches from the bridge's `GET /api/emotion` endpoint.
pub struct HttpSource {
    http: Client,
    url: String,
}

impl HttpSource {
    /// Create a source for the full endpoint URL.
    pub fn new(url: impl Into<String>) -> Result<Self, PollError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EmotionSource for HttpSource {
    async fn fetch(&self) -> Result<FetchOutcome, PollError> {
        let response = self.http.get(&self.url).send().await?;
        let status = response.status();
        trace!(url = %self.url, status = status.as_u16(), "bridge responded");

        match status {
            StatusCode::OK => {
                let body = response.bytes().await?;
                let payload = EmotionPayload::parse(&body)?;
                Ok(FetchOutcome::Sample(payload.into_sample()))
            }
            StatusCode::NO_CONTENT => Ok(FetchOutcome::Empty),
            other => Err(PollError::UnexpectedStatus(other.as_u16())),
        }
    }
}
