//! Fixed-interval polling loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use mood_queue::EmotionSample;

use crate::{EmotionSource, FetchOutcome, PollError};

/// Reference polling period.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(3000);

/// A poller that has not started yet.
pub struct Poller<S: EmotionSource> {
    source: Arc<S>,
    interval: Duration,
}

impl<S: EmotionSource> Poller<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            interval: DEFAULT_INTERVAL,
        }
    }

    /// Set the polling period. Zero is rejected.
    pub fn with_interval(mut self, interval: Duration) -> Result<Self, PollError> {
        if interval.is_zero() {
            return Err(PollError::ZeroInterval);
        }
        self.interval = interval;
        Ok(self)
    }

    /// Start polling. The first fetch runs immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> PollerHandle {
        let (state_tx, state_rx) = watch::channel(EmotionSample::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run(
            self.source,
            self.interval,
            Arc::new(state_tx),
            shutdown_rx,
        ));

        PollerHandle {
            state: state_rx,
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// A running poller.
///
/// Dropping the handle stops scheduling new fetches, same as `stop`.
pub struct PollerHandle {
    state: watch::Receiver<EmotionSample>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// The current display state.
    pub fn current(&self) -> EmotionSample {
        self.state.borrow().clone()
    }

    /// Watch the display state for replacements.
    pub fn subscribe(&self) -> watch::Receiver<EmotionSample> {
        self.state.clone()
    }

    /// Whether the scheduling loop has exited.
    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop scheduling fetches and wait for the loop to exit.
    ///
    /// A fetch already in flight is not aborted and may still replace the
    /// display state after this returns.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "poller task ended abnormally");
        }
    }
}

async fn run<S: EmotionSource>(
    source: Arc<S>,
    period: Duration,
    state: Arc<watch::Sender<EmotionSample>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!(period_ms = period.as_millis() as u64, "poller started");

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            biased;

            // Also fires when the handle is dropped.
            _ = shutdown_rx.changed() => break,

            _ = interval.tick() => {
                if in_flight.as_ref().is_some_and(|fetch| !fetch.is_finished()) {
                    debug!("previous fetch still pending, skipping tick");
                    continue;
                }

                let source = Arc::clone(&source);
                let state = Arc::clone(&state);
                in_flight = Some(tokio::spawn(async move {
                    fetch_cycle(source.as_ref(), &state).await;
                }));
            }
        }
    }

    info!("poller stopped");
}

/// One fetch. Only a new sample touches the display state.
async fn fetch_cycle<S: EmotionSource>(source: &S, state: &watch::Sender<EmotionSample>) {
    match source.fetch().await {
        Ok(FetchOutcome::Sample(sample)) => {
            debug!(
                emotions = sample.len(),
                dominant = sample.dominant().map(|e| e.label.as_str()),
                "display state replaced"
            );
            state.send_replace(sample);
        }
        Ok(FetchOutcome::Empty) => {
            debug!("no new data");
        }
        Err(e) => {
            warn!(error = %e, "fetch failed, keeping previous state");
        }
    }
}
