//! `publish` command: push one emotion sample onto the queue.

use std::collections::BTreeMap;
use std::path::Path;

use miette::Result;
use serde::Deserialize;
use tracing::info;

use mood_queue::{AmqpBroker, ConnectionManager, Emotion, EmotionPayload, EmotionSample};

/// Errors parsing a `label=score` argument.
#[derive(Debug, thiserror::Error)]
pub enum EmotionArgError {
    #[error("expected LABEL=SCORE, got '{0}'")]
    MissingSeparator(String),

    #[error("empty label in '{0}'")]
    EmptyLabel(String),

    #[error("invalid score '{score}' for '{label}'")]
    InvalidScore { label: String, score: String },
}

/// The part of the scorer's result document we publish.
#[derive(Debug, Deserialize)]
struct ScorerResult {
    emotion: BTreeMap<String, f64>,
}

/// Parse `label=score` into its parts. Range checks happen when the payload is built.
pub fn parse_emotion_arg(arg: &str) -> Result<(String, f64), EmotionArgError> {
    let (label, score) = arg
        .split_once('=')
        .ok_or_else(|| EmotionArgError::MissingSeparator(arg.to_string()))?;

    let label = label.trim();
    if label.is_empty() {
        return Err(EmotionArgError::EmptyLabel(arg.to_string()));
    }

    let score = score
        .trim()
        .parse::<f64>()
        .map_err(|_| EmotionArgError::InvalidScore {
            label: label.to_string(),
            score: score.to_string(),
        })?;

    Ok((label.to_string(), score))
}

/// Keep argument order; the scorer's own ordering is not meaningful.
pub fn sample_from_args(emotions: Vec<(String, f64)>) -> EmotionSample {
    EmotionSample::new(
        emotions
            .into_iter()
            .map(|(label, score)| Emotion::new(label, score))
            .collect(),
    )
}

pub fn load_result_file(path: &Path) -> Result<EmotionSample> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| miette::miette!("failed to read {}: {}", path.display(), e))?;
    sample_from_result(&contents)
        .map_err(|e| miette::miette!("invalid result file {}: {}", path.display(), e))
}

fn sample_from_result(contents: &str) -> Result<EmotionSample, serde_json::Error> {
    let result: ScorerResult = serde_json::from_str(contents)?;
    Ok(EmotionSample::from_scores(result.emotion))
}

pub async fn run(rabbit_url: &str, queue: &str, sample: EmotionSample) -> Result<()> {
    let payload = EmotionPayload::from_sample(sample).map_err(|e| miette::miette!("{}", e))?;

    let connections = ConnectionManager::new(AmqpBroker::new(rabbit_url), queue);
    connections
        .publish(&payload)
        .await
        .map_err(|e| miette::miette!("failed to publish: {}", e))?;

    info!(
        queue,
        emotions = payload.sample().len(),
        dominant = payload.sample().dominant().map(|e| e.label.as_str()),
        "published sample"
    );
    Ok(())
}
