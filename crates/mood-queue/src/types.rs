//! Emotion payload types carried on the queue.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::PayloadError;

/// Name of the queue the scorer publishes to.
pub const DEFAULT_QUEUE: &str = "emotions";

/// A single scored emotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emotion {
    pub label: String,
    /// Normalized intensity in `[0, 1]`.
    pub score: f64,
}

impl Emotion {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// An ordered sequence of scored emotions, one per queue message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmotionSample(Vec<Emotion>);

impl EmotionSample {
    pub fn new(emotions: Vec<Emotion>) -> Self {
        Self(emotions)
    }

    /// Build a sample from a `label -> score` map, ordered by label.
    pub fn from_scores<I, K>(scores: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let mut emotions: Vec<Emotion> = scores
            .into_iter()
            .map(|(label, score)| Emotion::new(label, score))
            .collect();
        emotions.sort_by(|a, b| a.label.cmp(&b.label));
        Self(emotions)
    }

    pub fn emotions(&self) -> &[Emotion] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The highest-scoring emotion. The earliest entry wins a tie.
    pub fn dominant(&self) -> Option<&Emotion> {
        self.0.iter().fold(None, |best: Option<&Emotion>, e| match best {
            Some(b) if b.score >= e.score => Some(b),
            _ => Some(e),
        })
    }

    /// Check every score is finite and within `[0, 1]`.
    pub fn validate(&self) -> Result<(), PayloadError> {
        for e in &self.0 {
            if !e.score.is_finite() || !(0.0..=1.0).contains(&e.score) {
                return Err(PayloadError::ScoreOutOfRange {
                    label: e.label.clone(),
                    score: e.score,
                });
            }
        }
        Ok(())
    }
}

/// A parsed message body.
///
/// Keeps the JSON exactly as received so the bridge can hand it to clients
/// unchanged, next to the validated sample extracted from it. Two shapes are
/// accepted:
///
/// - wrapper: `[[{"label": .., "score": ..}, ..], ..]`, sample is element 0
/// - bare: `[{"label": .., "score": ..}, ..]`
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionPayload {
    raw: Value,
    sample: EmotionSample,
}

impl EmotionPayload {
    /// Parse and validate a UTF-8 JSON message body.
    pub fn parse(body: &[u8]) -> Result<Self, PayloadError> {
        let raw: Value = serde_json::from_slice(body)?;
        Self::from_value(raw)
    }

    /// Validate an already-decoded JSON value.
    pub fn from_value(raw: Value) -> Result<Self, PayloadError> {
        let sample = {
            let items = match &raw {
                Value::Array(items) => items,
                other => {
                    return Err(PayloadError::Shape(format!(
                        "expected a JSON array, got {}",
                        value_kind(other)
                    )));
                }
            };

            match items.first() {
                None => EmotionSample::default(),
                Some(first @ Value::Array(_)) => EmotionSample::deserialize(first)?,
                Some(Value::Object(_)) => EmotionSample::deserialize(&raw)?,
                Some(other) => {
                    return Err(PayloadError::Shape(format!(
                        "expected an emotion list or emotion object as first element, got {}",
                        value_kind(other)
                    )));
                }
            }
        };

        sample.validate()?;
        Ok(Self { raw, sample })
    }

    /// Wrap a sample in the wrapper shape the scorer publishes.
    pub fn from_sample(sample: EmotionSample) -> Result<Self, PayloadError> {
        sample.validate()?;
        let raw = Value::Array(vec![serde_json::to_value(&sample)?]);
        Ok(Self { raw, sample })
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn sample(&self) -> &EmotionSample {
        &self.sample
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }

    pub fn into_sample(self) -> EmotionSample {
        self.sample
    }

    /// Serialize the raw JSON for publishing.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PayloadError> {
        Ok(serde_json::to_vec(&self.raw)?)
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
