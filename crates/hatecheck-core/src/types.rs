//! Core types for hatecheck

use serde::{Deserialize, Serialize};

/// Number of decimal digits kept in reported confidences
pub const CONFIDENCE_DECIMALS: usize = 4;

/// One (label identifier, score) pair emitted by a classifier for one candidate class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawScore {
    /// Classifier label identifier, e.g. `LABEL_1`
    pub label: String,

    /// Probability-like score in `[0, 1]`
    pub score: f32,
}

impl RawScore {
    /// Create a new raw score
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }

    /// Select the highest-scoring entry.
    ///
    /// Ties go to whichever entry the classifier emitted first. Returns `None`
    /// for an empty slice.
    pub fn top(scores: &[RawScore]) -> Option<&RawScore> {
        let mut best: Option<&RawScore> = None;
        for candidate in scores {
            match best {
                Some(current) if candidate.score <= current.score => {}
                _ => best = Some(candidate),
            }
        }
        best
    }
}

/// Round a score to [`CONFIDENCE_DECIMALS`] decimal digits.
///
/// Rounds the exact binary value, ties to even, so `0.03125` becomes `0.0312`.
pub fn round_confidence(score: f32) -> f64 {
    let value = f64::from(score);
    format!("{:.*}", CONFIDENCE_DECIMALS, value)
        .parse()
        .unwrap_or(value)
}

/// Result of classifying a single text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Human-readable label from the label table
    pub label: String,

    /// Top score rounded to four decimals
    pub confidence: f64,

    /// The text exactly as submitted
    pub input_text: String,

    /// Description of the model family that produced the prediction
    pub model_info: String,
}

/// Label and confidence for one item of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub confidence: f64,
}

/// Result of classifying a batch of texts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPrediction {
    /// Per-item results in input order
    pub results: Vec<LabelScore>,

    /// Number of items processed
    pub count: usize,
}

impl BatchPrediction {
    pub fn new(results: Vec<LabelScore>) -> Self {
        let count = results.len();
        Self { results, count }
    }
}
