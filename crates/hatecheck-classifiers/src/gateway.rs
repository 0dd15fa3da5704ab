//! Classification gateway
//!
//! Validates requests, invokes the shared [`TextClassifier`] and reduces its
//! raw per-label scores to the single best label.

use crate::classifier::TextClassifier;
use hatecheck_core::types::round_confidence;
use hatecheck_core::{BatchPrediction, Error, LabelScore, LabelTable, Prediction, RawScore, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Maximum number of tokens the classifier considers per input
pub const DEFAULT_MAX_LENGTH: usize = 512;

/// Upper bound on how many inputs the classifier processes together
pub const DEFAULT_MAX_BATCH_SIZE: usize = 8;

/// Static description reported alongside single predictions
pub const DEFAULT_MODEL_INFO: &str = "Transformer-based hate speech classifier";

const EMPTY_TEXT_MESSAGE: &str = "Input text is empty.";
const EMPTY_BATCH_MESSAGE: &str = "No texts provided.";

/// Gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Truncation length passed to the classifier
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Cap on the classifier's internal batch size
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Model family description echoed in single predictions
    #[serde(default = "default_model_info")]
    pub model_info: String,
}

fn default_max_length() -> usize {
    DEFAULT_MAX_LENGTH
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

fn default_model_info() -> String {
    DEFAULT_MODEL_INFO.to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            max_batch_size: default_max_batch_size(),
            model_info: default_model_info(),
        }
    }
}

impl GatewayConfig {
    /// Check the settings are usable
    pub fn validate(&self) -> Result<()> {
        if self.max_length == 0 {
            return Err(Error::config("max_length must be greater than zero"));
        }
        if self.max_batch_size == 0 {
            return Err(Error::config("max_batch_size must be greater than zero"));
        }
        Ok(())
    }
}

/// Request/response transform around an injected classifier
#[derive(Clone)]
pub struct ClassificationGateway {
    classifier: Arc<dyn TextClassifier>,
    labels: LabelTable,
    config: GatewayConfig,
}

impl ClassificationGateway {
    /// Create a gateway with default settings
    pub fn new(classifier: Arc<dyn TextClassifier>, labels: LabelTable) -> Self {
        Self {
            classifier,
            labels,
            config: GatewayConfig::default(),
        }
    }

    /// Replace the gateway settings
    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Classify a single text
    pub async fn predict(&self, text: &str) -> Result<Prediction> {
        if text.trim().is_empty() {
            return Err(Error::invalid_input(EMPTY_TEXT_MESSAGE));
        }

        debug!(
            classifier = self.classifier.name(),
            chars = text.len(),
            "classifying text"
        );

        let scores = self
            .classifier
            .classify(text, self.config.max_length)
            .await?;
        let top = self.reduce(&scores)?;

        Ok(Prediction {
            label: top.label,
            confidence: top.confidence,
            input_text: text.to_string(),
            model_info: self.config.model_info.clone(),
        })
    }

    /// Classify an ordered batch of texts in one classifier call
    pub async fn batch_predict(&self, texts: &[String]) -> Result<BatchPrediction> {
        if texts.is_empty() {
            return Err(Error::invalid_input(EMPTY_BATCH_MESSAGE));
        }

        let batch_size = self.batch_size_for(texts.len());
        debug!(
            classifier = self.classifier.name(),
            items = texts.len(),
            batch_size,
            "classifying batch"
        );

        let per_item = self
            .classifier
            .classify_batch(texts, self.config.max_length, batch_size)
            .await?;

        if per_item.len() != texts.len() {
            return Err(Error::classifier(format!(
                "classifier returned {} results for {} inputs",
                per_item.len(),
                texts.len()
            )));
        }

        let results = per_item
            .iter()
            .map(|scores| self.reduce(scores))
            .collect::<Result<Vec<_>>>()?;

        Ok(BatchPrediction::new(results))
    }

    /// Internal batch size used for `count` inputs
    pub fn batch_size_for(&self, count: usize) -> usize {
        self.config.max_batch_size.min(count)
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Keep the top-scoring label, resolved through the label table
    fn reduce(&self, scores: &[RawScore]) -> Result<LabelScore> {
        if let Some(bad) = scores.iter().find(|s| !s.score.is_finite()) {
            return Err(Error::classifier(format!(
                "non-finite score {} for label '{}'",
                bad.score, bad.label
            )));
        }

        let top = RawScore::top(scores)
            .ok_or_else(|| Error::classifier("classifier returned no scores"))?;
        let label = self.labels.resolve(&top.label)?;

        Ok(LabelScore {
            label: label.to_string(),
            confidence: round_confidence(top.score),
        })
    }
}
