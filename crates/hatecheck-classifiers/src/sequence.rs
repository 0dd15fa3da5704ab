//! Candle-backed transformer sequence classifier

use crate::classifier::TextClassifier;
use async_trait::async_trait;
use candle_core::{DType, Device, IndexOp, Tensor, D};
use candle_nn::{Linear, Module};
use candle_transformers::models::bert::BertModel;
use candle_transformers::models::distilbert::DistilBertModel;
use candle_transformers::models::xlm_roberta::XLMRobertaForSequenceClassification;
use hatecheck_core::{Error, RawScore, Result};
use std::sync::Arc;
use std::time::Instant;
use tokenizers::{Encoding, PaddingDirection, PostProcessor, Tokenizer, TruncationDirection};

/// Transformer classifier that scores every class of the loaded model.
///
/// Cloning is cheap; the weights and tokenizer sit behind an `Arc`. Forward
/// passes run on tokio's blocking pool.
#[derive(Clone)]
pub struct SequenceClassifier {
    name: String,
    model: Arc<SequenceModel>,
}

impl SequenceClassifier {
    pub(crate) fn new(name: String, model: SequenceModel) -> Self {
        Self {
            name,
            model: Arc::new(model),
        }
    }

    /// Label identifiers in class-index order
    pub fn label_ids(&self) -> &[String] {
        &self.model.label_ids
    }

    /// Device the weights live on
    pub fn device(&self) -> &Device {
        &self.model.device
    }

    /// Precision of the loaded weights
    pub fn dtype(&self) -> DType {
        self.model.dtype
    }

    async fn run_blocking(
        &self,
        texts: Vec<String>,
        truncate_at: usize,
        batch_size: usize,
    ) -> Result<Vec<Vec<RawScore>>> {
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || model.score_all(&texts, truncate_at, batch_size))
            .await
            .map_err(|e| Error::classifier(format!("Inference task failed: {}", e)))?
    }
}

#[async_trait]
impl TextClassifier for SequenceClassifier {
    async fn classify(&self, text: &str, truncate_at: usize) -> Result<Vec<RawScore>> {
        let mut scores = self
            .run_blocking(vec![text.to_string()], truncate_at, 1)
            .await?;
        scores
            .pop()
            .ok_or_else(|| Error::classifier("Model produced no output"))
    }

    async fn classify_batch(
        &self,
        texts: &[String],
        truncate_at: usize,
        batch_size: usize,
    ) -> Result<Vec<Vec<RawScore>>> {
        self.run_blocking(texts.to_vec(), truncate_at, batch_size)
            .await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Architecture-specific weights
pub(crate) enum Backbone {
    Bert {
        model: BertModel,
        pooler: Option<Linear>,
        classifier: Linear,
    },
    DistilBert {
        model: DistilBertModel,
        pre_classifier: Option<Linear>,
        classifier: Linear,
    },
    XlmRoberta(XLMRobertaForSequenceClassification),
}

pub(crate) struct SequenceModel {
    pub(crate) tokenizer: Tokenizer,
    pub(crate) backbone: Backbone,
    pub(crate) device: Device,
    pub(crate) dtype: DType,
    pub(crate) label_ids: Vec<String>,
    pub(crate) pad_id: u32,
    pub(crate) pad_token: String,
}

/// Tensors for one padded chunk of inputs
struct BatchInputs {
    input_ids: Tensor,
    token_type_ids: Tensor,
    attention_mask: Tensor,
}

/// Per-row class probabilities, computed in f32 whatever the weights' precision
fn probabilities(logits: &Tensor) -> candle_core::Result<Vec<Vec<f32>>> {
    let logits = logits.to_dtype(DType::F32)?;
    candle_nn::ops::softmax(&logits, D::Minus1)?.to_vec2::<f32>()
}

fn ml_error<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> Error {
    move |e| Error::classifier(format!("{}: {}", context, e))
}

impl SequenceModel {
    fn score_all(
        &self,
        texts: &[String],
        truncate_at: usize,
        batch_size: usize,
    ) -> Result<Vec<Vec<RawScore>>> {
        let start = Instant::now();
        let mut results = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(batch_size.max(1)) {
            let encodings = chunk
                .iter()
                .map(|text| self.encode(text, truncate_at))
                .collect::<Result<Vec<_>>>()?;
            let probabilities = self.forward(encodings)?;

            for row in probabilities {
                results.push(self.to_raw_scores(row)?);
            }
        }

        tracing::debug!(
            inputs = texts.len(),
            batch_size,
            latency_us = start.elapsed().as_micros() as u64,
            "sequence classification complete"
        );

        Ok(results)
    }

    /// Tokenize so the final sequence, special tokens included, fits in `truncate_at`
    fn encode(&self, text: &str, truncate_at: usize) -> Result<Encoding> {
        let special_tokens = self
            .tokenizer
            .get_post_processor()
            .map(|processor| processor.added_tokens(false))
            .unwrap_or(0);

        let mut encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(ml_error("Tokenization failed"))?;

        encoding.truncate(
            truncate_at.saturating_sub(special_tokens),
            0,
            TruncationDirection::Right,
        );
        let _ = encoding.take_overflowing();

        self.tokenizer
            .post_process(encoding, None, true)
            .map_err(ml_error("Failed to add special tokens"))
    }

    fn batch_inputs(&self, mut encodings: Vec<Encoding>) -> Result<BatchInputs> {
        let longest = encodings.iter().map(|e| e.len()).max().unwrap_or(0);
        for encoding in &mut encodings {
            encoding.pad(
                longest,
                self.pad_id,
                0,
                &self.pad_token,
                PaddingDirection::Right,
            );
        }

        let stack = |rows: Vec<Tensor>, what: &'static str| -> Result<Tensor> {
            Tensor::stack(&rows, 0).map_err(ml_error(what))
        };

        let ids = encodings
            .iter()
            .map(|e| Tensor::new(e.get_ids(), &self.device))
            .collect::<candle_core::Result<Vec<_>>>()
            .map_err(ml_error("Failed to create input tensor"))?;
        let type_ids = encodings
            .iter()
            .map(|e| Tensor::new(e.get_type_ids(), &self.device))
            .collect::<candle_core::Result<Vec<_>>>()
            .map_err(ml_error("Failed to create token type tensor"))?;
        let masks = encodings
            .iter()
            .map(|e| Tensor::new(e.get_attention_mask(), &self.device))
            .collect::<candle_core::Result<Vec<_>>>()
            .map_err(ml_error("Failed to create attention mask"))?;

        Ok(BatchInputs {
            input_ids: stack(ids, "Failed to stack input ids")?,
            token_type_ids: stack(type_ids, "Failed to stack token type ids")?,
            attention_mask: stack(masks, "Failed to stack attention mask")?,
        })
    }

    /// One forward pass over a chunk; returns a probability row per input
    fn forward(&self, encodings: Vec<Encoding>) -> Result<Vec<Vec<f32>>> {
        let inputs = self.batch_inputs(encodings)?;

        let logits = match &self.backbone {
            Backbone::Bert {
                model,
                pooler,
                classifier,
            } => {
                let hidden_states = model
                    .forward(
                        &inputs.input_ids,
                        &inputs.token_type_ids,
                        Some(&inputs.attention_mask),
                    )
                    .map_err(ml_error("Model forward pass failed"))?;

                let cls = hidden_states
                    .i((.., 0, ..))
                    .map_err(ml_error("Failed to get CLS token"))?;

                let pooled = match pooler {
                    Some(dense) => dense
                        .forward(&cls)
                        .and_then(|t| t.tanh())
                        .map_err(ml_error("Pooler failed"))?,
                    None => cls,
                };

                classifier
                    .forward(&pooled)
                    .map_err(ml_error("Classification head failed"))?
            }
            Backbone::DistilBert {
                model,
                pre_classifier,
                classifier,
            } => {
                // DistilBERT masks positions where the mask is non-zero, and
                // broadcasts it against (batch, heads, query, key) scores.
                let (batch, seq_len) = inputs
                    .attention_mask
                    .dims2()
                    .map_err(ml_error("Unexpected attention mask shape"))?;
                let padding_mask = inputs
                    .attention_mask
                    .eq(0u32)
                    .and_then(|m| m.reshape((batch, 1, 1, seq_len)))
                    .map_err(ml_error("Failed to invert attention mask"))?;

                let hidden_states = model
                    .forward(&inputs.input_ids, &padding_mask)
                    .map_err(ml_error("Model forward pass failed"))?;

                let cls = hidden_states
                    .i((.., 0, ..))
                    .map_err(ml_error("Failed to get CLS token"))?;

                let pooled = match pre_classifier {
                    Some(dense) => dense
                        .forward(&cls)
                        .and_then(|t| t.relu())
                        .map_err(ml_error("Pre-classifier failed"))?,
                    None => cls,
                };

                classifier
                    .forward(&pooled)
                    .map_err(ml_error("Classification head failed"))?
            }
            Backbone::XlmRoberta(model) => model
                .forward(
                    &inputs.input_ids,
                    &inputs.attention_mask,
                    &inputs.token_type_ids,
                )
                .map_err(ml_error("Model forward pass failed"))?,
        };

        probabilities(&logits).map_err(ml_error("Softmax failed"))
    }

    fn to_raw_scores(&self, probabilities: Vec<f32>) -> Result<Vec<RawScore>> {
        if probabilities.len() != self.label_ids.len() {
            return Err(Error::classifier(format!(
                "Model emitted {} scores but {} labels are configured",
                probabilities.len(),
                self.label_ids.len()
            )));
        }

        Ok(self
            .label_ids
            .iter()
            .zip(probabilities)
            .map(|(label, score)| RawScore::new(label.clone(), score))
            .collect())
    }
}
