//! Gateway behaviour against mock classifiers
//!
//! Covers input validation, top-label reduction, batch ordering and the
//! failure policy without loading a real model.

use async_trait::async_trait;
use hatecheck_classifiers::{ClassificationGateway, GatewayConfig, TextClassifier};
use hatecheck_core::{Error, LabelTable, RawScore, Result};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Returns preset scores per text and records every call
struct MockClassifier {
    scores: HashMap<String, Vec<RawScore>>,
    fallback: Vec<RawScore>,
    calls: AtomicU32,
    batch_calls: Mutex<Vec<(usize, usize, usize)>>,
}

impl MockClassifier {
    fn new() -> Self {
        Self {
            scores: HashMap::new(),
            fallback: vec![RawScore::new("LABEL_0", 0.6), RawScore::new("LABEL_1", 0.4)],
            calls: AtomicU32::new(0),
            batch_calls: Mutex::new(Vec::new()),
        }
    }

    fn with_scores(mut self, text: &str, scores: &[(&str, f32)]) -> Self {
        self.scores.insert(
            text.to_string(),
            scores.iter().map(|(l, s)| RawScore::new(*l, *s)).collect(),
        );
        self
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    /// (number of texts, truncate_at, batch_size) per batch call
    fn batch_calls(&self) -> Vec<(usize, usize, usize)> {
        self.batch_calls.lock().unwrap().clone()
    }

    fn lookup(&self, text: &str) -> Vec<RawScore> {
        self.scores
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl TextClassifier for MockClassifier {
    async fn classify(&self, text: &str, _truncate_at: usize) -> Result<Vec<RawScore>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.lookup(text))
    }

    async fn classify_batch(
        &self,
        texts: &[String],
        truncate_at: usize,
        batch_size: usize,
    ) -> Result<Vec<Vec<RawScore>>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.batch_calls
            .lock()
            .unwrap()
            .push((texts.len(), truncate_at, batch_size));
        Ok(texts.iter().map(|t| self.lookup(t)).collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Always fails, as an exhausted device would
struct FailingClassifier;

#[async_trait]
impl TextClassifier for FailingClassifier {
    async fn classify(&self, _text: &str, _truncate_at: usize) -> Result<Vec<RawScore>> {
        Err(Error::classifier("CUDA out of memory"))
    }

    async fn classify_batch(
        &self,
        _texts: &[String],
        _truncate_at: usize,
        _batch_size: usize,
    ) -> Result<Vec<Vec<RawScore>>> {
        Err(Error::classifier("CUDA out of memory"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Drops the last result of a batch
struct ShortBatchClassifier;

#[async_trait]
impl TextClassifier for ShortBatchClassifier {
    async fn classify(&self, _text: &str, _truncate_at: usize) -> Result<Vec<RawScore>> {
        Ok(vec![RawScore::new("LABEL_0", 1.0)])
    }

    async fn classify_batch(
        &self,
        texts: &[String],
        _truncate_at: usize,
        _batch_size: usize,
    ) -> Result<Vec<Vec<RawScore>>> {
        Ok(texts
            .iter()
            .skip(1)
            .map(|_| vec![RawScore::new("LABEL_0", 1.0)])
            .collect())
    }

    fn name(&self) -> &str {
        "short"
    }
}

fn gateway_with(mock: Arc<MockClassifier>) -> ClassificationGateway {
    ClassificationGateway::new(mock, LabelTable::default())
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_predict_hate() {
    let mock = Arc::new(
        MockClassifier::new().with_scores("I hate you", &[("LABEL_1", 0.92), ("LABEL_0", 0.08)]),
    );
    let gateway = gateway_with(mock.clone());

    let prediction = gateway.predict("I hate you").await.unwrap();

    assert_eq!(prediction.label, "HATE");
    assert_eq!(prediction.confidence, 0.92);
    assert_eq!(prediction.input_text, "I hate you");
    assert_eq!(prediction.model_info, "Transformer-based hate speech classifier");
    assert_eq!(mock.call_count(), 1);
    assert_eq!(gateway.classifier_name(), "mock");
}

#[tokio::test]
async fn test_predict_rounds_to_four_decimals() {
    let mock = Arc::new(
        MockClassifier::new().with_scores("hello", &[("LABEL_0", 0.987654), ("LABEL_1", 0.012346)]),
    );
    let prediction = gateway_with(mock).predict("hello").await.unwrap();

    assert_eq!(prediction.label, "NON-HATE");
    assert_eq!(prediction.confidence, 0.9877);
}

#[tokio::test]
async fn test_predict_empty_text_skips_classifier() {
    let mock = Arc::new(MockClassifier::new());
    let gateway = gateway_with(mock.clone());

    for text in ["", "   ", "\n\t "] {
        let err = gateway.predict(text).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(err.to_string(), "Input text is empty.");
    }

    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_predict_tie_goes_to_first_emitted() {
    let mock = Arc::new(
        MockClassifier::new().with_scores("coin flip", &[("LABEL_1", 0.5), ("LABEL_0", 0.5)]),
    );
    let prediction = gateway_with(mock).predict("coin flip").await.unwrap();
    assert_eq!(prediction.label, "HATE");
}

#[tokio::test]
async fn test_predict_malformed_label_is_classifier_error() {
    let mock = Arc::new(
        MockClassifier::new().with_scores("odd", &[("hateful", 0.9), ("neutral", 0.1)]),
    );
    let err = gateway_with(mock).predict("odd").await.unwrap_err();
    assert!(matches!(err, Error::Classifier(_)));
}

#[tokio::test]
async fn test_predict_passes_truncation_length() {
    struct RecordingClassifier(Mutex<Option<usize>>);

    #[async_trait]
    impl TextClassifier for RecordingClassifier {
        async fn classify(&self, _text: &str, truncate_at: usize) -> Result<Vec<RawScore>> {
            *self.0.lock().unwrap() = Some(truncate_at);
            Ok(vec![RawScore::new("LABEL_0", 1.0)])
        }

        async fn classify_batch(
            &self,
            _texts: &[String],
            _truncate_at: usize,
            _batch_size: usize,
        ) -> Result<Vec<Vec<RawScore>>> {
            unreachable!("single prediction only")
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    let classifier = Arc::new(RecordingClassifier(Mutex::new(None)));
    let gateway = ClassificationGateway::new(classifier.clone(), LabelTable::default());
    gateway.predict("long text").await.unwrap();

    assert_eq!(*classifier.0.lock().unwrap(), Some(512));
}

#[tokio::test]
async fn test_batch_predict_scenario() {
    let mock = Arc::new(
        MockClassifier::new()
            .with_scores("hi", &[("LABEL_0", 0.9), ("LABEL_1", 0.1)])
            .with_scores("you are trash", &[("LABEL_0", 0.2), ("LABEL_1", 0.8)]),
    );
    let gateway = gateway_with(mock.clone());

    let batch = gateway
        .batch_predict(&texts(&["hi", "you are trash"]))
        .await
        .unwrap();

    assert_eq!(batch.count, 2);
    assert_eq!(batch.results[0].label, "NON-HATE");
    assert_eq!(batch.results[0].confidence, 0.9);
    assert_eq!(batch.results[1].label, "HATE");
    assert_eq!(batch.results[1].confidence, 0.8);
    assert_eq!(mock.batch_calls(), vec![(2, 512, 2)]);
}

#[tokio::test]
async fn test_batch_size_is_capped_at_eight() {
    let mock = Arc::new(MockClassifier::new());
    let gateway = gateway_with(mock.clone());

    let ten: Vec<String> = (0..10).map(|i| format!("text {}", i)).collect();
    gateway.batch_predict(&ten).await.unwrap();
    gateway
        .batch_predict(&texts(&["a", "b", "c"]))
        .await
        .unwrap();

    assert_eq!(mock.batch_calls(), vec![(10, 512, 8), (3, 512, 3)]);
}

#[tokio::test]
async fn test_batch_size_follows_config() {
    let mock = Arc::new(MockClassifier::new());
    let gateway = gateway_with(mock.clone()).with_config(GatewayConfig {
        max_length: 128,
        max_batch_size: 4,
        ..Default::default()
    });

    let ten: Vec<String> = (0..10).map(|i| format!("text {}", i)).collect();
    gateway.batch_predict(&ten).await.unwrap();

    assert_eq!(mock.batch_calls(), vec![(10, 128, 4)]);
}

#[tokio::test]
async fn test_batch_predict_empty_list() {
    let mock = Arc::new(MockClassifier::new());
    let err = gateway_with(mock.clone())
        .batch_predict(&[])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(err.to_string(), "No texts provided.");
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_classifier_failure_propagates() {
    let gateway = ClassificationGateway::new(Arc::new(FailingClassifier), LabelTable::default());

    let err = gateway.predict("hello").await.unwrap_err();
    assert!(matches!(err, Error::Classifier(_)));

    let err = gateway
        .batch_predict(&texts(&["a", "b"]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Classifier(_)));
}

#[tokio::test]
async fn test_batch_count_mismatch_fails_whole_batch() {
    let gateway = ClassificationGateway::new(Arc::new(ShortBatchClassifier), LabelTable::default());
    let err = gateway
        .batch_predict(&texts(&["a", "b", "c"]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Classifier(_)));
}

#[tokio::test]
async fn test_one_bad_item_fails_whole_batch() {
    let mock = Arc::new(
        MockClassifier::new().with_scores("broken", &[("LABEL_7", 0.99), ("LABEL_0", 0.01)]),
    );
    let err = gateway_with(mock)
        .batch_predict(&texts(&["fine", "broken", "fine"]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Classifier(_)));
}

#[tokio::test]
async fn test_repeated_predictions_are_identical() {
    let mock = Arc::new(
        MockClassifier::new().with_scores("same", &[("LABEL_0", 0.31415), ("LABEL_1", 0.68585)]),
    );
    let gateway = gateway_with(mock);

    let first = gateway.predict("same").await.unwrap();
    let second = gateway.predict("same").await.unwrap();
    assert_eq!(first, second);
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

/// Deterministic two-class scores derived from the text
fn scores_for(text: &str) -> Vec<RawScore> {
    let hate = (text.len() % 101) as f32 / 100.0;
    vec![RawScore::new("LABEL_0", 1.0 - hate), RawScore::new("LABEL_1", hate)]
}

struct DerivedClassifier;

#[async_trait]
impl TextClassifier for DerivedClassifier {
    async fn classify(&self, text: &str, _truncate_at: usize) -> Result<Vec<RawScore>> {
        Ok(scores_for(text))
    }

    async fn classify_batch(
        &self,
        texts: &[String],
        _truncate_at: usize,
        _batch_size: usize,
    ) -> Result<Vec<Vec<RawScore>>> {
        Ok(texts.iter().map(|t| scores_for(t)).collect())
    }

    fn name(&self) -> &str {
        "derived"
    }
}

proptest! {
    #[test]
    fn prop_predict_label_and_confidence_are_well_formed(text in "[a-z ]{0,40}[a-z][a-z ]{0,40}") {
        let gateway = ClassificationGateway::new(Arc::new(DerivedClassifier), LabelTable::default());
        let prediction = runtime().block_on(gateway.predict(&text)).unwrap();

        prop_assert!(gateway.labels().contains(&prediction.label));
        prop_assert!((0.0..=1.0).contains(&prediction.confidence));
        let scaled = prediction.confidence * 10_000.0;
        prop_assert!((scaled - scaled.round()).abs() < 1e-6);
    }

    #[test]
    fn prop_blank_text_never_reaches_classifier(text in "[ \t\n]{0,20}") {
        let mock = Arc::new(MockClassifier::new());
        let gateway = gateway_with(mock.clone());
        let result = runtime().block_on(gateway.predict(&text));

        prop_assert!(matches!(result, Err(Error::InvalidInput(_))));
        prop_assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn prop_batch_preserves_length_and_order(items in proptest::collection::vec("[a-z]{1,30}", 1..20)) {
        let gateway = ClassificationGateway::new(Arc::new(DerivedClassifier), LabelTable::default());
        let batch = runtime().block_on(gateway.batch_predict(&items)).unwrap();

        prop_assert_eq!(batch.count, items.len());
        prop_assert_eq!(batch.results.len(), items.len());
        for (item, result) in items.iter().zip(&batch.results) {
            let single = runtime().block_on(gateway.predict(item)).unwrap();
            prop_assert_eq!(&single.label, &result.label);
            prop_assert_eq!(single.confidence, result.confidence);
        }
    }
}
