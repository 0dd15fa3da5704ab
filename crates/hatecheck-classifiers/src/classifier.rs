//! Classifier capability consumed by the gateway

use async_trait::async_trait;
use hatecheck_core::{RawScore, Result};

/// A text classifier producing one [`RawScore`] per known class.
///
/// Implementations are built once at startup and must tolerate concurrent
/// read-only calls. Label identifiers follow the `<prefix>_<index>` convention.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    /// Score a single text, considering at most `truncate_at` tokens
    async fn classify(&self, text: &str, truncate_at: usize) -> Result<Vec<RawScore>>;

    /// Score several texts, `batch_size` at a time.
    ///
    /// Returns one score set per input, in input order. A failure anywhere
    /// fails the whole call.
    async fn classify_batch(
        &self,
        texts: &[String],
        truncate_at: usize,
        batch_size: usize,
    ) -> Result<Vec<Vec<RawScore>>>;

    /// Get the classifier name
    fn name(&self) -> &str;
}
