//! hatecheck Classifiers
//!
//! Text classifiers and the gateway that turns their raw per-label scores into
//! a single labelled prediction.
//!
//! - [`TextClassifier`] is the capability the gateway depends on. It is built
//!   once at startup and shared read-only by every request.
//! - [`ClassificationGateway`] validates input, calls the classifier and keeps
//!   the top-scoring label.
//! - With the `ml-models` feature (default), [`SequenceClassifier`] provides a
//!   Candle-backed transformer implementation loaded from a model directory.

pub mod classifier;
pub mod gateway;
pub mod model_config;
#[cfg(feature = "ml-models")]
pub mod model_loader;
#[cfg(feature = "ml-models")]
pub mod sequence;

pub use classifier::TextClassifier;
pub use gateway::{ClassificationGateway, GatewayConfig, DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_LENGTH};
pub use model_config::{ArchitectureSpec, DeviceSpec, ModelConfig, ModelSource, PrecisionSpec};
#[cfg(feature = "ml-models")]
pub use model_loader::load_sequence_classifier;
#[cfg(feature = "ml-models")]
pub use sequence::SequenceClassifier;

