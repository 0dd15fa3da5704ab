//! hatecheck Core
//!
//! Core types and error handling shared across hatecheck components.
//!
//! This crate provides:
//! - Error types and result handling
//! - Raw classifier scores and the static label table
//! - Response shapes returned by the classification gateway

pub mod error;
pub mod labels;
pub mod types;

pub use error::{Error, Result};
pub use labels::LabelTable;
pub use types::{BatchPrediction, LabelScore, Prediction, RawScore};

