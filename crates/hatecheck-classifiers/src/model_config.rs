//! Model configuration structures

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the sequence-classification model served by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name, used in logs
    #[serde(default = "default_name")]
    pub name: String,

    /// Where to load the model artifact from
    #[serde(default)]
    pub source: ModelSource,

    /// Model architecture; detected from `config.json` when absent
    #[serde(default)]
    pub architecture: Option<ArchitectureSpec>,

    /// Device to run inference on
    #[serde(default)]
    pub device: DeviceSpec,

    /// Numeric precision of the loaded weights
    #[serde(default)]
    pub precision: PrecisionSpec,
}

fn default_name() -> String {
    "hate-speech-classifier".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            source: ModelSource::default(),
            architecture: None,
            device: DeviceSpec::default(),
            precision: PrecisionSpec::default(),
        }
    }
}

impl ModelConfig {
    /// Create a configuration for a local model directory
    pub fn from_local(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ModelSource::Local { path: path.into() },
            ..Default::default()
        }
    }

    /// Create a configuration for a Hugging Face Hub repository
    pub fn from_hf(repo: impl Into<String>) -> Self {
        Self {
            source: ModelSource::HuggingFace {
                repo: repo.into(),
                revision: default_revision(),
            },
            ..Default::default()
        }
    }

    /// Set device
    pub fn with_device(mut self, device: DeviceSpec) -> Self {
        self.device = device;
        self
    }

    /// Set precision
    pub fn with_precision(mut self, precision: PrecisionSpec) -> Self {
        self.precision = precision;
        self
    }

    /// Pin the architecture instead of detecting it
    pub fn with_architecture(mut self, architecture: ArchitectureSpec) -> Self {
        self.architecture = Some(architecture);
        self
    }
}

/// Model source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSource {
    /// Load from a local directory holding `config.json`, the tokenizer and `model.safetensors`
    Local { path: PathBuf },

    /// Download from Hugging Face Hub
    HuggingFace {
        repo: String,
        #[serde(default = "default_revision")]
        revision: String,
    },
}

impl Default for ModelSource {
    fn default() -> Self {
        Self::Local {
            path: PathBuf::from("./model"),
        }
    }
}

fn default_revision() -> String {
    "main".to_string()
}

/// Supported sequence-classification architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchitectureSpec {
    Bert,
    #[serde(rename = "distilbert")]
    DistilBert,
    XlmRoberta,
}

impl ArchitectureSpec {
    /// Map a Hugging Face `model_type` to an architecture
    pub fn from_model_type(model_type: &str) -> Option<Self> {
        match model_type.to_ascii_lowercase().as_str() {
            "bert" => Some(Self::Bert),
            "distilbert" => Some(Self::DistilBert),
            "xlm-roberta" | "xlm_roberta" | "roberta" => Some(Self::XlmRoberta),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bert => "bert",
            Self::DistilBert => "distilbert",
            Self::XlmRoberta => "xlm-roberta",
        }
    }
}

/// Inference device selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSpec {
    /// First available GPU, else CPU
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

impl std::str::FromStr for DeviceSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            "metal" | "mps" => Ok(Self::Metal),
            other => Err(format!(
                "unknown device '{}' (expected auto, cpu, cuda or metal)",
                other
            )),
        }
    }
}

/// Weight precision selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecisionSpec {
    /// f16 on accelerators, f32 on CPU
    #[default]
    Auto,
    F32,
    F16,
    Bf16,
}
