//! Model loading for Candle-based sequence classifiers
//!
//! Resolves the model directory (local or Hugging Face Hub), picks a device
//! and precision, and builds a [`SequenceClassifier`] for the detected
//! architecture. Every failure here is reported as [`Error::Startup`]; the
//! process must not serve traffic without a classifier.

use crate::model_config::{ArchitectureSpec, DeviceSpec, ModelConfig, ModelSource, PrecisionSpec};
use crate::sequence::{Backbone, SequenceClassifier, SequenceModel};
use candle_core::{DType, Device};
use candle_nn::{Linear, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use candle_transformers::models::distilbert::{Config as DistilBertConfig, DistilBertModel};
use candle_transformers::models::xlm_roberta::{
    Config as XlmRobertaConfig, XLMRobertaForSequenceClassification,
};
use hatecheck_core::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

fn startup_error<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> Error {
    move |e| Error::startup(format!("{}: {}", context, e))
}

/// Load the configured model and wrap it as a [`SequenceClassifier`].
///
/// This does blocking file and network IO; call it from a blocking context.
pub fn load_sequence_classifier(config: &ModelConfig) -> Result<SequenceClassifier> {
    let model_dir = resolve_model_dir(&config.source)?;
    tracing::info!("Loading model '{}' from {}", config.name, model_dir.display());

    let config_path = model_dir.join("config.json");
    let raw_config: serde_json::Value = parse_json_config(&config_path)?;

    let architecture = match config.architecture {
        Some(architecture) => architecture,
        None => detect_architecture(&raw_config)?,
    };

    let label_ids = label_identifiers(&raw_config);
    let num_labels = label_ids.len();
    let pad_id = raw_config
        .get("pad_token_id")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;

    let device = select_device(config.device)?;
    let dtype = select_dtype(config.precision, &device);
    tracing::info!(
        "Using device {:?} with {:?} weights for {} ({} labels)",
        device,
        dtype,
        architecture.as_str(),
        num_labels
    );

    let tokenizer = load_tokenizer(&model_dir)?;
    let pad_token = tokenizer
        .id_to_token(pad_id)
        .unwrap_or_else(|| "[PAD]".to_string());

    let vb = load_var_builder(&model_dir, dtype, &device)?;

    let backbone = match architecture {
        ArchitectureSpec::Bert => {
            let bert_config: BertConfig = parse_json_config(&config_path)?;
            load_bert(&vb, &bert_config, num_labels)?
        }
        ArchitectureSpec::DistilBert => {
            let distilbert_config: DistilBertConfig = parse_json_config(&config_path)?;
            let hidden_size = raw_config
                .get("dim")
                .or_else(|| raw_config.get("hidden_size"))
                .and_then(|v| v.as_u64())
                .unwrap_or(768) as usize;
            load_distilbert(&vb, &distilbert_config, hidden_size, num_labels)?
        }
        ArchitectureSpec::XlmRoberta => {
            let xlm_config: XlmRobertaConfig = parse_json_config(&config_path)?;
            let model = XLMRobertaForSequenceClassification::new(num_labels, &xlm_config, vb)
                .map_err(startup_error("Failed to load XLM-RoBERTa model"))?;
            Backbone::XlmRoberta(model)
        }
    };

    tracing::info!(
        "Successfully loaded {} classifier with labels {:?}",
        architecture.as_str(),
        label_ids
    );

    Ok(SequenceClassifier::new(
        config.name.clone(),
        SequenceModel {
            tokenizer,
            backbone,
            device,
            dtype,
            label_ids,
            pad_id,
            pad_token,
        },
    ))
}

/// Locate the directory holding `config.json`, the tokenizer and the weights
fn resolve_model_dir(source: &ModelSource) -> Result<PathBuf> {
    match source {
        ModelSource::Local { path } => {
            if !path.is_dir() {
                return Err(Error::startup(format!(
                    "Model directory does not exist: {}",
                    path.display()
                )));
            }
            Ok(path.clone())
        }
        ModelSource::HuggingFace { repo, revision } => download_from_huggingface(repo, revision),
    }
}

fn download_from_huggingface(repo: &str, revision: &str) -> Result<PathBuf> {
    tracing::info!("Downloading model from HuggingFace: {} @ {}", repo, revision);

    let api = hf_hub::api::sync::Api::new()
        .map_err(startup_error("Failed to initialize HuggingFace API"))?;
    let repo_obj = api.repo(hf_hub::Repo::with_revision(
        repo.to_string(),
        hf_hub::RepoType::Model,
        revision.to_string(),
    ));

    let config_path = repo_obj
        .get("config.json")
        .map_err(startup_error("Failed to download config.json"))?;
    repo_obj
        .get("model.safetensors")
        .map_err(startup_error("Failed to download model.safetensors"))?;

    let mut found_tokenizer = false;
    for file in ["tokenizer.json", "vocab.txt"] {
        match repo_obj.get(file) {
            Ok(_) => {
                tracing::debug!("Found tokenizer file: {}", file);
                found_tokenizer = true;
                break;
            }
            Err(_) => tracing::debug!("File not found: {}", file),
        }
    }
    if !found_tokenizer {
        return Err(Error::startup(
            "No tokenizer found (tried tokenizer.json, vocab.txt)",
        ));
    }

    let model_dir = config_path
        .parent()
        .ok_or_else(|| Error::startup("Invalid cache path"))?;

    tracing::info!("Model available at: {}", model_dir.display());
    Ok(model_dir.to_path_buf())
}

fn detect_architecture(raw_config: &serde_json::Value) -> Result<ArchitectureSpec> {
    let model_type = raw_config
        .get("model_type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            Error::startup("config.json has no model_type; set `architecture` explicitly")
        })?;

    ArchitectureSpec::from_model_type(model_type)
        .ok_or_else(|| Error::startup(format!("Unsupported model_type '{}'", model_type)))
}

/// Label identifiers in class-index order, from `id2label` when present.
///
/// Falls back to `LABEL_<i>` for `num_labels` classes (default 2).
fn label_identifiers(raw_config: &serde_json::Value) -> Vec<String> {
    if let Some(map) = raw_config.get("id2label").and_then(|v| v.as_object()) {
        let mut indexed: Vec<(usize, String)> = map
            .iter()
            .filter_map(|(key, value)| {
                let idx = key.parse::<usize>().ok()?;
                Some((idx, value.as_str()?.to_string()))
            })
            .collect();
        indexed.sort_by_key(|(idx, _)| *idx);

        let contiguous = indexed.iter().enumerate().all(|(pos, (idx, _))| pos == *idx);
        if !indexed.is_empty() && contiguous {
            return indexed.into_iter().map(|(_, label)| label).collect();
        }
        tracing::warn!("Ignoring non-contiguous id2label in config.json");
    }

    let num_labels = raw_config
        .get("num_labels")
        .and_then(|v| v.as_u64())
        .unwrap_or(2) as usize;
    (0..num_labels).map(|idx| format!("LABEL_{}", idx)).collect()
}

fn select_device(spec: DeviceSpec) -> Result<Device> {
    match spec {
        DeviceSpec::Cpu => Ok(Device::Cpu),
        DeviceSpec::Cuda => {
            Device::new_cuda(0).map_err(startup_error("Failed to initialize CUDA"))
        }
        DeviceSpec::Metal => {
            Device::new_metal(0).map_err(startup_error("Failed to initialize Metal"))
        }
        DeviceSpec::Auto => {
            if candle_core::utils::cuda_is_available() {
                Device::new_cuda(0).map_err(startup_error("Failed to initialize CUDA"))
            } else if candle_core::utils::metal_is_available() {
                Device::new_metal(0).map_err(startup_error("Failed to initialize Metal"))
            } else {
                Ok(Device::Cpu)
            }
        }
    }
}

fn select_dtype(spec: PrecisionSpec, device: &Device) -> DType {
    match spec {
        PrecisionSpec::F32 => DType::F32,
        PrecisionSpec::F16 => DType::F16,
        PrecisionSpec::Bf16 => DType::BF16,
        PrecisionSpec::Auto if device.is_cpu() => DType::F32,
        PrecisionSpec::Auto => DType::F16,
    }
}

fn parse_json_config<T: DeserializeOwned>(config_path: &Path) -> Result<T> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        Error::startup(format!(
            "Failed to read config {}: {}",
            config_path.display(),
            e
        ))
    })?;

    serde_json::from_str(&config_str).map_err(|e| {
        Error::startup(format!(
            "Failed to parse config {}: {}",
            config_path.display(),
            e
        ))
    })
}

fn load_var_builder(model_dir: &Path, dtype: DType, device: &Device) -> Result<VarBuilder<'static>> {
    let weights_path = model_dir.join("model.safetensors");
    if !weights_path.exists() {
        return Err(Error::startup(format!(
            "model.safetensors not found in {}",
            model_dir.display()
        )));
    }

    // SAFETY: the weights file is memory-mapped read-only and not modified while the process runs.
    let vb = unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights_path], dtype, device)
            .map_err(startup_error("Failed to load weights"))?
    };

    Ok(vb)
}

/// Load a tokenizer with any truncation/padding baked into `tokenizer.json` removed
fn load_tokenizer(model_dir: &Path) -> Result<Tokenizer> {
    let mut tokenizer = read_tokenizer(model_dir)?;
    tokenizer
        .with_truncation(None)
        .map_err(startup_error("Failed to reset tokenizer truncation"))?;
    tokenizer.with_padding(None);
    Ok(tokenizer)
}

fn read_tokenizer(model_dir: &Path) -> Result<Tokenizer> {
    let tokenizer_json_path = model_dir.join("tokenizer.json");
    if tokenizer_json_path.exists() {
        tracing::debug!("Loading tokenizer from tokenizer.json");
        return Tokenizer::from_file(&tokenizer_json_path)
            .map_err(startup_error("Failed to load tokenizer.json"));
    }

    let vocab_path = model_dir.join("vocab.txt");
    if vocab_path.exists() {
        tracing::debug!("Building tokenizer from vocab.txt");

        use tokenizers::models::wordpiece::WordPiece;
        use tokenizers::normalizers::BertNormalizer;
        use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
        use tokenizers::processors::bert::BertProcessing;

        let wordpiece = WordPiece::from_file(vocab_path.to_string_lossy().as_ref())
            .unk_token("[UNK]".to_string())
            .build()
            .map_err(startup_error("Failed to build WordPiece model"))?;

        let mut tokenizer = Tokenizer::new(wordpiece);
        tokenizer.with_normalizer(Some(BertNormalizer::default()));
        tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));

        let sep = ("[SEP]".to_string(), 102);
        let cls = ("[CLS]".to_string(), 101);
        tokenizer.with_post_processor(Some(BertProcessing::new(sep, cls)));

        return Ok(tokenizer);
    }

    Err(Error::startup(format!(
        "No tokenizer found in {} (tried tokenizer.json, vocab.txt)",
        model_dir.display()
    )))
}

/// Try each weight prefix in turn; checkpoints differ in how they nest the backbone
fn with_prefixes<T>(
    vb: &VarBuilder<'static>,
    prefixes: &[&'static str],
    what: &str,
    mut load: impl FnMut(VarBuilder<'static>) -> candle_core::Result<T>,
) -> Result<(T, &'static str)> {
    let mut errors = Vec::new();

    for &prefix in prefixes {
        let vb_prefix = if prefix.is_empty() {
            vb.clone()
        } else {
            vb.pp(prefix)
        };

        match load(vb_prefix) {
            Ok(loaded) => {
                let shown = if prefix.is_empty() { "<root>" } else { prefix };
                tracing::info!("Loaded {} from '{}'", what, shown);
                return Ok((loaded, prefix));
            }
            Err(e) => errors.push(format!(
                "{}: {}",
                if prefix.is_empty() { "<root>" } else { prefix },
                e
            )),
        }
    }

    Err(Error::startup(format!(
        "Failed to load {} with tried prefixes [{}]",
        what,
        errors.join(" | ")
    )))
}

fn load_classification_head(vb: &VarBuilder<'static>, hidden_size: usize, num_labels: usize) -> Result<Linear> {
    candle_nn::linear(hidden_size, num_labels, vb.pp("classifier")).map_err(|e| {
        Error::startup(format!(
            "No classification head found (hidden_size={}, num_labels={}): {}",
            hidden_size, num_labels, e
        ))
    })
}

pub(crate) fn load_bert(vb: &VarBuilder<'static>, config: &BertConfig, num_labels: usize) -> Result<Backbone> {
    let (model, prefix) = with_prefixes(vb, &["bert", ""], "BERT backbone", |vb| {
        BertModel::load(vb, config)
    })?;

    let pooler_vb = if prefix.is_empty() {
        vb.pp("pooler")
    } else {
        vb.pp(prefix).pp("pooler")
    };
    let pooler = candle_nn::linear(config.hidden_size, config.hidden_size, pooler_vb.pp("dense")).ok();
    if pooler.is_none() {
        tracing::warn!("No BERT pooler weights found, classifying the raw [CLS] embedding");
    }

    let classifier = load_classification_head(vb, config.hidden_size, num_labels)?;

    Ok(Backbone::Bert {
        model,
        pooler,
        classifier,
    })
}

pub(crate) fn load_distilbert(
    vb: &VarBuilder<'static>,
    config: &DistilBertConfig,
    hidden_size: usize,
    num_labels: usize,
) -> Result<Backbone> {
    let (model, _) = with_prefixes(vb, &["distilbert", ""], "DistilBERT backbone", |vb| {
        DistilBertModel::load(vb, config)
    })?;

    let pre_classifier = candle_nn::linear(hidden_size, hidden_size, vb.pp("pre_classifier")).ok();
    if pre_classifier.is_some() {
        tracing::info!("Loaded pre_classifier layer (hidden_size={})", hidden_size);
    }

    let classifier = load_classification_head(vb, hidden_size, num_labels)?;

    Ok(Backbone::DistilBert {
        model,
        pre_classifier,
        classifier,
    })
}
