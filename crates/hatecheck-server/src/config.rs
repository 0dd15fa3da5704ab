//! Server configuration

use crate::cli::Cli;
use hatecheck_classifiers::{GatewayConfig, ModelConfig, ModelSource};
use hatecheck_core::{Error, LabelTable, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Model to load at startup
    #[serde(default)]
    pub model: ModelConfig,

    /// Class index to label mapping
    #[serde(default)]
    pub labels: LabelTable,

    /// Truncation, batching and model description
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Cross-origin policy
    #[serde(default)]
    pub cors: CorsConfig,

    /// Metadata returned from `GET /`
    #[serde(default)]
    pub service: ServiceInfo,
}

impl ServerConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &Cli) -> Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            tracing::info!("No config file at {}, using defaults", config_path);
            Self::default()
        };

        // Apply CLI overrides
        if let Some(listen) = &cli.listen {
            config.listen = listen.clone();
        }

        if let Some(port) = cli.port {
            config.port = port;
        }

        if let Some(model_dir) = &cli.model_dir {
            config.model.source = ModelSource::Local {
                path: model_dir.clone(),
            };
        }

        if let Some(device) = cli.device {
            config.model.device = device;
        }

        config.gateway.validate()?;
        Ok(config)
    }

    /// Socket address to bind
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.listen, self.port)
            .parse()
            .map_err(|e| Error::config(format!("invalid listen address '{}': {}", self.listen, e)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            model: ModelConfig::default(),
            labels: LabelTable::default(),
            gateway: GatewayConfig::default(),
            cors: CorsConfig::default(),
            service: ServiceInfo::default(),
        }
    }
}

/// Cross-origin resource sharing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; `*` allows every origin
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Whether browsers may send credentials
    #[serde(default = "default_true")]
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
            allow_credentials: true,
        }
    }
}

/// Static service metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    #[serde(default = "default_service_name")]
    pub name: String,

    #[serde(default = "default_author")]
    pub author: String,

    #[serde(default = "default_github")]
    pub github: String,

    #[serde(default = "default_huggingface")]
    pub huggingface: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            author: default_author(),
            github: default_github(),
            huggingface: default_huggingface(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7860
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "https://hate-speech-detection-007.netlify.app".to_string(),
        "https://huggingface.co".to_string(),
        "*".to_string(),
    ]
}

fn default_true() -> bool {
    true
}

fn default_service_name() -> String {
    "Hate Speech Detection API".to_string()
}

fn default_author() -> String {
    "Archit Rawat".to_string()
}

fn default_github() -> String {
    "https://github.com/Architrawat25".to_string()
}

fn default_huggingface() -> String {
    "https://huggingface.co/architrawat25".to_string()
}
