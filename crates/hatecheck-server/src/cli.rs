use clap::Parser;
use hatecheck_classifiers::DeviceSpec;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "hatecheck-server")]
#[command(author, version, about = "Hate-speech detection API", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "HATECHECK_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Listen address
    #[arg(short = 'l', long, env = "HATECHECK_LISTEN")]
    pub listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long, env = "HATECHECK_PORT")]
    pub port: Option<u16>,

    /// Local model directory (config.json, tokenizer, model.safetensors)
    #[arg(short, long, env = "HATECHECK_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Inference device: auto, cpu, cuda or metal
    #[arg(short, long, env = "HATECHECK_DEVICE", value_parser = parse_device)]
    pub device: Option<DeviceSpec>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

fn parse_device(s: &str) -> Result<DeviceSpec, String> {
    s.parse()
}
