use std::convert::Infallible;
use std::io::ErrorKind;

use anyhow::{Context, Result};
use clap::ValueEnum;
use clap_serde_derive::ClapSerde;
use serde::{Deserialize, Serialize};

/// Configuration file that is read when no other file is given. It may be absent.
pub const DEFAULT_CONFIG_FILE: &str = "ShachikuAi.toml";

#[derive(ClapSerde, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// The address the listener binds to
    #[default("0.0.0.0".to_string())]
    #[arg(short, long, env)]
    pub address: String,

    /// The port the listener binds to
    #[default(8000)]
    #[arg(short, long, env)]
    pub port: u16,

    /// Hugging Face repository the weights are fetched from when they are not found locally
    #[default("mmnga/ELYZA-japanese-Llama-2-7b-fast-instruct-gguf".to_string())]
    #[arg(long, env = "MODEL_NAME")]
    pub model_name: String,

    /// Revision of the model repository
    #[default("main".to_string())]
    #[arg(long, env)]
    pub model_revision: String,

    /// Local directory that is checked for the weights and tokenizer before downloading
    #[default("./data/models".to_string())]
    #[arg(long, env = "MODEL_PATH")]
    pub model_path: String,

    /// GGUF weights file name
    #[default("ELYZA-japanese-Llama-2-7b-fast-instruct-q4_K_M.gguf".to_string())]
    #[arg(long, env)]
    pub weights_filename: String,

    /// Repository holding the tokenizer, defaults to the model repository when empty
    #[default("elyza/ELYZA-japanese-Llama-2-7b-fast-instruct".to_string())]
    #[arg(long, env)]
    pub tokenizer_repo: String,

    /// Tokenizer file name
    #[default("tokenizer.json".to_string())]
    #[arg(long, env)]
    pub tokenizer_filename: String,

    /// Architecture of the GGUF weights
    #[default(ModelArchitecture::Llama)]
    #[arg(long, env, value_enum)]
    pub architecture: ModelArchitecture,

    /// Token that ends a generation
    #[default("</s>".to_string())]
    #[arg(long, env)]
    pub eos_token: String,

    /// Penalty applied to tokens that were recently generated, 1.0 disables it
    #[default(1.1)]
    #[arg(long, env)]
    pub repeat_penalty: f32,

    /// Number of trailing tokens considered by the repeat penalty
    #[default(64)]
    #[arg(long, env)]
    pub repeat_context_size: usize,

    /// Upper bound of generations that run at the same time
    #[default(1)]
    #[arg(long, env)]
    pub max_concurrent_generations: usize,

    /// Attach raw generation output to reply responses. Any casing of "true" enables it,
    /// every other value disables it
    #[default(false)]
    #[arg(
        long,
        env = "DEBUG_MODE",
        value_parser = parse_flag,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub debug_mode: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelArchitecture {
    /// Quantized llama family weights
    Llama,
    /// Quantized phi-2 (mixformer) weights
    Phi2,
}

impl Config {
    pub fn from_toml(path: &str) -> Result<Self> {
        let str = std::fs::read_to_string(path)?;
        let config = toml::from_str(&str)?;
        Ok(config)
    }

    /// Reads `path` and lets the command line and environment override it.
    /// A missing default file is not an error.
    pub fn load(path: &str, opt: <Config as ClapSerde>::Opt) -> Result<Self> {
        match Config::from_toml(path) {
            Ok(config) => Ok(config.merge(opt)),
            Err(err) if path == DEFAULT_CONFIG_FILE && is_not_found(&err) => {
                Ok(Config::default().merge(opt))
            }
            Err(err) => {
                Err(err).with_context(|| format!("Failed to read configuration file {path}"))
            }
        }
    }

    /// Tokenizer repository, falling back to the model repository.
    pub fn tokenizer_repo(&self) -> &str {
        if self.tokenizer_repo.is_empty() {
            &self.model_name
        } else {
            &self.tokenizer_repo
        }
    }
}

fn parse_flag(value: &str) -> Result<bool, Infallible> {
    Ok(value.trim().eq_ignore_ascii_case("true"))
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .is_some_and(|io| io.kind() == ErrorKind::NotFound)
}
