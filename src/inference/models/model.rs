use serde::{Deserialize, Serialize};

use crate::config::ModelArchitecture;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ModelInfo {
    /// The name of the model repository
    pub model_name: String,

    /// The local directory checked before downloading
    pub model_path: String,

    /// Where the weights were loaded from
    pub source: ModelSource,

    pub architecture: ModelArchitecture,

    /// The device inference runs on
    pub device: String,

    pub tokenizer_vocab_size: usize,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelSource {
    Local,
    Hub,
}
