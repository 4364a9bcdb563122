use serde::{Deserialize, Serialize};

use crate::inference::model_config::GenerationRequest;

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ExcuseRequest {
    pub question: String,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ExcuseResponse {
    pub question: String,
    pub excuse: String,
    pub confidence: f64,
}

impl ExcuseRequest {
    /// Sampling parameters with the API defaults filled in.
    pub fn generation_request(&self) -> GenerationRequest {
        let defaults = GenerationRequest::default();
        GenerationRequest {
            max_length: self.max_length.unwrap_or(defaults.max_length),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            top_p: self.top_p.unwrap_or(defaults.top_p),
            do_sample: true,
            ..defaults
        }
    }

    /// Describes the first out of range sampling parameter.
    pub fn validate(&self) -> Result<(), String> {
        let request = self.generation_request();
        if request.max_length == 0 {
            return Err("max_length は 1 以上で指定してください".into());
        }
        if !request.temperature.is_finite() || request.temperature < 0.0 {
            return Err("temperature は 0 以上の数値で指定してください".into());
        }
        if !(request.top_p > 0.0 && request.top_p <= 1.0) {
            return Err("top_p は 0 より大きく 1 以下で指定してください".into());
        }
        Ok(())
    }
}
