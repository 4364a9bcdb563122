use serde::{Deserialize, Serialize};

/// New tokens generated when the prompt alone already reaches `max_length`.
pub const MIN_NEW_TOKENS: usize = 50;

/// Sampling parameters of a single generation call.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Upper bound of prompt plus generated tokens, used when `max_new_tokens` is unset
    pub max_length: usize,
    /// Number of tokens to generate, takes precedence over `max_length`
    pub max_new_tokens: Option<usize>,
    pub temperature: f64,
    pub top_p: f64,
    /// Greedy decoding when false
    pub do_sample: bool,
    pub num_return_sequences: usize,
    pub seed: Option<u64>,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            max_length: 512,
            max_new_tokens: None,
            temperature: 0.7,
            top_p: 0.9,
            do_sample: true,
            num_return_sequences: 1,
            seed: None,
        }
    }
}

/// The configuration a generation actually ran with.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub prompt_tokens: usize,
    pub max_new_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    pub temperature: f64,
    pub top_p: f64,
    pub do_sample: bool,
    pub num_return_sequences: usize,
    /// Set when the prompt exhausted `max_length` and [`MIN_NEW_TOKENS`] was used instead
    pub length_override: bool,
}

/// What the pipeline needs to sample one sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub max_new_tokens: usize,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub seed: Option<u64>,
}

impl GenerationRequest {
    pub fn resolve(&self, prompt_tokens: usize) -> EffectiveConfig {
        let (max_new_tokens, max_length, length_override) = match self.max_new_tokens {
            Some(max_new_tokens) => (max_new_tokens, None, false),
            None if prompt_tokens >= self.max_length => (MIN_NEW_TOKENS, None, true),
            None => (
                self.max_length - prompt_tokens,
                Some(self.max_length),
                false,
            ),
        };

        EffectiveConfig {
            prompt_tokens,
            max_new_tokens,
            max_length,
            temperature: self.temperature,
            top_p: self.top_p,
            do_sample: self.do_sample,
            num_return_sequences: self.num_return_sequences,
            length_override,
        }
    }
}

impl EffectiveConfig {
    pub fn sampling(&self, seed: Option<u64>) -> SamplingParams {
        let (temperature, top_p) = if self.do_sample {
            (Some(self.temperature), Some(self.top_p))
        } else {
            (None, None)
        };
        SamplingParams {
            max_new_tokens: self.max_new_tokens,
            temperature,
            top_p,
            seed,
        }
    }
}
