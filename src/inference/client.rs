use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::inference::model_config::{EffectiveConfig, GenerationRequest, SamplingParams};
use crate::inference::models::model::ModelInfo;

/// Text returned in place of a generation that failed.
pub const GENERATION_APOLOGY: &str = "申し訳ございません、システムエラーが発生しました。";
/// Text returned when the model produced no sequence at all.
pub const EMPTY_GENERATION: &str = "生成に失敗しました";

/// A loaded language model. Calls are blocking.
pub trait TextGenerator: Send + Sync {
    fn count_tokens(&self, prompt: &str) -> Result<usize>;

    fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<String>;

    fn info(&self) -> ModelInfo;
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GenerationResult {
    /// First generated sequence, or [`GENERATION_APOLOGY`] on failure
    pub generated_text: String,
    pub sequences: Vec<String>,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<EffectiveConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub inference_time: f64,
}

impl GenerationResult {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Handle to the process wide model. Cloning is cheap and shares the model and its admission limit.
#[derive(Clone)]
pub struct ModelClient {
    generator: Arc<dyn TextGenerator>,
    permits: Arc<Semaphore>,
}

impl ModelClient {
    pub fn new(generator: Arc<dyn TextGenerator>, max_concurrent_generations: usize) -> Self {
        Self {
            generator,
            permits: Arc::new(Semaphore::new(max_concurrent_generations.max(1))),
        }
    }

    pub fn info(&self) -> ModelInfo {
        self.generator.info()
    }

    /// Runs the model on `prompt`. Failures are reported through [`GenerationResult::error`].
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn generate(&self, prompt: &str, request: GenerationRequest) -> GenerationResult {
        info!(prompt = %excerpt(prompt, 50), "Starting text generation");
        let start = Instant::now();

        match self.try_generate(prompt, request).await {
            Ok((sequences, config)) => {
                let generated_text = sequences
                    .first()
                    .cloned()
                    .unwrap_or_else(|| EMPTY_GENERATION.to_string());
                info!(
                    chars = generated_text.chars().count(),
                    "Text generation finished"
                );
                GenerationResult {
                    generated_text,
                    sequences,
                    prompt: prompt.to_string(),
                    config: Some(config),
                    error: None,
                    inference_time: start.elapsed().as_secs_f64(),
                }
            }
            Err(err) => {
                error!("Text generation failed: {err:#}");
                GenerationResult {
                    generated_text: GENERATION_APOLOGY.to_string(),
                    sequences: Vec::new(),
                    prompt: prompt.to_string(),
                    config: None,
                    error: Some(format!("{err:#}")),
                    inference_time: start.elapsed().as_secs_f64(),
                }
            }
        }
    }

    async fn try_generate(
        &self,
        prompt: &str,
        request: GenerationRequest,
    ) -> Result<(Vec<String>, EffectiveConfig)> {
        let _permit = self.permits.acquire().await?;
        let generator = Arc::clone(&self.generator);
        let prompt = prompt.to_string();

        tokio::task::spawn_blocking(move || {
            let prompt_tokens = generator.count_tokens(&prompt)?;
            let config = request.resolve(prompt_tokens);
            if config.length_override {
                warn!(
                    prompt_tokens,
                    max_length = request.max_length,
                    max_new_tokens = config.max_new_tokens,
                    "Prompt reaches max_length, generating a minimal continuation instead"
                );
            }

            let sequences = (0..config.num_return_sequences)
                .map(|index| {
                    let seed = request.seed.map(|seed| seed.wrapping_add(index as u64));
                    generator.generate(&prompt, &config.sampling(seed))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok((sequences, config))
        })
        .await?
    }
}

/// First `max_chars` characters of `text`.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};

    use super::TextGenerator;
    use crate::config::ModelArchitecture;
    use crate::inference::model_config::SamplingParams;
    use crate::inference::models::model::{ModelInfo, ModelSource};

    enum Script {
        Reply(String),
        Fail(String),
        Panic(String),
    }

    /// Generator that returns a fixed output and counts one token per character.
    pub(crate) struct ScriptedGenerator {
        script: Script,
        pub(crate) calls: Mutex<Vec<(String, SamplingParams)>>,
    }

    impl ScriptedGenerator {
        fn new(script: Script) -> Self {
            Self {
                script,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn replying(output: &str) -> Self {
            Self::new(Script::Reply(output.to_string()))
        }

        pub(crate) fn failing(message: &str) -> Self {
            Self::new(Script::Fail(message.to_string()))
        }

        pub(crate) fn panicking(message: &str) -> Self {
            Self::new(Script::Panic(message.to_string()))
        }
    }

    impl TextGenerator for ScriptedGenerator {
        fn count_tokens(&self, prompt: &str) -> Result<usize> {
            Ok(prompt.chars().count())
        }

        fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((prompt.to_string(), *params));
            match &self.script {
                Script::Reply(output) => Ok(output.clone()),
                Script::Fail(message) => Err(anyhow!(message.clone())),
                Script::Panic(message) => panic!("{message}"),
            }
        }

        fn info(&self) -> ModelInfo {
            ModelInfo {
                model_name: "scripted".into(),
                model_path: "./data/models".into(),
                source: ModelSource::Local,
                architecture: ModelArchitecture::Llama,
                device: "cpu".into(),
                tokenizer_vocab_size: 32000,
            }
        }
    }
}
