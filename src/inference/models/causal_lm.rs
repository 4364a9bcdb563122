use std::path::{Path, PathBuf};

use anyhow::Result;
use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};
use tracing::info;

use crate::config::Config;
use crate::inference::client::TextGenerator;
use crate::inference::model_config::SamplingParams;
use crate::inference::models::model::{ModelInfo, ModelSource};
use crate::inference::text_pipeline::TextGeneratorPipeline;

/// A quantized causal language model loaded once and shared by every request.
///
/// Each generation works on a clone of the pipeline. The weights are reference counted by
/// candle, so a clone only duplicates the KV cache and sampler.
pub struct CausalLmModel {
    info: ModelInfo,
    generator_pipeline: TextGeneratorPipeline,
}

impl CausalLmModel {
    #[tracing::instrument(level = "info", skip(config), fields(model = %config.model_name))]
    pub fn load(config: &Config) -> Result<Self> {
        let (source, tokenizer_file, gguf_file) = match local_files(config) {
            Some((tokenizer_file, gguf_file)) => {
                info!(path = %config.model_path, "Using local model files");
                (ModelSource::Local, tokenizer_file, gguf_file)
            }
            None => {
                info!(repo = %config.model_name, "Downloading model from the Hugging Face hub");
                let (tokenizer_file, gguf_file) = hub_files(config)?;
                (ModelSource::Hub, tokenizer_file, gguf_file)
            }
        };

        let generator_pipeline = TextGeneratorPipeline::with_quantized_gguf(
            config.architecture,
            &tokenizer_file,
            &gguf_file,
            &config.eos_token,
            config.repeat_penalty,
            config.repeat_context_size,
        )?;

        let info = ModelInfo {
            model_name: config.model_name.clone(),
            model_path: config.model_path.clone(),
            source,
            architecture: config.architecture,
            device: format!("{:?}", generator_pipeline.device).to_lowercase(),
            tokenizer_vocab_size: generator_pipeline
                .tokenizer
                .tokenizer()
                .get_vocab_size(true),
        };
        info!(device = %info.device, vocab = info.tokenizer_vocab_size, "Model loaded");

        Ok(Self {
            info,
            generator_pipeline,
        })
    }
}

fn local_files(config: &Config) -> Option<(PathBuf, PathBuf)> {
    let dir = Path::new(&config.model_path);
    let tokenizer_file = dir.join(&config.tokenizer_filename);
    let gguf_file = dir.join(&config.weights_filename);
    (tokenizer_file.is_file() && gguf_file.is_file()).then_some((tokenizer_file, gguf_file))
}

fn hub_files(config: &Config) -> Result<(PathBuf, PathBuf)> {
    let mut builder = ApiBuilder::new();
    if let Ok(token) = std::env::var("HF_TOKEN") {
        builder = builder.with_token(Some(token));
    }
    let api = builder.build()?;

    let model_repo = api.repo(Repo::with_revision(
        config.model_name.clone(),
        RepoType::Model,
        config.model_revision.clone(),
    ));
    let tokenizer_repo = api.repo(Repo::with_revision(
        config.tokenizer_repo().to_string(),
        RepoType::Model,
        "main".into(),
    ));

    let gguf_file = model_repo.get(&config.weights_filename)?;
    let tokenizer_file = tokenizer_repo.get(&config.tokenizer_filename)?;
    Ok((tokenizer_file, gguf_file))
}

impl TextGenerator for CausalLmModel {
    fn count_tokens(&self, prompt: &str) -> Result<usize> {
        self.generator_pipeline.count_tokens(prompt)
    }

    #[tracing::instrument(level = "info", skip(self, prompt))]
    fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<String> {
        let mut pipeline = self.generator_pipeline.clone();
        pipeline.apply_sampling(params);
        let (output, inference_time) = pipeline.generate(prompt, params.max_new_tokens)?;
        info!(histogram.inference_time_seconds = inference_time, "Sequence generated");
        Ok(output)
    }

    fn info(&self) -> ModelInfo {
        self.info.clone()
    }
}
