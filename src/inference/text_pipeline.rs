use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Error, Result};
use candle_core::quantized::gguf_file;
use candle_core::{DType, Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::mixformer;
use candle_transformers::models::quantized_llama::ModelWeights;
use candle_transformers::models::quantized_mixformer::MixFormerSequentialForCausalLM as Phi2;
use candle_transformers::quantized_var_builder::VarBuilder;
use rand::random;
use tokenizers::Tokenizer;

use crate::config::ModelArchitecture;
use crate::inference::model_config::SamplingParams;
use crate::inference::token_output_stream::TokenOutputStream;

// Taken from
// https://github.com/huggingface/candle/blob/main/candle-examples/examples/phi/main.rs
// https://github.com/huggingface/candle/blob/main/candle-examples/examples/quantized/main.rs
pub struct TextGeneratorPipeline {
    pub model: Model,
    pub device: Device,
    pub tokenizer: TokenOutputStream,
    pub eos_token: u32,
    pub logits_processor: LogitsProcessor,
    pub repeat_penalty: f32,
    pub repeat_context_size: usize,
}

#[derive(Clone)]
pub enum Model {
    Llama(ModelWeights),
    Phi2(Phi2),
}

impl Clone for TextGeneratorPipeline {
    fn clone(&self) -> TextGeneratorPipeline {
        TextGeneratorPipeline {
            model: self.model.clone(),
            device: self.device.clone(),
            tokenizer: self.tokenizer.clone(),
            eos_token: self.eos_token,
            logits_processor: LogitsProcessor::new(random(), None, None),
            repeat_penalty: self.repeat_penalty,
            repeat_context_size: self.repeat_context_size,
        }
    }
}

impl TextGeneratorPipeline {
    #[tracing::instrument(level = "info", skip_all, fields(architecture = ?architecture))]
    pub fn with_quantized_gguf(
        architecture: ModelArchitecture,
        tokenizer_file: &Path,
        gguf_file: &Path,
        eos_token: &str,
        repeat_penalty: f32,
        repeat_context_size: usize,
    ) -> Result<TextGeneratorPipeline> {
        let device = Device::Cpu;
        let model = match architecture {
            ModelArchitecture::Llama => {
                let mut file = std::fs::File::open(gguf_file)?;
                let content =
                    gguf_file::Content::read(&mut file).map_err(|e| e.with_path(gguf_file))?;
                Model::Llama(ModelWeights::from_gguf(content, &mut file, &device)?)
            }
            ModelArchitecture::Phi2 => {
                let vb = VarBuilder::from_gguf(gguf_file, &device)?;
                Model::Phi2(Phi2::new(&mixformer::Config::v2(), vb)?)
            }
        };

        let tokenizer = Tokenizer::from_file(tokenizer_file).map_err(Error::msg)?;
        let eos_token = match tokenizer.get_vocab(true).get(eos_token) {
            Some(token) => *token,
            None => bail!("Cannot find the {eos_token} token"),
        };

        Ok(TextGeneratorPipeline {
            model,
            device,
            tokenizer: TokenOutputStream::new(tokenizer),
            eos_token,
            logits_processor: LogitsProcessor::new(random(), None, None),
            repeat_penalty,
            repeat_context_size,
        })
    }

    pub fn count_tokens(&self, prompt: &str) -> Result<usize> {
        let encoding = self
            .tokenizer
            .tokenizer()
            .encode(prompt, true)
            .map_err(Error::msg)?;
        Ok(encoding.get_ids().len())
    }

    pub fn apply_sampling(&mut self, params: &SamplingParams) {
        self.logits_processor = LogitsProcessor::new(
            params.seed.unwrap_or_else(random),
            params.temperature,
            params.top_p,
        );
    }

    /// Generates at most `max_new_tokens` tokens after `prompt` and returns only the continuation
    /// together with the inference time in seconds.
    pub fn generate(&mut self, prompt: &str, max_new_tokens: usize) -> Result<(String, f64)> {
        if let Model::Phi2(ref mut m) = self.model {
            m.clear_kv_cache();
        }
        self.tokenizer.clear();
        let mut tokens = self
            .tokenizer
            .tokenizer()
            .encode(prompt, true)
            .map_err(Error::msg)?
            .get_ids()
            .to_vec();
        if tokens.is_empty() {
            bail!("Prompt is empty");
        }

        let mut output = String::new();
        let start_gen = Instant::now();
        for index in 0..max_new_tokens {
            let context_size = if index > 0 { 1 } else { tokens.len() };
            let start_pos = tokens.len().saturating_sub(context_size);
            let input = Tensor::new(&tokens[start_pos..], &self.device)?.unsqueeze(0)?;
            let logits = match &mut self.model {
                Model::Llama(model) => model.forward(&input, start_pos)?,
                Model::Phi2(model) => model.forward(&input)?,
            };
            let logits = logits.squeeze(0)?.to_dtype(DType::F32)?;
            let logits = if (self.repeat_penalty - 1.).abs() < f32::EPSILON {
                logits
            } else {
                let start_at = tokens.len().saturating_sub(self.repeat_context_size);
                candle_transformers::utils::apply_repeat_penalty(
                    &logits,
                    self.repeat_penalty,
                    &tokens[start_at..],
                )?
            };

            let next_token = self.logits_processor.sample(&logits)?;
            tokens.push(next_token);
            if next_token == self.eos_token {
                break;
            }
            if let Some(text) = self.tokenizer.next_token(next_token)? {
                output.push_str(&text);
            }
        }
        if let Some(text) = self.tokenizer.decode_rest()? {
            output.push_str(&text);
        }

        Ok((output, start_gen.elapsed().as_secs_f64()))
    }
}
