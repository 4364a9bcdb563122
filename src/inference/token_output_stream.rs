use anyhow::{Error, Result};
use tokenizers::Tokenizer;

// Taken from https://github.com/huggingface/candle/blob/main/candle-examples/src/token_output_stream.rs
/// Incremental detokenizer. Text is only released once it ends in a complete character,
/// so multi-token kana and kanji are never split.
#[derive(Clone)]
pub struct TokenOutputStream {
    tokenizer: Tokenizer,
    tokens: Vec<u32>,
    prev_index: usize,
    current_index: usize,
}

impl TokenOutputStream {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self {
            tokenizer,
            tokens: Vec::new(),
            prev_index: 0,
            current_index: 0,
        }
    }

    fn decode(&self, tokens: &[u32]) -> Result<String> {
        self.tokenizer.decode(tokens, true).map_err(Error::msg)
    }

    pub fn next_token(&mut self, token: u32) -> Result<Option<String>> {
        let prev_text = if self.tokens.is_empty() {
            String::new()
        } else {
            self.decode(&self.tokens[self.prev_index..self.current_index])?
        };
        self.tokens.push(token);
        let text = self.decode(&self.tokens[self.prev_index..])?;
        let complete = text
            .chars()
            .last()
            .is_some_and(|c| c.is_alphanumeric() && c != char::REPLACEMENT_CHARACTER);
        if text.len() <= prev_text.len() || !complete {
            return Ok(None);
        }
        match text.get(prev_text.len()..) {
            Some(new_text) => {
                let new_text = new_text.to_string();
                self.prev_index = self.current_index;
                self.current_index = self.tokens.len();
                Ok(Some(new_text))
            }
            None => Ok(None),
        }
    }

    pub fn decode_rest(&self) -> Result<Option<String>> {
        let prev_text = if self.tokens.is_empty() {
            String::new()
        } else {
            self.decode(&self.tokens[self.prev_index..self.current_index])?
        };
        let text = self.decode(&self.tokens[self.prev_index..])?;
        if text.len() > prev_text.len() {
            Ok(text.get(prev_text.len()..).map(str::to_string))
        } else {
            Ok(None)
        }
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
        self.prev_index = 0;
        self.current_index = 0;
    }
}
