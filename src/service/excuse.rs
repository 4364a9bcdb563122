use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use serde::Serialize;
use tracing::{info, warn};

use crate::inference::client::{excerpt, ModelClient};
use crate::inference::model_config::GenerationRequest;
use crate::service::FALLBACK_PROMPT;

/// Confidence reported for canned excuses.
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

pub const FALLBACK_EXCUSES: [&str; 4] = [
    "申し訳ございません、システムの不具合により適切にお答えできませんでした。",
    "恐れ入ります、技術的な問題が発生しており、現在対応中です。",
    "すみません、予期しない事象が発生しており、調査を進めております。",
    "申し上げにくいのですが、現在システムメンテナンス中のため、正常な回答ができません。",
];

const NO_EXCUSE: &str = "申し訳ございません、適切な対応ができませんでした。";
const APOLOGY_MARKERS: [&str; 3] = ["申し訳", "すみません", "恐縮"];
const FORMAL_MARKERS: [&str; 2] = ["ございます", "でした"];

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Excuse {
    pub text: String,
    pub confidence: f64,
    /// The prompt sent to the model, or `"fallback"`
    pub prompt_used: String,
}

pub struct ExcuseService {
    client: ModelClient,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl ExcuseService {
    pub fn new(client: ModelClient) -> Self {
        Self::with_rng(client, StdRng::from_entropy())
    }

    /// Uses `rng` to pick fallback excuses.
    pub fn with_rng(client: ModelClient, rng: impl RngCore + Send + 'static) -> Self {
        Self {
            client,
            rng: Mutex::new(Box::new(rng)),
        }
    }

    #[tracing::instrument(level = "info", skip(self, request))]
    pub async fn generate_excuse(&self, question: &str, request: GenerationRequest) -> Excuse {
        let prompt = excuse_prompt(question);
        let result = self.client.generate(&prompt, request).await;

        if let Some(err) = &result.error {
            warn!("Excuse generation failed, using a canned excuse: {err}");
            return Excuse {
                text: self.fallback_excuse().to_string(),
                confidence: FALLBACK_CONFIDENCE,
                prompt_used: FALLBACK_PROMPT.to_string(),
            };
        }

        let text = format_excuse(&result.generated_text);
        let confidence = excuse_confidence(&text);
        info!(confidence, excuse = %excerpt(&text, 50), "Excuse generated");
        Excuse {
            text,
            confidence,
            prompt_used: prompt,
        }
    }

    pub fn fallback_excuse(&self) -> &'static str {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        FALLBACK_EXCUSES
            .choose(&mut *rng)
            .copied()
            .unwrap_or(FALLBACK_EXCUSES[0])
    }
}

pub fn excuse_prompt(question: &str) -> String {
    format!("質問: {question}\n\n以下は上記の質問に対する丁寧で説得力のある言い訳です:\n\n")
}

/// First non-empty line that does not repeat the question.
pub fn format_excuse(generated: &str) -> String {
    generated
        .trim()
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("質問:"))
        .unwrap_or(NO_EXCUSE)
        .to_string()
}

pub fn excuse_confidence(text: &str) -> f64 {
    let mut confidence = 0.5;
    if text.chars().count() > 20 {
        confidence += 0.2;
    }
    if APOLOGY_MARKERS.iter().any(|marker| text.contains(marker)) {
        confidence += 0.2;
    }
    if FORMAL_MARKERS.iter().any(|marker| text.contains(marker)) {
        confidence += 0.1;
    }
    f64::min(confidence, 1.0)
}
