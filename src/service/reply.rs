use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::inference::client::{excerpt, ModelClient};
use crate::inference::model_config::GenerationRequest;
use crate::service::intent::{classify, EXAMPLE_RULES, FALLBACK_RULES};
use crate::service::FALLBACK_PROMPT;
use crate::task::reply::{ReplyDebug, ReplyRequest};

pub const GENERATED_PROMPT: &str = "ai_generated";

const REPLY_MAX_NEW_TOKENS: usize = 80;
const REPLY_TEMPERATURE: f64 = 0.8;
const REPLY_TOP_P: f64 = 0.9;

const MAX_REPLY_CHARS: usize = 60;
const NO_REPLY: &str = "ありがとうございます。検討させていただきます。";
const FAILED_REPLY: &str = "申し訳ございません、適切な返信を生成できませんでした";
const SKIPPED_PREFIXES: [&str; 3] = ["引用", "田中さんからの", "上司からの"];
const META_WORDS: [&str; 3] = ["返信", "メッセージ", "ポイント"];
const POLITE_EXPRESSIONS: [&str; 6] = ["です", "ます", "ございます", "いたします", "させて", "お疲れ様"];

#[derive(Serialize, Debug, Clone)]
pub struct Reply {
    pub reply: String,
    pub reply_at: DateTime<Utc>,
    /// `"ai_generated"` or `"fallback"`
    pub prompt_used: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<ReplyDebug>,
}

pub struct ReplyService {
    client: ModelClient,
    debug_mode: bool,
}

impl ReplyService {
    pub fn new(client: ModelClient, debug_mode: bool) -> Self {
        Self { client, debug_mode }
    }

    #[tracing::instrument(level = "info", skip_all, fields(user = %request.settings.user_id))]
    pub async fn generate_reply(&self, request: &ReplyRequest) -> Reply {
        let prompt = reply_prompt(request);
        debug!(prompt = %excerpt(&prompt, 100), "Reply prompt built");

        let generation = GenerationRequest {
            max_new_tokens: Some(REPLY_MAX_NEW_TOKENS),
            temperature: REPLY_TEMPERATURE,
            top_p: REPLY_TOP_P,
            do_sample: true,
            ..Default::default()
        };
        let result = self.client.generate(&prompt, generation).await;

        if let Some(err) = result.error {
            warn!("Reply generation failed, using a canned reply: {err}");
            return Reply {
                reply: fallback_reply(request).to_string(),
                reply_at: Utc::now(),
                prompt_used: FALLBACK_PROMPT,
                confidence: None,
                error: Some(err),
                debug: None,
            };
        }

        let reply = format_reply(&result.generated_text);
        let confidence = reply_confidence(&reply);
        info!(confidence, reply = %excerpt(&reply, 50), "Reply generated");

        let debug = self.debug_mode.then(|| {
            debug!(raw = %result.generated_text, formatted = %reply, "Raw reply generation");
            ReplyDebug {
                prompt_used: GENERATED_PROMPT.to_string(),
                confidence,
                raw_generation: excerpt(&result.generated_text, 200).to_string(),
                prompt: format!("{}...", excerpt(&prompt, 100)),
                generation_config: result.config.clone(),
            }
        });

        Reply {
            reply,
            reply_at: Utc::now(),
            prompt_used: GENERATED_PROMPT,
            confidence: Some(confidence),
            error: None,
            debug,
        }
    }
}

pub fn reply_prompt(request: &ReplyRequest) -> String {
    let instruction = &request.mission.instruction;
    let example = classify(EXAMPLE_RULES, instruction).example_reply();
    format!(
        "「{}」という{}からのメッセージに対して、{}という方針で返信してください。\n\n例: {}\n\n返信:",
        request.message.content, request.settings.reply_to, instruction, example
    )
}

pub fn fallback_reply(request: &ReplyRequest) -> &'static str {
    let mission = format!(
        "{}\n{}",
        request.mission.instruction.to_lowercase(),
        request.mission.goal.to_lowercase()
    );
    classify(FALLBACK_RULES, &mission).fallback_reply()
}

fn is_usable_sentence(sentence: &str) -> bool {
    sentence.chars().count() > 5
        && !SKIPPED_PREFIXES
            .iter()
            .any(|prefix| sentence.starts_with(prefix))
        && !META_WORDS.iter().any(|word| sentence.contains(word))
}

/// Builds a short reply from the first usable sentences of the generation.
pub fn format_reply(generated: &str) -> String {
    let sentences: Vec<&str> = generated
        .trim()
        .split('。')
        .take(3)
        .map(str::trim)
        .filter(|sentence| is_usable_sentence(sentence))
        .collect();

    let Some(first) = sentences.first() else {
        return NO_REPLY.to_string();
    };

    let mut reply = first.to_string();
    if let Some(second) = sentences.get(1) {
        if reply.chars().count() < 30 {
            reply.push('。');
            reply.push_str(second);
        }
    }
    if reply.chars().count() > MAX_REPLY_CHARS {
        reply = format!("{}...", excerpt(&reply, MAX_REPLY_CHARS));
    }
    if !reply.ends_with('。') {
        reply.push('。');
    }
    reply
}

pub fn reply_confidence(text: &str) -> f64 {
    let mut confidence: f64 = 0.5;
    let length = text.chars().count();
    if (10..=150).contains(&length) {
        confidence += 0.2;
    } else if length < 10 {
        confidence -= 0.3;
    }
    if POLITE_EXPRESSIONS.iter().any(|expr| text.contains(expr)) {
        confidence += 0.2;
    }
    if text.contains(FAILED_REPLY) {
        confidence = 0.1;
    }
    if text.contains('【') || text.contains('】') {
        confidence -= 0.2;
    }
    confidence.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::inference::client::testing::ScriptedGenerator;
    use crate::task::reply::{ReplyMessage, ReplyMission, ReplySettings};

    fn request(instruction: &str, goal: &str) -> ReplyRequest {
        ReplyRequest {
            settings: ReplySettings {
                user_id: "user_123456".into(),
                channel: "chatwork:projectA".into(),
                reply_to: "上司の田中さん".into(),
            },
            mission: ReplyMission {
                instruction: instruction.into(),
                goal: goal.into(),
            },
            message: ReplyMessage {
                content: "今日、飲みに行かない？".into(),
                timestamp: "2025-08-05T14:23:00+09:00".parse().unwrap(),
            },
        }
    }

    fn service(generator: Arc<ScriptedGenerator>, debug_mode: bool) -> ReplyService {
        ReplyService::new(ModelClient::new(generator, 1), debug_mode)
    }

    #[tokio::test]
    async fn unavailable_model_uses_decline_template() {
        let service = service(Arc::new(ScriptedGenerator::failing("model unavailable")), false);

        let reply = service
            .generate_reply(&request("断る方向で返信してください", "やんわり伝える"))
            .await;

        assert_eq!(reply.prompt_used, FALLBACK_PROMPT);
        assert!(reply
            .reply
            .starts_with("お忙しい中ご連絡いただきありがとうございます"));
        assert_eq!(reply.error.as_deref(), Some("model unavailable"));
        assert!(reply.confidence.is_none());
    }

    #[tokio::test]
    async fn generation_uses_fixed_budget_and_formats() {
        let generator = Arc::new(ScriptedGenerator::replying(
            "お誘いありがとうございます。今回は予定があり難しいです。また誘ってください。",
        ));
        let service = service(generator.clone(), false);

        let reply = service
            .generate_reply(&request("共感しつつ距離を取る", "角を立てない"))
            .await;

        assert_eq!(reply.prompt_used, GENERATED_PROMPT);
        assert_eq!(
            reply.reply,
            "お誘いありがとうございます。今回は予定があり難しいです。"
        );
        assert!(reply.debug.is_none());

        let calls = generator.calls.lock().unwrap();
        let (prompt, params) = &calls[0];
        assert_eq!(params.max_new_tokens, REPLY_MAX_NEW_TOKENS);
        assert_eq!(params.temperature, Some(REPLY_TEMPERATURE));
        assert_eq!(params.top_p, Some(REPLY_TOP_P));
        assert!(prompt.contains("お誘いいただき嬉しいのですが"));
        assert!(prompt.ends_with("返信:"));
    }

    #[tokio::test]
    async fn debug_mode_attaches_generation_details() {
        let generator = Arc::new(ScriptedGenerator::replying("承知いたしました、確認いたします"));
        let service = service(generator, true);

        let reply = service.generate_reply(&request("丁寧に", "確認")).await;

        let debug = reply.debug.unwrap();
        assert_eq!(debug.raw_generation, "承知いたしました、確認いたします");
        assert!(debug.prompt.ends_with("..."));
        assert_eq!(debug.generation_config.unwrap().max_new_tokens, 80);
        assert_eq!(reply.reply, "承知いたしました、確認いたします。");
    }

    #[test]
    fn fallback_follows_keyword_rules() {
        let cases = [
            ("共感しつつ距離を取る", "角を立てずにやんわり断ること", "お忙しい中"),
            ("相手に共感する", "関係維持", "お疲れ様です。おっしゃる通り"),
            ("距離を取る", "", "ご連絡いただきありがとうございます。検討"),
            ("丁寧に", "", "お疲れ様です。ご連絡いただき"),
        ];
        for (instruction, goal, expected) in cases {
            let reply = fallback_reply(&request(instruction, goal));
            assert!(reply.starts_with(expected), "{instruction}: {reply}");
        }
    }

    #[test]
    fn format_skips_meta_and_short_sentences() {
        let generated = "はい。上司からのメッセージです。返信のポイントを述べます。";
        assert_eq!(format_reply(generated), NO_REPLY);

        let generated = "引用：はい。承知しました、その件は明日対応します";
        assert_eq!(format_reply(generated), "承知しました、その件は明日対応します。");
    }

    #[test]
    fn format_truncates_long_replies() {
        let long = "あ".repeat(80);
        let reply = format_reply(&long);
        assert_eq!(reply, format!("{}...。", "あ".repeat(60)));
    }

    #[test]
    fn format_only_appends_second_sentence_to_short_first() {
        let first = "い".repeat(35);
        let generated = format!("{first}。二つ目の文章です。");
        assert_eq!(format_reply(&generated), format!("{first}。"));
    }

    #[test]
    fn formatted_reply_is_never_empty_and_ends_with_period() {
        for generated in ["", "。。。", "ok", "ありがとうございます。", &"う".repeat(200)] {
            let reply = format_reply(generated);
            assert!(!reply.is_empty());
            assert!(reply.ends_with('。'));
        }
    }

    #[test]
    fn confidence_penalizes_short_and_bracketed() {
        assert!((reply_confidence("短い") - 0.2).abs() < 1e-9);
        assert!((reply_confidence("お疲れ様です。承知しました。") - 0.9).abs() < 1e-9);
        assert!((reply_confidence("【注意】お疲れ様です。承知しました。") - 0.7).abs() < 1e-9);
        assert!((reply_confidence(FAILED_REPLY) - 0.1).abs() < 1e-9);
        assert_eq!(reply_confidence(&"あ".repeat(200)), 0.5);
    }
}
