//! Keyword rules that pick how a reply should sound.
//!
//! The prompt example and the fallback reply are both chosen from here so the two never drift apart.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyIntent {
    /// Sympathize while keeping distance
    SympathizeKeepDistance,
    Decline,
    Sympathize,
    KeepDistance,
    Acknowledge,
}

/// Matches when every keyword occurs in the inspected text.
#[derive(Debug)]
pub struct KeywordRule {
    pub keywords: &'static [&'static str],
    pub intent: ReplyIntent,
}

/// Applied to the instruction to choose the example shown in the prompt.
pub static EXAMPLE_RULES: &[KeywordRule] = &[
    KeywordRule {
        keywords: &["共感", "距離"],
        intent: ReplyIntent::SympathizeKeepDistance,
    },
    KeywordRule {
        keywords: &["断る"],
        intent: ReplyIntent::Decline,
    },
    KeywordRule {
        keywords: &["共感"],
        intent: ReplyIntent::Sympathize,
    },
];

/// Applied to instruction and goal together to choose a canned reply.
pub static FALLBACK_RULES: &[KeywordRule] = &[
    KeywordRule {
        keywords: &["断る"],
        intent: ReplyIntent::Decline,
    },
    KeywordRule {
        keywords: &["やんわり"],
        intent: ReplyIntent::Decline,
    },
    KeywordRule {
        keywords: &["共感"],
        intent: ReplyIntent::Sympathize,
    },
    KeywordRule {
        keywords: &["距離"],
        intent: ReplyIntent::KeepDistance,
    },
];

/// First matching rule wins, [`ReplyIntent::Acknowledge`] otherwise.
pub fn classify(rules: &[KeywordRule], text: &str) -> ReplyIntent {
    rules
        .iter()
        .find(|rule| rule.keywords.iter().all(|keyword| text.contains(keyword)))
        .map_or(ReplyIntent::Acknowledge, |rule| rule.intent)
}

impl ReplyIntent {
    pub fn example_reply(self) -> &'static str {
        match self {
            ReplyIntent::SympathizeKeepDistance => {
                "ありがとうございます。お誘いいただき嬉しいのですが、今回は都合がつかず参加が難しいです。"
            }
            ReplyIntent::Decline => "申し訳ございませんが、今回は参加が難しいです。",
            ReplyIntent::Sympathize => "お疲れ様です。その通りですね。",
            ReplyIntent::KeepDistance | ReplyIntent::Acknowledge => {
                "ありがとうございます。検討いたします。"
            }
        }
    }

    pub fn fallback_reply(self) -> &'static str {
        match self {
            ReplyIntent::Decline => {
                "お忙しい中ご連絡いただきありがとうございます。申し訳ございませんが、今回は都合がつかないため参加が難しい状況です。またの機会がございましたら、ぜひよろしくお願いいたします。"
            }
            ReplyIntent::Sympathize => {
                "お疲れ様です。おっしゃる通りですね。大変参考になるご意見をありがとうございます。"
            }
            ReplyIntent::KeepDistance | ReplyIntent::SympathizeKeepDistance => {
                "ご連絡いただきありがとうございます。検討させていただき、改めてご連絡いたします。"
            }
            ReplyIntent::Acknowledge => {
                "お疲れ様です。ご連絡いただきありがとうございます。内容を確認させていただき、適切に対応いたします。"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_prefers_combined_rule() {
        assert_eq!(
            classify(EXAMPLE_RULES, "共感しつつ距離を取る"),
            ReplyIntent::SympathizeKeepDistance
        );
        assert_eq!(classify(EXAMPLE_RULES, "共感する"), ReplyIntent::Sympathize);
        assert_eq!(classify(EXAMPLE_RULES, "やんわり断る"), ReplyIntent::Decline);
        assert_eq!(classify(EXAMPLE_RULES, "丁寧に"), ReplyIntent::Acknowledge);
    }

    #[test]
    fn fallback_order() {
        assert_eq!(classify(FALLBACK_RULES, "共感して断る"), ReplyIntent::Decline);
        assert_eq!(classify(FALLBACK_RULES, "やんわり"), ReplyIntent::Decline);
        assert_eq!(
            classify(FALLBACK_RULES, "共感しつつ距離を取る"),
            ReplyIntent::Sympathize
        );
        assert_eq!(classify(FALLBACK_RULES, "距離を取る"), ReplyIntent::KeepDistance);
        assert_eq!(classify(FALLBACK_RULES, ""), ReplyIntent::Acknowledge);
    }

    #[test]
    fn canned_replies_end_with_period() {
        let intents = [
            ReplyIntent::SympathizeKeepDistance,
            ReplyIntent::Decline,
            ReplyIntent::Sympathize,
            ReplyIntent::KeepDistance,
            ReplyIntent::Acknowledge,
        ];
        for intent in intents {
            assert!(intent.fallback_reply().ends_with('。'));
            assert!(intent.example_reply().ends_with('。'));
        }
    }
}
