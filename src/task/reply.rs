use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::inference::model_config::EffectiveConfig;

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ReplyRequest {
    pub settings: ReplySettings,
    pub mission: ReplyMission,
    pub message: ReplyMessage,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReplySettings {
    pub user_id: String,
    pub channel: String,
    /// Who the reply is addressed to
    pub reply_to: String,
}

/// How the reply should behave and what it should achieve.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ReplyMission {
    pub instruction: String,
    pub goal: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ReplyMessage {
    pub content: String,
    /// Timestamps without an offset are taken as UTC
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&raw, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReplyResponse {
    pub reply: String,
    pub reply_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<ReplyDebug>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ReplyDebug {
    pub prompt_used: String,
    pub confidence: f64,
    pub raw_generation: String,
    pub prompt: String,
    pub generation_config: Option<EffectiveConfig>,
}
