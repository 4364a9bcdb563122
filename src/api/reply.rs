use std::any::Any;

use axum::extract::State;
use axum::response::Response;
use axum::Json;
use tracing::info;

use crate::api::{panic_to_response, AppState, HealthResponse};
use crate::error::ServiceResult;
use crate::extractors::ServiceJson;
use crate::inference::client::excerpt;
use crate::task::reply::{ReplyRequest, ReplyResponse};

#[axum_macros::debug_handler]
pub(crate) async fn handle_generate_reply(
    State(state): State<AppState>,
    ServiceJson(req): ServiceJson<ReplyRequest>,
) -> ServiceResult<Json<ReplyResponse>> {
    info!(
        monotonic_counter.reply_requests = 1,
        user = %req.settings.user_id,
        channel = %req.settings.channel,
        "Auto reply requested"
    );

    let reply = state.reply.generate_reply(&req).await;
    info!(prompt_used = reply.prompt_used, reply = %excerpt(&reply.reply, 50), "Auto reply generated");

    Ok(Json(ReplyResponse {
        reply: reply.reply,
        reply_at: reply.reply_at,
        debug: reply.debug,
    }))
}

pub(crate) async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy("reply_generation"))
}

pub(crate) fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    panic_to_response("自動返信の生成に失敗しました", err)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::tests::{app, post_json, send};
    use crate::inference::client::testing::ScriptedGenerator;

    fn body(instruction: &str, goal: &str) -> serde_json::Value {
        json!({
            "settings": {"userId": "user_123456", "channel": "chatwork:projectA", "replyTo": "上司の田中さん"},
            "mission": {"instruction": instruction, "goal": goal},
            "message": {"content": "今日、飲みに行かない？", "timestamp": "2025-08-05T14:23:00+09:00"}
        })
    }

    #[tokio::test]
    async fn generated_reply_has_reply_at() {
        let app = app(
            ScriptedGenerator::replying("お誘いありがとうございます。今回は見送らせてください。"),
            false,
        );

        let (status, response) = send(
            app,
            post_json("/shatiku-ai/generate-reply", &body("丁寧に", "断る")),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            response["reply"],
            "お誘いありがとうございます。今回は見送らせてください。"
        );
        let reply_at = response["replyAt"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(reply_at).is_ok());
        assert!(response.get("debug").is_none());
    }

    #[tokio::test]
    async fn unavailable_model_returns_template() {
        let app = app(ScriptedGenerator::failing("model unavailable"), true);

        let (status, response) = send(
            app,
            post_json(
                "/shatiku-ai/generate-reply",
                &body("断るように返信", "やんわり伝える"),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(response["reply"]
            .as_str()
            .unwrap()
            .starts_with("お忙しい中ご連絡いただきありがとうございます"));
        assert!(response.get("debug").is_none());
    }

    #[tokio::test]
    async fn debug_mode_exposes_raw_generation() {
        let app = app(ScriptedGenerator::replying("承知いたしました"), true);

        let (_, response) = send(
            app,
            post_json("/shatiku-ai/generate-reply", &body("共感する", "関係維持")),
        )
        .await;

        assert_eq!(response["debug"]["raw_generation"], "承知いたしました");
        assert_eq!(response["debug"]["prompt_used"], "ai_generated");
    }
}
