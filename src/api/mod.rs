use std::any::Any;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::error::ServiceError;
use crate::inference::client::ModelClient;
use crate::service::excuse::ExcuseService;
use crate::service::reply::ReplyService;

pub mod excuse;
pub mod model;
pub mod reply;

/// Services shared by every request. They all hold the same model.
#[derive(Clone)]
pub struct AppState {
    pub model: ModelClient,
    pub excuse: Arc<ExcuseService>,
    pub reply: Arc<ReplyService>,
}

impl AppState {
    pub fn new(model: ModelClient, debug_mode: bool) -> Self {
        Self {
            excuse: Arc::new(ExcuseService::new(model.clone())),
            reply: Arc::new(ReplyService::new(model.clone(), debug_mode)),
            model,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

impl HealthResponse {
    pub(crate) fn healthy(service: &str) -> Self {
        Self {
            status: "healthy".into(),
            service: service.into(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let excuse_router = Router::new()
        .route("/generate", post(excuse::handle_generate_excuse))
        .route("/health", get(excuse::handle_health))
        .layer(CatchPanicLayer::custom(excuse::panic_response));

    let reply_router = Router::new()
        .route("/generate-reply", post(reply::handle_generate_reply))
        .route("/health", get(reply::handle_health))
        .layer(CatchPanicLayer::custom(reply::panic_response));

    let model_router = Router::new().route("/info", get(model::handle_model_info));

    Router::new()
        .nest("/v1/excuse", excuse_router)
        .nest("/shatiku-ai", reply_router)
        .nest("/v1/model", model_router)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub(crate) fn panic_message(err: &(dyn Any + Send)) -> &str {
    if let Some(message) = err.downcast_ref::<String>() {
        message.as_str()
    } else if let Some(message) = err.downcast_ref::<&str>() {
        *message
    } else {
        "不明なエラー"
    }
}

pub(crate) fn panic_to_response(prefix: &str, err: Box<dyn Any + Send + 'static>) -> Response {
    ServiceError::internal(format!("{prefix}: {}", panic_message(err.as_ref()))).into_response()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    use super::*;
    use crate::inference::client::testing::ScriptedGenerator;

    pub(crate) fn app(generator: ScriptedGenerator, debug_mode: bool) -> Router {
        router(AppState::new(
            ModelClient::new(Arc::new(generator), 1),
            debug_mode,
        ))
    }

    pub(crate) async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    pub(crate) fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    pub(crate) fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub(crate) fn parse<T: DeserializeOwned>(value: serde_json::Value) -> T {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn health_endpoints() {
        let cases = [
            ("/v1/excuse/health", "excuse_generation"),
            ("/shatiku-ai/health", "reply_generation"),
        ];
        for (uri, service) in cases {
            let (status, body) = send(app(ScriptedGenerator::replying(""), false), get(uri)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(
                parse::<HealthResponse>(body),
                HealthResponse::healthy(service)
            );
        }
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let response = app(ScriptedGenerator::replying(""), false)
            .oneshot(get("/v1/unknown"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    async fn exploding_handler() -> &'static str {
        panic!("unexpected state")
    }

    #[tokio::test]
    async fn handler_panics_become_internal_errors() {
        let cases = [
            (
                excuse::panic_response as fn(Box<dyn Any + Send + 'static>) -> Response,
                "言い訳の生成に失敗しました: unexpected state",
            ),
            (
                reply::panic_response,
                "自動返信の生成に失敗しました: unexpected state",
            ),
        ];
        for (on_panic, detail) in cases {
            let app = Router::new()
                .route("/generate", post(exploding_handler))
                .layer(CatchPanicLayer::custom(on_panic));

            let (status, body) = send(app, post_json("/generate", &serde_json::json!({}))).await;

            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(parse::<crate::error::HttpErrorResponse>(body).detail, detail);
        }
    }

    #[test]
    fn panic_payloads_become_detail() {
        let response = panic_to_response("失敗しました", Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "不明なエラー");
    }
}
