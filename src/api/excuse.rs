use std::any::Any;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use tracing::info;

use crate::api::{panic_to_response, AppState, HealthResponse};
use crate::bail_service;
use crate::error::ServiceResult;
use crate::extractors::ServiceJson;
use crate::task::excuse::{ExcuseRequest, ExcuseResponse};

#[axum_macros::debug_handler]
pub(crate) async fn handle_generate_excuse(
    State(state): State<AppState>,
    ServiceJson(req): ServiceJson<ExcuseRequest>,
) -> ServiceResult<Json<ExcuseResponse>> {
    info!(monotonic_counter.excuse_requests = 1, question = %req.question, "Excuse requested");
    if let Err(reason) = req.validate() {
        bail_service!(StatusCode::UNPROCESSABLE_ENTITY, reason);
    }

    let excuse = state
        .excuse
        .generate_excuse(&req.question, req.generation_request())
        .await;

    Ok(Json(ExcuseResponse {
        question: req.question,
        excuse: excuse.text,
        confidence: excuse.confidence,
    }))
}

pub(crate) async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy("excuse_generation"))
}

pub(crate) fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    panic_to_response("言い訳の生成に失敗しました", err)
}
