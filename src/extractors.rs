use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;

use crate::error::ServiceError;

/// JSON body extractor whose rejection uses the service error body instead of plain text.
pub(crate) struct ServiceJson<T>(pub(crate) T);

#[async_trait]
impl<S, T> FromRequest<S> for ServiceJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ServiceJson(value)),
            Err(rejection) => Err(ServiceError::new(
                rejection.status(),
                format!("リクエストが不正です: {}", rejection.body_text()),
            )),
        }
    }
}
