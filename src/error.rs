use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

// Taken from https://github.com/tokio-rs/axum/blob/main/examples/anyhow-error-response/src/main.rs
#[derive(Debug)]
pub struct ServiceError {
    pub status: StatusCode,
    pub message: HttpErrorResponse,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HttpErrorResponse {
    pub detail: String,
}

impl From<String> for HttpErrorResponse {
    fn from(message: String) -> Self {
        HttpErrorResponse { detail: message }
    }
}

impl From<&str> for HttpErrorResponse {
    fn from(message: &str) -> Self {
        HttpErrorResponse {
            detail: message.to_string(),
        }
    }
}

impl ServiceError {
    pub fn new(status: StatusCode, message: impl Into<HttpErrorResponse>) -> Self {
        ServiceError {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<HttpErrorResponse>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let mut res = Json(self.message).into_response();
        *res.status_mut() = self.status;
        res
    }
}

impl<E> From<E> for ServiceError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        ServiceError::internal(format!("{:#}", err.into()))
    }
}

pub type ServiceResult<T, E = ServiceError> = Result<T, E>;

#[macro_export]
macro_rules! bail_service {
    ($error_message:expr) => {
        return Err($crate::error::ServiceError::internal($error_message))
    };
    ($status:expr, $error_message:expr) => {
        return Err($crate::error::ServiceError::new($status, $error_message))
    };
    ($status:expr, $fmt:expr $(, $arg:expr)+) => {
        return Err($crate::error::ServiceError::new($status, format!($fmt $(, $arg)+)))
    };
}
