//! HTTP error mapping
//!
//! Every handler returns `Result<_, ApiError>`; failures render as
//! `{"error": "..."}` with a status derived from the error kind.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};
use xiazki_common::Error;

use crate::services::ProviderError;

#[derive(Debug)]
pub enum ApiError {
    Core(Error),
    Autofill(ProviderError),
    BadRequest(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Core(err)
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        ApiError::Autofill(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            ApiError::Core(err) => match err {
                Error::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
                Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
                Error::NotFound(msg) => (StatusCode::NOT_FOUND, format!("Not found: {}", msg)),
                Error::Conflict(msg) => (StatusCode::CONFLICT, msg),
                other => {
                    error!("Request failed: {}", other);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
                }
            },
            ApiError::Autofill(err) => {
                let status = match &err {
                    ProviderError::InvalidIsbn(_) => StatusCode::BAD_REQUEST,
                    ProviderError::NotFound(_) => StatusCode::NOT_FOUND,
                    _ => {
                        warn!("Autofill failed: {}", err);
                        StatusCode::BAD_GATEWAY
                    }
                };
                (status, err.to_string())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
