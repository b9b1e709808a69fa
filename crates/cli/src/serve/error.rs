use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use testdeck_core::ParseStatusError;
use testdeck_engine::EngineError;

use super::json_error;

/// Error type returned by every handler.
#[derive(Debug)]
pub(crate) enum ApiError {
    Engine(EngineError),
    BadRequest(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl From<ParseStatusError> for ApiError {
    fn from(e: ParseStatusError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Engine(e) => {
                let status = match &e {
                    EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
                    EngineError::Validation(_) => StatusCode::BAD_REQUEST,
                    EngineError::Conflict(_) => StatusCode::CONFLICT,
                    EngineError::Unexpected(_) => {
                        tracing::error!(error = %e, "request failed");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.to_string())
            }
        };
        json_error(status, &message).into_response()
    }
}
