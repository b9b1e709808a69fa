//! Request extractors shared by the handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use super::error::ApiError;

/// Header naming the user on whose behalf a request acts.
pub(crate) const USER_HEADER: &str = "x-user-id";

/// User recorded for requests that carry no `X-User-Id`.
pub(crate) const DEFAULT_USER: &str = "system";

/// The acting user id, taken from `X-User-Id`.
///
/// Nothing here authenticates the caller; the header is trusted as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ActingUser(pub(crate) String);

impl<S: Send + Sync> FromRequestParts<S> for ActingUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_USER);
        Ok(ActingUser(user.to_string()))
    }
}

/// Decode a JSON body into `T`. Any failure, from a missing content type
/// to a wrong field type, is a 400.
pub(crate) fn parse_body<T: DeserializeOwned>(
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<T, ApiError> {
    let Json(value) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    serde_json::from_value(value)
        .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))
}
