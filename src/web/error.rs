//! Converts [`WebError`]/[`AppError`] into axum responses at the edge, the
//! way the teacher's `responses::handle_error` maps its own error enum to
//! status codes — here the mapping follows §7's propagation policy: I
//! converts MAC exhaustion into HTTP 502, B/D conflicts into 409, and
//! anything request-shaped into 400/404.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::errors::WebError;

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            WebError::InvalidRequest { field, message } => {
                (StatusCode::BAD_REQUEST, format!("{field}: {message}"))
            }
            WebError::NotFound { resource } => (StatusCode::NOT_FOUND, resource.clone()),
            WebError::Conflict { message } => (StatusCode::CONFLICT, message.clone()),
            WebError::StreamUnavailable { .. } => (StatusCode::BAD_GATEWAY, self.to_string()),
            WebError::Upstream(message) => (StatusCode::BAD_GATEWAY, message.clone()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
