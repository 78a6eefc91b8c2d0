//! Mapping of domain errors onto HTTP responses.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use naturalness_common::NaturalnessError;

/// Error returned by every handler.
///
/// Validation failures become `422`, interaction failures `503` and anything
/// else `500`, always with a `{"detail": ...}` body.
#[derive(Debug)]
pub struct ApiError(pub NaturalnessError);

impl From<NaturalnessError> for ApiError {
    fn from(err: NaturalnessError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(NaturalnessError::validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), error = %self.0, "Request failed");
        } else {
            tracing::info!(kind = self.0.kind(), error = %self.0, "Request rejected");
        }

        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}
