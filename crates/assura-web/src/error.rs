//! API error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use assura_common::AssuraError;
use assura_store::StoreError;

/// Wraps the domain error taxonomy into HTTP responses:
/// Validation → 400, NotFound → 404, everything else → 500.
#[derive(Debug)]
pub struct ApiError(pub AssuraError);

impl From<AssuraError> for ApiError {
    fn from(err: AssuraError) -> Self {
        Self(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AssuraError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AssuraError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            other => {
                tracing::error!(error = %other, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
