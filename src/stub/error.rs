use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;

/// Failures reported with the service's `{"error": "..."}` body
#[derive(Debug, Error)]
pub enum StubError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
}

impl StubError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            StubError::BadRequest(_) => StatusCode::BAD_REQUEST,
            StubError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for StubError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
