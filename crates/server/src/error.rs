// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::speedtest::TestInProgress;

/// JSON body for refused requests: `{"error": "..."}` and nothing else.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Errors a handler can answer with.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Exactly one measurement attempt may run at a time. Served as 400 with
    /// this exact message; deployed pollers match on the body string.
    #[error("Test already in progress")]
    TestInProgress,
}

impl From<TestInProgress> for ApiError {
    fn from(_: TestInProgress) -> Self {
        ApiError::TestInProgress
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::TestInProgress => {
                tracing::warn!("start refused, measurement already running");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new("Test already in progress"),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Handler result that serializes its failure side.
pub type ApiResult<T> = Result<T, ApiError>;
