// crates/server/src/routes/speedtest.rs
//! Speed test API routes.
//!
//! - POST /start-test - begin a measurement attempt
//! - GET  /status     - poll the current test record

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::error::ApiResult;
use crate::speedtest::TestRecord;
use crate::state::AppState;

/// Response for POST /api/start-test.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct TestStartedResponse {
    pub message: String,
}

/// POST /api/start-test - claim the slot and launch the measurement task.
///
/// Replies as soon as the attempt is admitted; progress is observed through
/// `GET /api/status`. Refused with 400 while an attempt is active.
async fn start_test(State(state): State<Arc<AppState>>) -> ApiResult<Json<TestStartedResponse>> {
    state.runner.start()?;
    Ok(Json(TestStartedResponse {
        message: "Test started".to_string(),
    }))
}

/// GET /api/status - point-in-time view of the current attempt.
async fn get_status(State(state): State<Arc<AppState>>) -> Json<TestRecord> {
    Json(state.runner.snapshot())
}

/// Create the speed test routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/start-test", post(start_test))
        .route("/status", get(get_status))
}
