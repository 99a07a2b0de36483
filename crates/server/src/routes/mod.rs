// crates/server/src/routes/mod.rs
//! API route handlers for the netgauge server.

pub mod health;
pub mod metrics;
pub mod speedtest;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined router: API endpoints under the /api prefix, plus the
/// Prometheus endpoint at its conventional root path.
///
/// Routes:
/// - POST /api/start-test - Begin a measurement attempt
/// - GET  /api/status     - Current test record
/// - GET  /api/health     - Health check
/// - GET  /metrics        - Prometheus metrics
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", speedtest::router())
        .merge(metrics::router())
        .with_state(state)
}
