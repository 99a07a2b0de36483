// crates/server/src/lib.rs
//! Netgauge server library.
//!
//! This crate provides the Axum-based HTTP server for netgauge. It serves a
//! REST API for launching network speed tests and polling their progress, a
//! Prometheus metrics endpoint, and optionally a static web UI.

pub mod error;
pub mod metrics;
pub mod routes;
pub mod speedtest;
pub mod state;

pub use error::*;
pub use metrics::init_metrics;
pub use routes::api_routes;
pub use speedtest::{TestPhase, TestRecord, TestRunner};
pub use state::AppState;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use netgauge_engine::Engine;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Assemble the Axum application around the given measurement engine.
///
/// Wires up:
/// - API routes (start-test, status, health)
/// - The Prometheus /metrics endpoint
/// - Permissive CORS, so the page can be served from anywhere during dev
/// - Request tracing
pub fn create_app(engine: Arc<dyn Engine>) -> Router {
    create_app_full(engine, None)
}

/// Like [`create_app`], but optionally serves a static directory (the web UI)
/// for any path the API does not claim.
pub fn create_app_full(engine: Arc<dyn Engine>, static_dir: Option<PathBuf>) -> Router {
    let state = AppState::new(engine);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new().merge(api_routes(state));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(cors).layer(TraceLayer::new_for_http())
}

// ============================================================================
// Integration Tests
// ============================================================================
