// crates/server/src/routes/metrics.rs
//! Prometheus scrape endpoint.
//!
//! Serves the speed test attempt metrics in Prometheus text format at
//! `GET /metrics`.

use std::sync::Arc;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::metrics::render_metrics;
use crate::state::AppState;

/// GET /metrics - Prometheus exposition endpoint.
///
/// Renders the attempt counters and duration histogram in Prometheus text
/// format. Answers 503 until `init_metrics` has installed the recorder.
pub async fn metrics_handler() -> Response {
    let Some(output) = render_metrics() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Metrics not initialized").into_response();
    };
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
        .into_response()
}

/// Create the metrics routes router.
///
/// Served at the root rather than under `/api`; scrapers expect the
/// conventional `/metrics` path.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/metrics", get(metrics_handler))
}

#[cfg(test)]
mod tests {
    use crate::speedtest::testing::ScriptedEngine;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_metrics_endpoint_serves_prometheus_text() {
        crate::metrics::init_metrics();

        let app = crate::create_app(Arc::new(ScriptedEngine::ok()));

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("text/plain"));
    }

    #[tokio::test]
    async fn test_metrics_reports_attempt_counters() {
        // Initialize metrics and record one finished attempt so the counter
        // families show up in the rendered output.
        crate::metrics::init_metrics();
        crate::metrics::record_test_started();
        crate::metrics::record_test_finished("completed", std::time::Duration::from_secs(3));

        let app = crate::create_app(Arc::new(ScriptedEngine::ok()));

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body_str = String::from_utf8(body.to_vec()).unwrap();

        assert!(body_str.contains("speedtest_started_total"));
        assert!(body_str.contains("speedtest_runs_total"));
    }
}
