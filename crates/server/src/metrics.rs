// crates/server/src/metrics.rs
//! Measurement attempt metrics.
//!
//! Installs the Prometheus recorder and exposes the helpers the runner calls
//! around each attempt: a counter for admitted starts, a labeled counter for
//! finished runs, and a duration histogram. `/metrics` renders them.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Render handle for the installed recorder; `/metrics` reads through this.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder.
///
/// Call once at startup before any attempt runs. Returns `false` when a
/// recorder is already in place (repeat calls, app tests sharing a process).
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    // get_or_init blocks concurrent callers until the handle is stored, so
    // once any init_metrics call returns, render_metrics is ready.
    let mut installed = false;
    PROMETHEUS_HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        match metrics::set_global_recorder(recorder) {
            Ok(()) => {
                describe_metrics();
                installed = true;
            }
            Err(_) => tracing::warn!("metrics recorder already installed elsewhere"),
        }
        handle
    });

    if installed {
        tracing::info!("Prometheus metrics initialized");
    }
    installed
}

/// Help text for the attempt metrics.
fn describe_metrics() {
    describe_counter!(
        "speedtest_started_total",
        "Measurement attempts admitted by the runner"
    );
    describe_counter!(
        "speedtest_runs_total",
        "Finished measurement attempts by outcome"
    );
    describe_histogram!(
        "speedtest_duration_seconds",
        "Wall-clock duration of finished measurement attempts"
    );
}

/// Current metrics in Prometheus text format, or `None` before
/// [`init_metrics`] has run.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

/// Record an admitted measurement attempt.
pub fn record_test_started() {
    counter!("speedtest_started_total").increment(1);
}

/// Record a finished measurement attempt. `outcome` is `"completed"` or
/// `"failed"`; `duration` is measured from admission to the terminal write.
pub fn record_test_finished(outcome: &str, duration: Duration) {
    counter!("speedtest_runs_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("speedtest_duration_seconds", "outcome" => outcome.to_string())
        .record(duration.as_secs_f64());
}
