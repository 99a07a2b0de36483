// crates/server/src/speedtest/runner.rs
//! Orchestrates one speed test attempt at a time.
//!
//! `start` claims the record slot and spawns the measurement task; the HTTP
//! handler returns as soon as the claim succeeds. The task walks the engine
//! through selection, ping, download and upload, publishing every step into
//! the shared [`TestState`].

use std::sync::Arc;
use std::time::Instant;

use netgauge_engine::{Engine, EngineError};
use thiserror::Error;

use crate::metrics::{record_test_finished, record_test_started};
use crate::speedtest::state::{TestPhase, TestRecord, TestState};

/// Refusal returned by [`TestRunner::start`] while an attempt is active.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("test already in progress")]
pub struct TestInProgress;

/// Admission-controlled launcher for measurement attempts.
pub struct TestRunner {
    state: Arc<TestState>,
    engine: Arc<dyn Engine>,
}

impl TestRunner {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            state: Arc::new(TestState::new()),
            engine,
        }
    }

    /// Start a new attempt. Returns immediately; the measurement continues on
    /// a spawned task. When starts race, exactly one caller wins the slot.
    pub fn start(&self) -> Result<(), TestInProgress> {
        if !self.state.begin() {
            return Err(TestInProgress);
        }
        record_test_started();

        let state = Arc::clone(&self.state);
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            let started = Instant::now();
            match run_measurement(&state, engine.as_ref()).await {
                Ok(()) => {
                    let elapsed = started.elapsed();
                    record_test_finished("completed", elapsed);
                    tracing::info!(duration_secs = elapsed.as_secs_f64(), "speed test completed");
                }
                Err(err) => {
                    state.set_error(err.to_string());
                    record_test_finished("failed", started.elapsed());
                    tracing::warn!(error = %err, "speed test failed");
                }
            }
        });
        Ok(())
    }

    /// Point-in-time view of the current attempt.
    pub fn snapshot(&self) -> TestRecord {
        self.state.snapshot()
    }
}

/// One full measurement pass. The terminal `completed` write happens here;
/// the caller turns an `Err` into the terminal `error` write. The terminal
/// write is the task's last touch of the slot, so a finished task can never
/// scribble over a successor attempt.
async fn run_measurement(state: &Arc<TestState>, engine: &dyn Engine) -> Result<(), EngineError> {
    state.set_phase(TestPhase::FindingServer);
    let server = engine.select_server().await?;
    state.set_server(server);

    state.set_phase(TestPhase::TestingPing);
    state.set_ping(round2(engine.latency_ms()));

    state.set_phase(TestPhase::TestingDownload);
    let download_state = Arc::clone(state);
    let phase_started = Instant::now();
    let mut transferred: u64 = 0;
    let raw_bps = engine
        .measure_download(Box::new(move |bytes| {
            transferred += bytes;
            if let Some(mbps) = interim_mbps(transferred, phase_started.elapsed().as_secs_f64()) {
                download_state.set_download(mbps);
            }
        }))
        .await?;
    state.set_download(round2(raw_bps / 1_000_000.0));

    state.set_phase(TestPhase::TestingUpload);
    let upload_state = Arc::clone(state);
    let phase_started = Instant::now();
    let mut transferred: u64 = 0;
    let raw_bps = engine
        .measure_upload(Box::new(move |bytes| {
            transferred += bytes;
            if let Some(mbps) = interim_mbps(transferred, phase_started.elapsed().as_secs_f64()) {
                upload_state.set_upload(mbps);
            }
        }))
        .await?;
    state.set_upload(round2(raw_bps / 1_000_000.0));

    state.set_phase(TestPhase::Completed);
    Ok(())
}

/// Interim throughput readout in Mbit/s from cumulative transferred bytes,
/// rounded to two decimals. `None` until any time has elapsed, so an early
/// first chunk cannot divide by zero.
fn interim_mbps(cumulative_bytes: u64, elapsed_secs: f64) -> Option<f64> {
    if elapsed_secs <= 0.0 {
        return None;
    }
    Some(round2(
        (cumulative_bytes as f64 * 8.0) / (elapsed_secs * 1_000_000.0),
    ))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
