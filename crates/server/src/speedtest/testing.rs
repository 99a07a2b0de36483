// crates/server/src/speedtest/testing.rs
//! Scripted engine and wait helpers shared by runner, route and app tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use netgauge_engine::{Engine, EngineError, ProgressFn, ServerInfo};
use tokio::sync::Notify;

use super::state::{TestPhase, TestRecord, TestState};

/// Two-way rendezvous: the engine announces it reached a step, then parks
/// until the test releases it.
pub(crate) struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            release: Notify::new(),
        })
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }

    /// Wait until the engine reaches this gate.
    pub(crate) async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the engine continue past this gate.
    pub(crate) fn release(&self) {
        self.release.notify_one();
    }
}

/// Engine double with canned results and optional per-step gates.
///
/// Transfer steps feed their chunk lists through the progress callback with a
/// short sleep per chunk, so interim readouts get a nonzero elapsed time.
pub(crate) struct ScriptedEngine {
    pub(crate) server: Result<ServerInfo, String>,
    pub(crate) latency_ms: f64,
    pub(crate) download_bps: Result<f64, String>,
    pub(crate) upload_bps: Result<f64, String>,
    pub(crate) download_chunks: Vec<u64>,
    pub(crate) upload_chunks: Vec<u64>,
    pub(crate) select_gate: Option<Arc<Gate>>,
    pub(crate) download_gate: Option<Arc<Gate>>,
    /// Parks after the download chunks are fed but before the final figure is
    /// returned, so tests can observe the interim readout.
    pub(crate) download_finish_gate: Option<Arc<Gate>>,
    pub(crate) upload_gate: Option<Arc<Gate>>,
}

impl ScriptedEngine {
    /// Happy-path engine. The values are chosen so every rounded result is
    /// distinctive: ping 23.46, download 123.46 Mbps, upload 45.68 Mbps.
    pub(crate) fn ok() -> Self {
        Self {
            server: Ok(dallas()),
            latency_ms: 23.456,
            download_bps: Ok(123_456_789.0),
            upload_bps: Ok(45_678_912.0),
            download_chunks: vec![250_000; 4],
            upload_chunks: vec![500_000; 2],
            select_gate: None,
            download_gate: None,
            download_finish_gate: None,
            upload_gate: None,
        }
    }

    pub(crate) fn failing_select(message: &str) -> Self {
        Self {
            server: Err(message.to_string()),
            ..Self::ok()
        }
    }
}

pub(crate) fn dallas() -> ServerInfo {
    ServerInfo {
        name: "Dallas".to_string(),
        country: "US".to_string(),
        sponsor: "Cloudflare".to_string(),
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    async fn select_server(&self) -> Result<ServerInfo, EngineError> {
        if let Some(gate) = &self.select_gate {
            gate.pass().await;
        }
        self.server.clone().map_err(EngineError::Unavailable)
    }

    fn latency_ms(&self) -> f64 {
        self.latency_ms
    }

    async fn measure_download(&self, mut on_chunk: ProgressFn) -> Result<f64, EngineError> {
        if let Some(gate) = &self.download_gate {
            gate.pass().await;
        }
        for &chunk in &self.download_chunks {
            tokio::time::sleep(Duration::from_millis(2)).await;
            on_chunk(chunk);
        }
        if let Some(gate) = &self.download_finish_gate {
            gate.pass().await;
        }
        self.download_bps.clone().map_err(EngineError::Unavailable)
    }

    async fn measure_upload(&self, mut on_chunk: ProgressFn) -> Result<f64, EngineError> {
        if let Some(gate) = &self.upload_gate {
            gate.pass().await;
        }
        for &chunk in &self.upload_chunks {
            tokio::time::sleep(Duration::from_millis(2)).await;
            on_chunk(chunk);
        }
        self.upload_bps.clone().map_err(EngineError::Unavailable)
    }
}

/// Poll until the record reaches `completed` or `error`, failing the test if
/// it never does.
pub(crate) async fn wait_for_terminal(state: &TestState) -> TestRecord {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let rec = state.snapshot();
            if matches!(rec.status, TestPhase::Completed | TestPhase::Error) {
                return rec;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("attempt did not reach a terminal phase in time")
}
