// crates/engine/src/lib.rs
//! Measurement engine seam for netgauge.
//!
//! The server orchestrates a speed test through the [`Engine`] trait and never
//! touches the network itself. [`CloudflareEngine`] is the production
//! implementation; tests substitute scripted doubles.

mod cloudflare;

pub use cloudflare::CloudflareEngine;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Chunk-level progress callback fed during a transfer measurement.
///
/// Invoked with the size in bytes of each chunk as it completes. Runs on the
/// measurement task, so implementations should be cheap.
pub type ProgressFn = Box<dyn FnMut(u64) + Send>;

/// Identity of the measurement server an attempt ran against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub country: String,
    pub sponsor: String,
}

/// Errors surfaced by a measurement engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Transport-level failure talking to the measurement endpoint.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The endpoint answered, but with something unusable.
    #[error("unusable response from measurement server: {0}")]
    BadResponse(String),

    /// No server or latency sample could be obtained.
    #[error("{0}")]
    Unavailable(String),
}

/// Tunables for a measurement run.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Bytes requested from the download endpoint.
    pub download_bytes: u64,
    /// Bytes pushed to the upload endpoint.
    pub upload_bytes: usize,
    /// Latency probes sent during server selection.
    pub ping_probes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            download_bytes: 100 * 1024 * 1024,
            upload_bytes: 25 * 1024 * 1024,
            ping_probes: 8,
        }
    }
}

/// A speed test measurement collaborator.
///
/// One attempt calls `select_server`, then reads `latency_ms`, then runs
/// `measure_download` and `measure_upload`. The server guarantees a single
/// attempt is in flight at a time, so implementations may cache per-attempt
/// state (the selected server, the latency sample) behind `&self`.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Pick the measurement server for this attempt.
    async fn select_server(&self) -> Result<ServerInfo, EngineError>;

    /// Round-trip latency in milliseconds from the last successful
    /// `select_server`. Returns 0.0 before one has completed.
    fn latency_ms(&self) -> f64;

    /// Run the download transfer. Returns throughput in bits per second.
    async fn measure_download(&self, on_chunk: ProgressFn) -> Result<f64, EngineError>;

    /// Run the upload transfer. Returns throughput in bits per second.
    async fn measure_upload(&self, on_chunk: ProgressFn) -> Result<f64, EngineError>;
}
