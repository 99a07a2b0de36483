// crates/engine/src/cloudflare.rs
//! Cloudflare-backed measurement engine.
//!
//! Talks to the `speed.cloudflare.com` probe endpoints: `/cdn-cgi/trace` to
//! learn which edge colo is serving us, `/locations` to resolve the colo to a
//! city, `/__down?bytes=0` for latency sampling, and `/__down`/`/__up` for the
//! transfer measurements. The hostname is anycast, so the nearest edge answers
//! and "server selection" amounts to metadata discovery plus latency priming.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::Deserialize;

use crate::{Engine, EngineConfig, EngineError, ProgressFn, ServerInfo};

const DEFAULT_BASE_URL: &str = "https://speed.cloudflare.com";

/// Whole-transfer timeout; generous because the default download is ~100 MiB.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-request timeout for the zero-byte latency probes.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const UPLOAD_CHUNK_BYTES: usize = 1024 * 1024;

/// One entry of the `/locations` colo directory.
#[derive(Debug, Deserialize)]
struct Location {
    iata: String,
    city: String,
    #[serde(default)]
    cca2: String,
}

pub struct CloudflareEngine {
    client: reqwest::Client,
    base_url: String,
    config: EngineConfig,
    latency_ms: RwLock<Option<f64>>,
}

impl CloudflareEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_base_url(config, DEFAULT_BASE_URL)
    }

    /// Engine pointed at an alternate endpoint. Tests aim this at a local
    /// mock server.
    pub fn with_base_url(
        config: EngineConfig,
        base_url: impl Into<String>,
    ) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(TRANSFER_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            config,
            latency_ms: RwLock::new(None),
        })
    }

    async fn fetch_trace(&self) -> Result<String, EngineError> {
        let url = format!("{}/cdn-cgi/trace", self.base_url);
        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }

    async fn fetch_locations(&self) -> Result<Vec<Location>, EngineError> {
        let url = format!("{}/locations", self.base_url);
        let locations = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(locations)
    }

    /// Sample round-trip latency with zero-byte downloads, keeping the median.
    /// Individual probe failures are tolerated; an empty sample set is not.
    async fn probe_latency(&self) -> Result<f64, EngineError> {
        let url = format!("{}/__down?bytes=0", self.base_url);
        let mut samples = Vec::with_capacity(self.config.ping_probes);
        for _ in 0..self.config.ping_probes {
            let started = Instant::now();
            let resp = self.client.get(&url).timeout(PROBE_TIMEOUT).send().await;
            match resp.and_then(|r| r.error_for_status()) {
                Ok(_) => samples.push(started.elapsed()),
                Err(err) => tracing::debug!(error = %err, "latency probe failed"),
            }
        }
        if samples.is_empty() {
            return Err(EngineError::Unavailable("no servers reachable".to_string()));
        }
        Ok(median_ms(&samples))
    }
}

#[async_trait]
impl Engine for CloudflareEngine {
    async fn select_server(&self) -> Result<ServerInfo, EngineError> {
        let trace = self.fetch_trace().await?;
        let colo = trace_field(&trace, "colo")
            .ok_or_else(|| EngineError::BadResponse("trace response has no colo field".to_string()))?
            .to_string();

        let locations = self.fetch_locations().await?;
        let location = locations
            .into_iter()
            .find(|l| l.iata == colo)
            .ok_or_else(|| {
                EngineError::BadResponse(format!("colo {colo} missing from locations directory"))
            })?;

        let latency = self.probe_latency().await?;
        match self.latency_ms.write() {
            Ok(mut slot) => *slot = Some(latency),
            Err(err) => tracing::error!(error = %err, "latency slot lock poisoned"),
        }

        tracing::debug!(colo = %colo, city = %location.city, latency_ms = latency, "edge selected");
        Ok(ServerInfo {
            name: location.city,
            country: location.cca2,
            sponsor: "Cloudflare".to_string(),
        })
    }

    fn latency_ms(&self) -> f64 {
        match self.latency_ms.read() {
            Ok(slot) => slot.unwrap_or(0.0),
            Err(_) => 0.0,
        }
    }

    async fn measure_download(&self, mut on_chunk: ProgressFn) -> Result<f64, EngineError> {
        let url = format!("{}/__down?bytes={}", self.base_url, self.config.download_bytes);
        let started = Instant::now();
        let resp = self.client.get(&url).send().await?.error_for_status()?;
        let mut stream = resp.bytes_stream();
        let mut transferred: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            transferred += chunk.len() as u64;
            on_chunk(chunk.len() as u64);
        }
        let elapsed = started.elapsed().as_secs_f64();
        if transferred == 0 || elapsed <= 0.0 {
            return Err(EngineError::BadResponse("download produced no data".to_string()));
        }
        Ok((transferred as f64 * 8.0) / elapsed)
    }

    async fn measure_upload(&self, mut on_chunk: ProgressFn) -> Result<f64, EngineError> {
        let url = format!("{}/__up", self.base_url);
        let payload = random_payload(self.config.upload_bytes);
        let started = Instant::now();
        let mut transferred: u64 = 0;
        for chunk in payload.chunks(UPLOAD_CHUNK_BYTES) {
            self.client
                .post(&url)
                .body(chunk.to_vec())
                .send()
                .await?
                .error_for_status()?;
            transferred += chunk.len() as u64;
            on_chunk(chunk.len() as u64);
        }
        let elapsed = started.elapsed().as_secs_f64();
        if transferred == 0 || elapsed <= 0.0 {
            return Err(EngineError::BadResponse("upload pushed no data".to_string()));
        }
        Ok((transferred as f64 * 8.0) / elapsed)
    }
}

/// Pull one `key=value` line out of a `/cdn-cgi/trace` response.
fn trace_field<'a>(trace: &'a str, key: &str) -> Option<&'a str> {
    trace.lines().find_map(|line| {
        let (k, v) = line.split_once('=')?;
        (k == key).then_some(v)
    })
}

/// Median latency in milliseconds.
fn median_ms(samples: &[Duration]) -> f64 {
    let mut ms: Vec<f64> = samples.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
    ms.sort_by(|a, b| a.total_cmp(b));
    let mid = ms.len() / 2;
    if ms.len() % 2 == 0 {
        (ms[mid - 1] + ms[mid]) / 2.0
    } else {
        ms[mid]
    }
}

/// Upload payload. Random bytes so intermediaries cannot compress it into a
/// flattering number.
fn random_payload(len: usize) -> Vec<u8> {
    let mut rng = StdRng::from_entropy();
    let mut data = vec![0u8; len];
    rng.fill_bytes(&mut data);
    data
}
