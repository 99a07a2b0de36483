// crates/server/src/main.rs
//! Netgauge server binary.
//!
//! Starts an Axum HTTP server that launches speed test attempts on demand and
//! reports their progress. Measurements run against Cloudflare's speed test
//! endpoints; the static web UI is served when a static directory is present.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use netgauge_engine::{CloudflareEngine, EngineConfig};
use netgauge_server::{create_app_full, init_metrics};
use tracing_subscriber::EnvFilter;

/// Default port for the server.
const DEFAULT_PORT: u16 = 5000;

/// Default bind address. Listening on all interfaces so the UI is reachable
/// from other machines on the LAN.
const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Parse an environment variable, ignoring unset or malformed values.
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Get the server port from environment or use default.
fn get_port() -> u16 {
    env_parse("NETGAUGE_PORT")
        .or_else(|| env_parse("PORT"))
        .unwrap_or(DEFAULT_PORT)
}

/// Get the bind address from environment or use default.
fn get_host() -> IpAddr {
    env_parse("NETGAUGE_HOST").unwrap_or(DEFAULT_HOST)
}

/// Get the static directory for serving the web UI.
///
/// Priority:
/// 1. NETGAUGE_STATIC_DIR environment variable (explicit override)
/// 2. ./static directory (if it exists)
/// 3. None (API-only mode)
fn get_static_dir() -> Option<PathBuf> {
    std::env::var("NETGAUGE_STATIC_DIR")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            let dir = PathBuf::from("static");
            dir.exists().then_some(dir)
        })
}

/// Build the engine configuration, letting the environment override the
/// transfer sizes and probe count.
fn get_engine_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    if let Some(mb) = env_parse::<u64>("NETGAUGE_DOWNLOAD_MB") {
        config.download_bytes = mb * 1024 * 1024;
    }
    if let Some(mb) = env_parse::<usize>("NETGAUGE_UPLOAD_MB") {
        config.upload_bytes = mb * 1024 * 1024;
    }
    if let Some(probes) = env_parse::<usize>("NETGAUGE_PING_PROBES") {
        config.ping_probes = probes;
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (quiet unless RUST_LOG says otherwise; startup UX
    // uses eprintln)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();

    // Initialize Prometheus metrics
    init_metrics();

    // Print banner
    eprintln!("\n\u{1f4e1} netgauge v{}\n", env!("CARGO_PKG_VERSION"));

    // Step 1: Build the measurement engine
    let engine = Arc::new(CloudflareEngine::new(get_engine_config())?);

    // Step 2: Build the Axum app, serving the UI when the static dir exists
    let static_dir = get_static_dir();
    if static_dir.is_none() {
        tracing::warn!("no static directory found, running API-only");
    }
    let app = create_app_full(engine, static_dir);

    // Step 3: Bind and serve
    let host = get_host();
    let port = get_port();
    let addr = SocketAddr::from((host, port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    eprintln!("  \u{2192} http://{}:{}  (Ctrl+C to stop)\n", host, port);

    axum::serve(listener, app).await?;

    Ok(())
}
