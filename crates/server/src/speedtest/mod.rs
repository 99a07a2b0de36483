// crates/server/src/speedtest/mod.rs
//! Speed test coordination: the single-slot record and the runner that
//! launches measurement attempts against an [`Engine`](netgauge_engine::Engine).

mod runner;
mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use runner::{TestInProgress, TestRunner};
pub use state::{TestPhase, TestRecord, TestState};
