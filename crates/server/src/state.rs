// crates/server/src/state.rs
//! Process-wide state handed to every route handler.

use std::sync::Arc;
use std::time::Instant;

use netgauge_engine::Engine;

use crate::speedtest::TestRunner;

/// Shared state: one runner (and thus one record slot) per process.
pub struct AppState {
    /// Process start, for the health endpoint's uptime figure.
    pub start_time: Instant,
    /// Admission-controlled speed test runner and its record slot.
    pub runner: TestRunner,
}

impl AppState {
    pub fn new(engine: Arc<dyn Engine>) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            runner: TestRunner::new(engine),
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speedtest::testing::ScriptedEngine;
    use crate::speedtest::TestPhase;

    fn test_state() -> Arc<AppState> {
        AppState::new(Arc::new(ScriptedEngine::ok()))
    }

    #[tokio::test]
    async fn test_app_state_new() {
        let state = test_state();
        assert!(state.uptime_secs() < 1);
        assert_eq!(state.runner.snapshot().status, TestPhase::Idle);
    }

    #[tokio::test]
    async fn test_app_state_shared_across_clones() {
        let state = test_state();
        let cloned = Arc::clone(&state);
        state.runner.start().expect("slot is idle");
        // Both handles see the same record slot.
        assert!(cloned.runner.start().is_err());
    }
}
