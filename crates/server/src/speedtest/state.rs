// crates/server/src/speedtest/state.rs
//! Shared record for the current speed test attempt.
//!
//! One writer (the measurement task) and many readers (status pollers). The
//! whole record sits behind a single `RwLock` so a poller can never observe a
//! half-reset mixture of two attempts.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use netgauge_engine::ServerInfo;
use serde::Serialize;

/// Lifecycle phase of a speed test attempt.
///
/// Serialized verbatim into the status JSON, so the variant names are wire
/// contract: `idle`, `starting`, `finding_server`, `testing_ping`,
/// `testing_download`, `testing_upload`, `completed`, `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
#[serde(rename_all = "snake_case")]
pub enum TestPhase {
    Idle,
    Starting,
    FindingServer,
    TestingPing,
    TestingDownload,
    TestingUpload,
    Completed,
    Error,
}

impl TestPhase {
    /// An attempt is under way and new starts must be refused.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Idle | Self::Completed | Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::FindingServer => "finding_server",
            Self::TestingPing => "testing_ping",
            Self::TestingDownload => "testing_download",
            Self::TestingUpload => "testing_upload",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

/// Point-in-time view of the current attempt: the `GET /api/status` response
/// body. Unset fields serialize as `null`, which existing clients rely on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct TestRecord {
    pub status: TestPhase,
    pub ping: Option<f64>,
    pub download: Option<f64>,
    pub upload: Option<f64>,
    pub server: Option<ServerInfo>,
    pub error: Option<String>,
}

impl TestRecord {
    fn blank(status: TestPhase) -> Self {
        Self {
            status,
            ping: None,
            download: None,
            upload: None,
            server: None,
            error: None,
        }
    }
}

impl Default for TestRecord {
    fn default() -> Self {
        Self::blank(TestPhase::Idle)
    }
}

/// Single-slot holder for the current test record.
pub struct TestState {
    record: RwLock<TestRecord>,
}

impl TestState {
    /// Create a new idle slot.
    pub fn new() -> Self {
        Self {
            record: RwLock::new(TestRecord::default()),
        }
    }

    // Writers never panic while holding the lock, so a poisoned lock still
    // holds a coherent record. Log and keep going.
    fn read(&self) -> RwLockReadGuard<'_, TestRecord> {
        self.record.read().unwrap_or_else(|e| {
            tracing::error!("test record lock poisoned on read");
            e.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, TestRecord> {
        self.record.write().unwrap_or_else(|e| {
            tracing::error!("test record lock poisoned on write");
            e.into_inner()
        })
    }

    /// Claim the slot for a fresh attempt.
    ///
    /// Refused (returns `false`) while an attempt is active. On success the
    /// record is wiped and set to `starting` in the same critical section:
    /// pollers see either the previous terminal record or the fresh one,
    /// never a mixture, and of two racing starts exactly one wins.
    pub fn begin(&self) -> bool {
        let mut rec = self.write();
        if rec.status.is_active() {
            return false;
        }
        *rec = TestRecord::blank(TestPhase::Starting);
        true
    }

    pub fn set_phase(&self, phase: TestPhase) {
        self.write().status = phase;
    }

    pub fn set_server(&self, server: ServerInfo) {
        self.write().server = Some(server);
    }

    pub fn set_ping(&self, ms: f64) {
        self.write().ping = Some(ms);
    }

    pub fn set_download(&self, mbps: f64) {
        self.write().download = Some(mbps);
    }

    pub fn set_upload(&self, mbps: f64) {
        self.write().upload = Some(mbps);
    }

    /// Terminal failure. The phase flip and the message land in one critical
    /// section; results recorded before the failure stay in place.
    pub fn set_error(&self, message: impl Into<String>) {
        let mut rec = self.write();
        rec.status = TestPhase::Error;
        rec.error = Some(message.into());
    }

    /// Consistent copy of the whole record.
    pub fn snapshot(&self) -> TestRecord {
        self.read().clone()
    }
}

impl Default for TestState {
    fn default() -> Self {
        Self::new()
    }
}
