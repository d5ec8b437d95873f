//! Byte-level progress tracking for one stage of an operation

use std::sync::atomic::{AtomicU64, Ordering};

use crate::session::SessionId;

use super::hub::ProgressHub;

/// Receives per-item progress from blocking or parallel work
pub trait ProgressSink: Send + Sync {
    /// Total bytes the stage will process, announced before the first item
    fn start(&self, _total: u64) {}

    /// `bytes` more were processed; `current` names the item just finished
    fn advance(&self, bytes: u64, current: &str);
}

/// Sink that ignores every update
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn advance(&self, _bytes: u64, _current: &str) {}
}

/// Accumulates processed bytes and publishes them to the hub
///
/// Zero-byte advances are not published so that consecutive events always
/// carry strictly increasing byte counts.
pub struct ProgressReporter {
    hub: ProgressHub,
    session: SessionId,
    status: &'static str,
    total: AtomicU64,
    processed: AtomicU64,
}

impl ProgressReporter {
    pub fn new(hub: ProgressHub, session: SessionId, status: &'static str) -> Self {
        Self {
            hub,
            session,
            status,
            total: AtomicU64::new(0),
            processed: AtomicU64::new(0),
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Acquire)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }
}

impl ProgressSink for ProgressReporter {
    fn start(&self, total: u64) {
        self.total.store(total, Ordering::Release);
        self.processed.store(0, Ordering::Release);
    }

    fn advance(&self, bytes: u64, current: &str) {
        if bytes == 0 {
            return;
        }
        let processed = self.processed.fetch_add(bytes, Ordering::AcqRel) + bytes;
        self.hub
            .publish(self.session, processed, self.total(), self.status, current);
    }
}
