use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Rolling delivery counters, exposed via the status endpoint.
#[derive(Debug, Default)]
pub struct StreamStats {
    emitted: AtomicU64,
    dropped_duplicate: AtomicU64,
    parse_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub emitted: u64,
    pub dropped_duplicate: u64,
    pub parse_errors: u64,
}

impl StreamStats {
    pub fn record_emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.dropped_duplicate.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            emitted: self.emitted.load(Ordering::Relaxed),
            dropped_duplicate: self.dropped_duplicate.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
        }
    }
}
