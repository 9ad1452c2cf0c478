//! Nonce-based replay protection.
//!
//! Entries expire after five minutes — the same window the timestamp check
//! enforces, so an envelope whose nonce has aged out is already stale.
//! The set is in-memory; after a restart the window is effectively reset
//! (known residual risk, acceptable at this scale).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const NONCE_WINDOW: Duration = Duration::from_secs(300);

pub struct NonceCache {
    window: Duration,
    seen: Mutex<HashMap<String, Instant>>,
}

impl NonceCache {
    pub fn new() -> Self {
        Self::with_window(NONCE_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Record `nonce`; returns false when it was already seen inside the
    /// window (a replay).
    pub fn observe(&self, nonce: &str) -> bool {
        let mut seen = self.seen.lock().expect("nonce cache poisoned");
        let now = Instant::now();
        seen.retain(|_, at| now.duration_since(*at) < self.window);

        if seen.contains_key(nonce) {
            return false;
        }
        seen.insert(nonce.to_string(), now);
        true
    }
}

impl Default for NonceCache {
    fn default() -> Self {
        Self::new()
    }
}
