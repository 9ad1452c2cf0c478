//! Per-sender rate limiting.
//!
//! Incoming: sliding 60-second window of message timestamps per
//! `(channel, sender)`. Outgoing: token bucket per `(channel, recipient)`
//! refilling at `max_per_minute / 60` tokens per second.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::types::SenderKey;

const WINDOW: Duration = Duration::from_secs(60);

/// Verdict for one incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncomingVerdict {
    Allowed,
    /// `notify` is true exactly once per rate-limited episode, so the sender
    /// gets a single "slow down" notice.
    Limited { notify: bool },
}

#[derive(Debug, Default)]
struct Window {
    timestamps: VecDeque<Instant>,
    notified: bool,
}

pub struct IncomingLimiter {
    max_per_minute: u32,
    window: Duration,
    windows: Mutex<HashMap<SenderKey, Window>>,
}

impl IncomingLimiter {
    pub fn new(max_per_minute: u32) -> Self {
        Self::with_window(max_per_minute, WINDOW)
    }

    /// Test seam — a short window keeps expiry tests fast.
    pub fn with_window(max_per_minute: u32, window: Duration) -> Self {
        Self {
            max_per_minute,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record one message attempt from `key` and return the verdict.
    pub fn check(&self, key: &SenderKey) -> IncomingVerdict {
        let mut windows = self.windows.lock().expect("rate windows poisoned");
        let entry = windows.entry(key.clone()).or_default();

        let now = Instant::now();
        while let Some(front) = entry.timestamps.front() {
            if now.duration_since(*front) >= self.window {
                entry.timestamps.pop_front();
            } else {
                break;
            }
        }

        if entry.timestamps.len() >= self.max_per_minute as usize {
            let notify = !entry.notified;
            entry.notified = true;
            return IncomingVerdict::Limited { notify };
        }

        entry.timestamps.push_back(now);
        entry.notified = false;
        IncomingVerdict::Allowed
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

pub struct OutgoingLimiter {
    max_per_minute: u32,
    buckets: Mutex<HashMap<SenderKey, Bucket>>,
}

impl OutgoingLimiter {
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            max_per_minute,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Take one token for a send to `key`. False means the send must be
    /// denied.
    pub fn try_acquire(&self, key: &SenderKey) -> bool {
        let mut buckets = self.buckets.lock().expect("rate buckets poisoned");
        let max = f64::from(self.max_per_minute);
        let bucket = buckets.entry(key.clone()).or_insert_with(|| Bucket {
            tokens: max,
            last_refill: Instant::now(),
        });

        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * max / 60.0).min(max);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SenderKey {
        SenderKey::new("chat", "S")
    }

    #[test]
    fn first_five_allowed_sixth_limited_with_single_notice() {
        let limiter = IncomingLimiter::new(5);
        for i in 0..5 {
            assert_eq!(limiter.check(&key()), IncomingVerdict::Allowed, "msg {i}");
        }
        assert_eq!(
            limiter.check(&key()),
            IncomingVerdict::Limited { notify: true }
        );
        // Same episode — no second notice.
        assert_eq!(
            limiter.check(&key()),
            IncomingVerdict::Limited { notify: false }
        );
    }

    #[test]
    fn window_expiry_readmits_and_resets_episode() {
        let limiter = IncomingLimiter::with_window(2, Duration::from_millis(50));
        assert_eq!(limiter.check(&key()), IncomingVerdict::Allowed);
        assert_eq!(limiter.check(&key()), IncomingVerdict::Allowed);
        assert!(matches!(
            limiter.check(&key()),
            IncomingVerdict::Limited { notify: true }
        ));

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(limiter.check(&key()), IncomingVerdict::Allowed);
        // New episode gets a fresh notice.
        assert_eq!(limiter.check(&key()), IncomingVerdict::Allowed);
        assert!(matches!(
            limiter.check(&key()),
            IncomingVerdict::Limited { notify: true }
        ));
    }

    #[test]
    fn senders_are_limited_independently() {
        let limiter = IncomingLimiter::new(1);
        assert_eq!(
            limiter.check(&SenderKey::new("chat", "a")),
            IncomingVerdict::Allowed
        );
        assert_eq!(
            limiter.check(&SenderKey::new("chat", "b")),
            IncomingVerdict::Allowed
        );
        assert!(matches!(
            limiter.check(&SenderKey::new("chat", "a")),
            IncomingVerdict::Limited { .. }
        ));
    }

    #[test]
    fn outgoing_bucket_drains_and_refills() {
        let limiter = OutgoingLimiter::new(2);
        assert!(limiter.try_acquire(&key()));
        assert!(limiter.try_acquire(&key()));
        assert!(!limiter.try_acquire(&key()));

        // 2/min refills one token in 30 s; 600 ms is not enough.
        std::thread::sleep(Duration::from_millis(600));
        assert!(!limiter.try_acquire(&key()));
    }
}
