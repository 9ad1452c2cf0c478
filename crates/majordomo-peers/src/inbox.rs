//! Per-peer FIFO inbox for envelopes that arrived while the session was
//! busy. Bounded at 100 entries per peer; the oldest is dropped.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tracing::warn;

use crate::envelope::Envelope;

const INBOX_CAP: usize = 100;

#[derive(Default)]
pub struct PeerInbox {
    queues: Mutex<HashMap<String, VecDeque<Envelope>>>,
}

impl PeerInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an envelope under its sender. Oldest entry is dropped at the
    /// cap.
    pub fn push(&self, envelope: Envelope) {
        let mut queues = self.queues.lock().expect("inbox poisoned");
        let queue = queues.entry(envelope.from.clone()).or_default();
        if queue.len() >= INBOX_CAP {
            warn!(peer = %envelope.from, "peer inbox full — dropping oldest envelope");
            queue.pop_front();
        }
        queue.push_back(envelope);
    }

    /// Drain everything, preserving per-peer FIFO order. Peers are drained
    /// in name order for deterministic output.
    pub fn drain_all(&self) -> Vec<Envelope> {
        let mut queues = self.queues.lock().expect("inbox poisoned");
        let mut names: Vec<String> = queues.keys().cloned().collect();
        names.sort();

        let mut out = Vec::new();
        for name in names {
            if let Some(queue) = queues.remove(&name) {
                out.extend(queue);
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.queues
            .lock()
            .expect("inbox poisoned")
            .values()
            .map(VecDeque::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(from: &str, text: &str) -> Envelope {
        Envelope::text(from, "bmo", text)
    }

    #[test]
    fn per_peer_fifo_order_is_preserved() {
        let inbox = PeerInbox::new();
        inbox.push(env("r2", "one"));
        inbox.push(env("r2", "two"));
        inbox.push(env("r2", "three"));

        let drained = inbox.drain_all();
        let texts: Vec<&str> = drained
            .iter()
            .map(|e| e.payload_text().unwrap())
            .collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert!(inbox.is_empty());
    }

    #[test]
    fn cap_drops_oldest() {
        let inbox = PeerInbox::new();
        for i in 0..105 {
            inbox.push(env("r2", &format!("m{i}")));
        }
        assert_eq!(inbox.len(), 100);

        let drained = inbox.drain_all();
        assert_eq!(drained[0].payload_text().unwrap(), "m5");
        assert_eq!(drained[99].payload_text().unwrap(), "m104");
    }

    #[test]
    fn peers_do_not_interleave_within_their_own_order() {
        let inbox = PeerInbox::new();
        inbox.push(env("r2", "r2-first"));
        inbox.push(env("calcifer", "c-first"));
        inbox.push(env("r2", "r2-second"));

        let drained = inbox.drain_all();
        let r2: Vec<&str> = drained
            .iter()
            .filter(|e| e.from == "r2")
            .map(|e| e.payload_text().unwrap())
            .collect();
        assert_eq!(r2, vec!["r2-first", "r2-second"]);
    }
}
