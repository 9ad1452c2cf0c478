use std::collections::{HashSet, VecDeque};
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::discover::newest_transcript;
use crate::parse::{parse_line, ParsedLine};
use crate::stats::{StatsSnapshot, StreamStats};

/// Remember this many emitted message ids for deduplication.
const SEEN_CAP: usize = 1024;
/// Fan-out buffer; a slow adapter lags rather than blocking the reader.
const EVENT_BUFFER: usize = 64;

/// What triggered a read pass. Purely diagnostic — all kicks coalesce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kick {
    /// `/hook/response` POST from the Claude runtime.
    Hook,
    /// Filesystem watch event on the transcript directory.
    FsEvent,
    /// Low-frequency safety-net timer.
    Poll,
}

/// An assistant text message lifted out of the transcript.
#[derive(Debug, Clone, Serialize)]
pub struct AssistantMessage {
    pub text: String,
    pub message_id: String,
}

/// Byte-level read state for the tracked transcript file.
#[derive(Debug, Default)]
struct Position {
    path: Option<PathBuf>,
    offset: u64,
    /// Trailing bytes of an incomplete line, kept until the newline arrives.
    partial: String,
}

/// Bounded id set — oldest entries fall out once [`SEEN_CAP`] is reached.
#[derive(Debug, Default)]
struct SeenIds {
    set: HashSet<String>,
    order: VecDeque<String>,
}

impl SeenIds {
    /// Insert `id`; returns false when it was already present.
    fn insert(&mut self, id: &str) -> bool {
        if self.set.contains(id) {
            return false;
        }
        if self.order.len() >= SEEN_CAP {
            if let Some(evicted) = self.order.pop_front() {
                self.set.remove(&evicted);
            }
        }
        self.set.insert(id.to_string());
        self.order.push_back(id.to_string());
        true
    }
}

/// Cloneable handle for kicking the stream and subscribing to its output.
#[derive(Clone)]
pub struct TranscriptHandle {
    dirty: Arc<AtomicBool>,
    kick_tx: mpsc::Sender<()>,
    stats: Arc<StreamStats>,
    events: broadcast::Sender<AssistantMessage>,
}

impl TranscriptHandle {
    /// Request a read pass. Concurrent kicks while one is already queued
    /// collapse into a single pass via the dirty flag.
    pub fn kick(&self, source: Kick) {
        trace!(?source, "transcript kick");
        if !self.dirty.swap(true, Ordering::AcqRel) {
            // Capacity-1 channel: a full queue already guarantees a pass.
            let _ = self.kick_tx.try_send(());
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AssistantMessage> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

/// The tailing worker. Owns all read state; driven by kicks.
pub struct TranscriptStream {
    dir: PathBuf,
    pos: Position,
    seen: SeenIds,
    stats: Arc<StreamStats>,
    events: broadcast::Sender<AssistantMessage>,
    dirty: Arc<AtomicBool>,
    kick_rx: mpsc::Receiver<()>,
}

impl TranscriptStream {
    pub fn new(dir: PathBuf) -> (Self, TranscriptHandle) {
        let (kick_tx, kick_rx) = mpsc::channel(1);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let dirty = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(StreamStats::default());

        let handle = TranscriptHandle {
            dirty: Arc::clone(&dirty),
            kick_tx,
            stats: Arc::clone(&stats),
            events: events.clone(),
        };

        let stream = Self {
            dir,
            pos: Position::default(),
            seen: SeenIds::default(),
            stats,
            events,
            dirty,
            kick_rx,
        };

        (stream, handle)
    }

    /// Main event loop. Consumes kicks until `shutdown` broadcasts `true`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(dir = %self.dir.display(), "transcript stream started");
        // Catch up on whatever is already on disk before the first kick.
        self.poll_once();

        loop {
            tokio::select! {
                kick = self.kick_rx.recv() => {
                    if kick.is_none() {
                        debug!("all transcript handles dropped — stopping");
                        break;
                    }
                    self.dirty.store(false, Ordering::Release);
                    self.poll_once();
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("transcript stream shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One synchronous read pass: discover the newest transcript, read from
    /// the tracked offset to EOF, and emit any new assistant messages.
    ///
    /// Local file reads are quick; doing them inline keeps offset updates
    /// trivially ordered.
    pub fn poll_once(&mut self) {
        let newest = match newest_transcript(&self.dir) {
            Ok(Some(path)) => path,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "transcript discovery failed");
                return;
            }
        };

        // Rotation: a different newest file restarts from zero.
        if self.pos.path.as_ref() != Some(&newest) {
            if self.pos.path.is_some() {
                info!(path = %newest.display(), "transcript rotated");
            }
            self.pos = Position {
                path: Some(newest.clone()),
                offset: 0,
                partial: String::new(),
            };
            // A fresh file means a fresh session; old ids stay in the seen
            // set so replays across rotation still dedup.
        }

        let mut file = match std::fs::File::open(&newest) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %newest.display(), error = %e, "transcript open failed");
                return;
            }
        };

        let len = match file.metadata() {
            Ok(m) => m.len(),
            Err(e) => {
                warn!(error = %e, "transcript metadata failed");
                return;
            }
        };

        // Truncated in place (also a rotation signal): start over.
        if len < self.pos.offset {
            self.pos.offset = 0;
            self.pos.partial.clear();
        }
        if len == self.pos.offset {
            return;
        }

        if let Err(e) = file.seek(SeekFrom::Start(self.pos.offset)) {
            warn!(error = %e, "transcript seek failed");
            return;
        }

        let mut bytes = Vec::new();
        if let Err(e) = file.read_to_end(&mut bytes) {
            warn!(error = %e, "transcript read failed");
            return;
        }
        self.pos.offset += bytes.len() as u64;
        self.pos.partial.push_str(&String::from_utf8_lossy(&bytes));

        // Drain complete lines; the trailing fragment waits for its newline.
        while let Some(nl) = self.pos.partial.find('\n') {
            let line: String = self.pos.partial.drain(..=nl).collect();
            self.handle_line(line.trim());
        }
    }

    fn handle_line(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        match parse_line(line) {
            ParsedLine::Assistant(msg) => {
                if self.seen.insert(&msg.message_id) {
                    self.stats.record_emitted();
                    debug!(message_id = %msg.message_id, chars = msg.text.len(), "assistant message");
                    // No receivers is fine — adapters may not be up yet.
                    let _ = self.events.send(msg);
                } else {
                    self.stats.record_duplicate();
                }
            }
            ParsedLine::Other => {}
            ParsedLine::Invalid => self.stats.record_parse_error(),
        }
    }
}

/// Watch the transcript directory, kicking the stream on any fs event.
///
/// The returned watcher must be kept alive for the watch to stay active.
pub fn spawn_watcher(
    handle: TranscriptHandle,
    dir: &std::path::Path,
) -> crate::error::Result<notify::RecommendedWatcher> {
    use notify::Watcher;

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(_) => handle.kick(Kick::FsEvent),
            Err(e) => warn!(error = %e, "transcript watch error"),
        }
    })
    .map_err(|e| crate::error::TranscriptError::Watcher(e.to_string()))?;

    watcher
        .watch(dir, notify::RecursiveMode::Recursive)
        .map_err(|e| crate::error::TranscriptError::Watcher(e.to_string()))?;

    Ok(watcher)
}

/// Safety-net poll timer; catches anything the watcher and hooks miss.
pub fn spawn_poll_timer(
    handle: TranscriptHandle,
    every: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => handle.kick(Kick::Poll),
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;

    fn assistant_line(id: &str, text: &str) -> String {
        format!(
            r#"{{"type":"assistant","message":{{"id":"{id}","content":[{{"type":"text","text":"{text}"}}]}}}}"#
        )
    }

    fn append(path: &std::path::Path, data: &str) {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(data.as_bytes()).unwrap();
    }

    #[test]
    fn emits_new_lines_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s1.jsonl");
        append(&path, &(assistant_line("m1", "first") + "\n"));
        append(&path, &(assistant_line("m2", "second") + "\n"));

        let (mut stream, handle) = TranscriptStream::new(dir.path().to_path_buf());
        let mut rx = handle.subscribe();
        stream.poll_once();

        assert_eq!(rx.try_recv().unwrap().text, "first");
        assert_eq!(rx.try_recv().unwrap().text, "second");
        assert!(rx.try_recv().is_err());
        assert_eq!(handle.stats().emitted, 2);
    }

    #[test]
    fn two_passes_over_same_range_emit_each_id_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s1.jsonl");
        append(&path, &(assistant_line("m1", "hello") + "\n"));

        let (mut stream, handle) = TranscriptStream::new(dir.path().to_path_buf());
        let mut rx = handle.subscribe();
        stream.poll_once();
        // Force a re-read of the same byte range.
        stream.pos.offset = 0;
        stream.poll_once();

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
        assert_eq!(handle.stats().emitted, 1);
        assert_eq!(handle.stats().dropped_duplicate, 1);
    }

    #[test]
    fn partial_line_waits_for_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s1.jsonl");
        let full = assistant_line("m1", "split");
        let (head, tail) = full.split_at(20);

        let (mut stream, handle) = TranscriptStream::new(dir.path().to_path_buf());
        let mut rx = handle.subscribe();

        append(&path, head);
        stream.poll_once();
        assert!(rx.try_recv().is_err());

        append(&path, &format!("{tail}\n"));
        stream.poll_once();
        assert_eq!(rx.try_recv().unwrap().text, "split");
    }

    #[test]
    fn rotation_mid_line_keeps_preceding_lines() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("a.jsonl");
        append(
            &old,
            &(assistant_line("m1", "kept") + "\n" + "{\"type\":\"assistant\",\"mess"),
        );

        let (mut stream, handle) = TranscriptStream::new(dir.path().to_path_buf());
        let mut rx = handle.subscribe();
        stream.poll_once();
        assert_eq!(rx.try_recv().unwrap().text, "kept");

        // Rotation: a newer file appears; the dangling fragment is discarded.
        OpenOptions::new()
            .append(true)
            .open(&old)
            .unwrap()
            .set_modified(std::time::SystemTime::now() - std::time::Duration::from_secs(60))
            .unwrap();
        let new = dir.path().join("b.jsonl");
        append(&new, &(assistant_line("m2", "fresh") + "\n"));
        stream.poll_once();

        assert_eq!(rx.try_recv().unwrap().text, "fresh");
        assert_eq!(handle.stats().parse_errors, 0);
    }

    #[test]
    fn shrunk_file_restarts_from_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s1.jsonl");
        append(&path, &(assistant_line("m1", "one") + "\n"));

        let (mut stream, handle) = TranscriptStream::new(dir.path().to_path_buf());
        let mut rx = handle.subscribe();
        stream.poll_once();
        assert!(rx.try_recv().is_ok());

        // Truncate and rewrite with a new id.
        std::fs::write(&path, assistant_line("m2", "two") + "\n").unwrap();
        stream.poll_once();
        assert_eq!(rx.try_recv().unwrap().text, "two");
    }

    #[test]
    fn duplicate_id_across_rotation_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("a.jsonl");
        append(&old, &(assistant_line("m1", "original") + "\n"));

        let (mut stream, handle) = TranscriptStream::new(dir.path().to_path_buf());
        let mut rx = handle.subscribe();
        stream.poll_once();
        assert!(rx.try_recv().is_ok());

        OpenOptions::new()
            .append(true)
            .open(&old)
            .unwrap()
            .set_modified(std::time::SystemTime::now() - std::time::Duration::from_secs(60))
            .unwrap();
        let new = dir.path().join("b.jsonl");
        append(&new, &(assistant_line("m1", "replayed") + "\n"));
        stream.poll_once();

        assert!(rx.try_recv().is_err());
        assert_eq!(handle.stats().dropped_duplicate, 1);
    }

    #[test]
    fn parse_errors_are_counted_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s1.jsonl");
        append(&path, "{broken\n");
        append(&path, &(assistant_line("m1", "ok") + "\n"));

        let (mut stream, handle) = TranscriptStream::new(dir.path().to_path_buf());
        let mut rx = handle.subscribe();
        stream.poll_once();

        assert_eq!(rx.try_recv().unwrap().text, "ok");
        assert_eq!(handle.stats().parse_errors, 1);
    }

    #[tokio::test]
    async fn concurrent_kicks_coalesce() {
        let dir = tempfile::tempdir().unwrap();
        let (_stream, handle) = TranscriptStream::new(dir.path().to_path_buf());

        handle.kick(Kick::Hook);
        handle.kick(Kick::FsEvent);
        handle.kick(Kick::Poll);

        // Only one token queued: the dirty flag swallowed the rest.
        assert!(handle.dirty.load(Ordering::Acquire));
        assert!(handle.kick_tx.capacity() == 0);
    }
}
