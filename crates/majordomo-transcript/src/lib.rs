//! Transcript stream — tails the Claude session's append-only JSONL
//! transcript and fans assistant messages out to channel adapters.
//!
//! Reads are triggered by three kick sources, coalesced through a dirty
//! flag: hook-event POSTs from the Claude runtime, filesystem watch events,
//! and a low-frequency polling timer as a safety net.

pub mod discover;
pub mod error;
pub mod parse;
pub mod stats;
pub mod stream;

pub use error::{Result, TranscriptError};
pub use stream::{
    spawn_poll_timer, spawn_watcher, AssistantMessage, Kick, TranscriptHandle, TranscriptStream,
};
