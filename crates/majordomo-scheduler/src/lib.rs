//! Cron + interval task dispatch with idle gating, persistent last-run
//! state, and manual-trigger support.

pub mod engine;
pub mod error;
pub mod schedule;
pub mod state;
pub mod types;

pub use engine::Scheduler;
pub use error::{Result, SchedulerError};
pub use schedule::Slot;
pub use types::{RegisteredTask, SessionGate, TaskFuture, TaskStatus};
