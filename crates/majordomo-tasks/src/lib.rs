//! First-party scheduled tasks.
//!
//! Each module registers one task with the dispatcher; a task's only
//! supported side effects are filesystem reads under the project directory,
//! injections through the session bridge, or direct adapter sends when no
//! session is required.

pub mod approval_audit;
pub mod backup;
pub mod context_watchdog;
pub mod deps;
pub mod email_check;
pub mod email_triage;
pub mod evening_summary;
pub mod health_check;
pub mod memory_consolidation;
pub mod morning_briefing;
pub mod peer_heartbeat;
pub mod relay_poll;
pub mod reminders;
pub mod script;
pub mod session_keepalive;
pub mod todo_review;
pub mod transcript_stats;

use std::sync::Arc;

use majordomo_scheduler::Scheduler;

pub use deps::{TaskDeps, TaskPaths};

/// Register every first-party task. The config's enabled list decides which
/// of these actually get bound to a schedule.
pub fn register_all(scheduler: &Scheduler, deps: &Arc<TaskDeps>) {
    scheduler.register(reminders::task(deps));
    scheduler.register(todo_review::task(deps));
    scheduler.register(email_check::task(deps));
    scheduler.register(email_triage::task(deps));
    scheduler.register(morning_briefing::task(deps));
    scheduler.register(evening_summary::task(deps));
    scheduler.register(health_check::task(deps));
    scheduler.register(backup::task(deps));
    scheduler.register(context_watchdog::task(deps));
    scheduler.register(memory_consolidation::task(deps));
    scheduler.register(peer_heartbeat::task(deps));
    scheduler.register(relay_poll::task(deps));
    scheduler.register(approval_audit::task(deps));
    scheduler.register(transcript_stats::task(deps));
    scheduler.register(session_keepalive::task(deps));
}
