//! Session bridge — the single gateway to the tmux pane hosting the Claude
//! CLI session.
//!
//! Every injection in the daemon funnels through [`SessionBridge`]; the
//! bridge serializes writers, confirms submission, and tracks the agent's
//! idle/busy state from runtime hook events.

pub mod bridge;
pub mod error;
pub mod state;

pub use bridge::SessionBridge;
pub use error::{Result, SessionError};
pub use state::AgentStateTracker;
