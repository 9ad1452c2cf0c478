//! Access control — sender classification, the approval state machine, and
//! per-sender rate limiting.
//!
//! Every inbound adapter calls into this crate before any further processing
//! of an unsolicited message.

pub mod control;
pub mod error;
pub mod ratelimit;
pub mod store;
pub mod types;

pub use control::{AccessControl, ApprovalOutcome, InboundDecision};
pub use error::{AccessError, Result};
pub use ratelimit::{IncomingLimiter, IncomingVerdict, OutgoingLimiter};
pub use types::{AccessState, SenderKey, Tier};
