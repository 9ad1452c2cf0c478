//! Channel plumbing — the adapter capability trait, the outbound router,
//! and the single pending-voice slot.

pub mod channel;
pub mod error;
pub mod pending;
pub mod router;
pub mod types;

pub use channel::{Channel, Mailbox};
pub use error::{ChannelError, Result};
pub use pending::PendingVoice;
pub use router::Router;
pub use types::{ChannelStatus, MailSummary, Selection};
