//! Inter-agent messaging — signed envelopes between peer daemons with FIFO
//! delivery queues, nonce-based replay protection, and a LAN→relay fallback
//! path.

pub mod audit;
pub mod envelope;
pub mod error;
pub mod heartbeat;
pub mod inbox;
pub mod keys;
pub mod nonce;
pub mod registry;
pub mod relay;
pub mod sender;

pub use audit::{AuditLog, AuditRecord, Direction};
pub use envelope::{format_envelope, Envelope, MessageKind};
pub use error::{PeerError, Result};
pub use heartbeat::Heartbeater;
pub use inbox::PeerInbox;
pub use nonce::NonceCache;
pub use registry::{KeyStatus, PeerEntry, PeerRegistry};
pub use relay::RelayClient;
pub use sender::{DeliveryPath, PeerSender};
