//! Email channel adapter — multi-provider mailbox contracts and the triage
//! classifier.
//!
//! Concrete protocol clients (IMAP/JMAP/Graph) plug in behind
//! [`MailProvider`]; the kernel only depends on the contract.

pub mod adapter;
pub mod error;
pub mod provider;
pub mod spool;
pub mod triage;

pub use adapter::EmailAdapter;
pub use error::{EmailError, Result};
pub use provider::{MailProvider, OutgoingMail};
pub use spool::SpoolProvider;
pub use triage::{TriageCategory, TriageClassifier};
