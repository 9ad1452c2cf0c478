pub mod config;
pub mod error;
pub mod logging;
pub mod types;
pub mod vault;

pub use error::{MajordomoError, Result};
