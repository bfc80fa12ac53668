//! Core type definitions for Keyward.
//!
//! This crate defines the records shared by the store and the licensing
//! engine:
//! - Provisioned licenses and their lifecycle state
//! - Trial records keyed by hardware id
//! - The on-disk timestamp encoding (RFC 3339 TEXT)

mod license;
mod timestamp;
mod trial;

pub use license::{License, LicenseState};
pub use timestamp::{format_timestamp, parse_timestamp};
pub use trial::TrialRecord;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("unknown license state: {0}")]
    UnknownState(String),
}
