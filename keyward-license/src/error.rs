//! Error types for the licensing module.

use keyward_store::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Machine-readable reason attached to a denial.
///
/// These travel inside results; they are not raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Key absent from the local store, or past its expiration date.
    LicenseNotFound,
    /// License is bound to a different device.
    DeviceMismatch,
    /// Hardware id is on the blocklist. Permanent.
    FraudBlocked,
    /// An unexpired trial already exists for this hardware id.
    TrialAlreadyActive,
    /// Remote authority unreachable or answered with a non-2xx status.
    ServerError,
    /// Local storage failed.
    DatabaseError,
}

impl ErrorKind {
    /// Returns the wire label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LicenseNotFound => "license_not_found",
            Self::DeviceMismatch => "device_mismatch",
            Self::FraudBlocked => "fraud_blocked",
            Self::TrialAlreadyActive => "trial_already_active",
            Self::ServerError => "server_error",
            Self::DatabaseError => "database_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "license_not_found" => Ok(Self::LicenseNotFound),
            "device_mismatch" => Ok(Self::DeviceMismatch),
            "fraud_blocked" => Ok(Self::FraudBlocked),
            "trial_already_active" => Ok(Self::TrialAlreadyActive),
            "server_error" => Ok(Self::ServerError),
            "database_error" => Ok(Self::DatabaseError),
            _ => Err(()),
        }
    }
}

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Local store failure.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Remote authority could not be reached or timed out.
    #[error("network error: {0}")]
    Network(String),

    /// Remote authority answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LicenseError {
    /// Maps the failure onto the denial reason a caller should surface.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage(_) => ErrorKind::DatabaseError,
            Self::Network(_) | Self::Server { .. } | Self::Serialization(_) | Self::Config(_) => {
                ErrorKind::ServerError
            }
        }
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
