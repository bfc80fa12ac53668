//! Device-bound licensing and trials for Keyward.
//!
//! This crate handles:
//! - Hardware fingerprinting for device binding
//! - Trial issuance with repeated-trial fraud detection
//! - HMAC-SHA256 request signing for the remote license authority
//! - Local-first license verification reconciled with the remote authority
//!
//! # Design Principles
//!
//! - **Local first**: a valid local verdict for a license already bound to
//!   this device is returned without touching the network unless a strict
//!   check is requested
//! - **Remote is authoritative**: when the authority answers, its verdict wins
//! - **Graceful degradation**: an unreachable authority downgrades to the
//!   local verdict with a `server_unavailable` warning
//! - **Permanent binding**: a license binds to the first device that
//!   verifies it and stays bound until an administrative reset
//!
//! Business outcomes (`device_mismatch`, `trial_already_active`, ...) are
//! returned as values. [`LicenseError`] is reserved for failures the caller
//! cannot act on as a normal denial.

mod clock;
mod config;
mod device;
mod error;
mod remote;
mod signature;
mod trial;
mod verifier;

pub use clock::{Clock, MockClock, SystemClock};
pub use config::{
    default_database_path, KeywardConfig, SecretKey, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_TRIAL_DAYS, FRAUD_THRESHOLD,
};
pub use device::{derive_hardware_id, hardware_id, DeviceInfo, FALLBACK_HARDWARE_ID};
pub use error::{ErrorKind, LicenseError, LicenseResult};
pub use remote::{OfflineAuthority, RemoteAuthority, RemoteVerdict, ValidateRequest, VALIDATE_PATH};
pub use signature::{sign, verify_signature};
pub use trial::{TrialActivation, TrialManager, TrialStatus};
pub use verifier::{LicenseVerifier, VerificationResult, Warning};

#[cfg(feature = "online")]
pub use remote::HttpAuthority;
