//! Runtime configuration.
//!
//! Built once at process start and passed explicitly to the verifier and
//! the HTTP authority client. The fraud threshold and default trial length
//! are compile-time constants and cannot be changed from the environment.

use crate::error::{LicenseError, LicenseResult};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Number of trial activations a hardware id may accumulate before it is
/// blocked. Blocking happens once the count exceeds this value.
pub const FRAUD_THRESHOLD: u32 = 2;

/// Default trial length in days.
pub const DEFAULT_TRIAL_DAYS: u32 = 1;

/// Default bound on a remote authority call.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

const ENV_SECRET_KEY: &str = "KEYWARD_SECRET_KEY";
const ENV_SERVER_URL: &str = "KEYWARD_SERVER_URL";
const ENV_APP_NAME: &str = "KEYWARD_APP_NAME";
const ENV_DB_PATH: &str = "KEYWARD_DB_PATH";

/// Shared secret used to sign authority requests.
///
/// Never serialized and never printed; memory is wiped on drop.
#[derive(Clone, Default, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecretKey(String);

impl SecretKey {
    /// Wraps a secret.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Raw key bytes for MAC computation.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Returns true if no secret was configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey([redacted])")
    }
}

/// Keyward configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeywardConfig {
    /// Secret shared with the remote authority.
    pub secret_key: SecretKey,
    /// Base URL of the remote authority (e.g. `https://licenses.example.com`).
    pub server_url: String,
    /// Application name mixed into every request signature.
    pub app_name: String,
    /// Location of the local SQLite store.
    pub database_path: PathBuf,
    /// Bound on a single remote call, in seconds. Calls are never retried.
    pub request_timeout_secs: u64,
}

impl Default for KeywardConfig {
    fn default() -> Self {
        Self {
            secret_key: SecretKey::default(),
            server_url: "http://127.0.0.1:8000".to_string(),
            app_name: "keyward".to_string(),
            database_path: default_database_path(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl KeywardConfig {
    /// Reads configuration from `KEYWARD_*` environment variables.
    ///
    /// Unset or empty variables keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let var = |name| lookup(name).filter(|s: &String| !s.is_empty());

        if let Some(secret) = var(ENV_SECRET_KEY) {
            config.secret_key = SecretKey::new(secret);
        }
        if let Some(url) = var(ENV_SERVER_URL) {
            config.server_url = url;
        }
        if let Some(name) = var(ENV_APP_NAME) {
            config.app_name = name;
        }
        if let Some(path) = var(ENV_DB_PATH) {
            config.database_path = PathBuf::from(path);
        }

        config
    }

    /// Returns the shared secret, required before talking to the authority.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Config`] if no secret is configured.
    pub fn require_secret(&self) -> LicenseResult<&SecretKey> {
        if self.secret_key.is_empty() {
            return Err(LicenseError::Config(format!("{ENV_SECRET_KEY} is not set")));
        }
        Ok(&self.secret_key)
    }

    /// Remote call timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Platform data directory for the local store, falling back to the
/// working directory.
#[must_use]
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("keyward"))
        .unwrap_or_default()
        .join("licenses.db")
}
