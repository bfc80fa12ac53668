//! Remote license authority interface.
//!
//! The authority is the source of truth for revocations and reactivations.
//! Requests are signed with the shared secret; the secret itself never
//! leaves the process.

use crate::config::SecretKey;
use crate::device::DeviceInfo;
use crate::error::{LicenseError, LicenseResult};
use crate::signature::sign;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyward_types::format_timestamp;
use serde::{Deserialize, Serialize};

/// Path of the validation endpoint, relative to the authority base URL.
pub const VALIDATE_PATH: &str = "/api/v2/validate";

/// Body of a validation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateRequest {
    /// License key being validated.
    pub license_key: String,
    /// Requesting device.
    pub device_id: String,
    /// RFC 3339 time the request was signed.
    pub timestamp: String,
    /// Hex HMAC-SHA256 over key, device, app name and timestamp.
    pub signature: String,
    /// Client address, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl ValidateRequest {
    /// Builds and signs a request at `now`.
    #[must_use]
    pub fn signed(
        license_key: &str,
        device: &DeviceInfo,
        app_name: &str,
        secret_key: &SecretKey,
        now: DateTime<Utc>,
    ) -> Self {
        let timestamp = format_timestamp(now);
        let signature = sign(license_key, &device.device_id, app_name, secret_key, &timestamp);
        Self {
            license_key: license_key.to_string(),
            device_id: device.device_id.clone(),
            timestamp,
            signature,
            ip_address: device.ip_address.clone(),
        }
    }
}

/// The authority's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteVerdict {
    /// Whether the license is valid for this device.
    pub valid: bool,
    /// Authority-side status label.
    #[serde(default)]
    pub status: String,
    /// ISO-8601 expiration, or null for perpetual licenses.
    #[serde(default)]
    pub expiration: Option<String>,
    /// Human-readable detail.
    #[serde(default)]
    pub message: Option<String>,
    /// Machine-readable denial reason, when the authority provides one.
    #[serde(default)]
    pub error: Option<String>,
}

/// A remote license authority.
#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    /// Submits a signed validation request.
    ///
    /// Implementations must bound the call with a timeout and must not
    /// retry. Transport failures and non-2xx answers are errors.
    async fn validate(&self, request: &ValidateRequest) -> LicenseResult<RemoteVerdict>;
}

/// An authority that is never reachable. Used when running offline.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineAuthority;

#[async_trait]
impl RemoteAuthority for OfflineAuthority {
    async fn validate(&self, _request: &ValidateRequest) -> LicenseResult<RemoteVerdict> {
        Err(LicenseError::Network("offline mode".to_string()))
    }
}

#[cfg(feature = "online")]
pub use http::HttpAuthority;

#[cfg(feature = "online")]
mod http {
    use super::{RemoteAuthority, RemoteVerdict, ValidateRequest, VALIDATE_PATH};
    use crate::config::KeywardConfig;
    use crate::error::{LicenseError, LicenseResult};
    use async_trait::async_trait;
    use reqwest::Client;
    use std::time::Duration;
    use tracing::debug;

    /// HTTP client for the remote authority.
    #[derive(Debug, Clone)]
    pub struct HttpAuthority {
        client: Client,
        endpoint: String,
    }

    impl HttpAuthority {
        /// Creates a client from configuration.
        pub fn new(config: &KeywardConfig) -> LicenseResult<Self> {
            Self::with_base_url(&config.server_url, config.request_timeout())
        }

        /// Creates a client for an explicit base URL.
        pub fn with_base_url(base_url: &str, timeout: Duration) -> LicenseResult<Self> {
            let client = Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| LicenseError::Config(format!("failed to create HTTP client: {e}")))?;
            Ok(Self {
                client,
                endpoint: format!("{}{VALIDATE_PATH}", base_url.trim_end_matches('/')),
            })
        }

        /// Full URL requests are posted to.
        #[must_use]
        pub fn endpoint(&self) -> &str {
            &self.endpoint
        }
    }

    #[async_trait]
    impl RemoteAuthority for HttpAuthority {
        async fn validate(&self, request: &ValidateRequest) -> LicenseResult<RemoteVerdict> {
            debug!(endpoint = %self.endpoint, license_key = %request.license_key, "validating with authority");

            let response = self
                .client
                .post(&self.endpoint)
                .json(request)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        LicenseError::Network("request timed out".to_string())
                    } else {
                        LicenseError::Network(e.to_string())
                    }
                })?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| LicenseError::Network(e.to_string()))?;

            if !status.is_success() {
                return Err(LicenseError::Server {
                    status: status.as_u16(),
                    message: body,
                });
            }

            Ok(serde_json::from_str(&body)?)
        }
    }
}
