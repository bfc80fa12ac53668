//! Local-first license verification reconciled with the remote authority.
//!
//! ```text
//! local = local_check(key)
//! local valid && bound && !strict -> local                 (no network)
//! remote answers                  -> remote                (authoritative)
//! remote fails && strict         -> server_error
//! remote fails && !strict        -> local + server_unavailable
//! ```
//!
//! A license with no device yet is always offered to the authority before
//! it is bound. The store is only written after a valid verdict, and only
//! to bind a license that has no device yet.

use crate::clock::{Clock, SystemClock};
use crate::config::KeywardConfig;
use crate::device::DeviceInfo;
use crate::error::{ErrorKind, LicenseResult};
use crate::remote::{RemoteAuthority, RemoteVerdict, ValidateRequest};
use chrono::{DateTime, Utc};
use keyward_store::LocalLicenseStore;
use keyward_types::{parse_timestamp, LicenseState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Non-fatal condition attached to a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Warning {
    /// The remote authority could not be consulted.
    ServerUnavailable,
}

/// The verdict returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Whether the license may be used.
    pub valid: bool,
    /// Status label as stored locally or reported by the authority.
    pub status: Option<String>,
    /// Expiration, if the license has one.
    pub expiration: Option<DateTime<Utc>>,
    /// Denial reason.
    pub error: Option<ErrorKind>,
    /// Human-readable detail.
    pub message: Option<String>,
    /// Set when the verdict was produced in degraded mode.
    pub warning: Option<Warning>,
}

impl VerificationResult {
    /// A successful verdict.
    #[must_use]
    pub fn granted(status: impl Into<String>, expiration: Option<DateTime<Utc>>) -> Self {
        Self {
            valid: true,
            status: Some(status.into()),
            expiration,
            error: None,
            message: None,
            warning: None,
        }
    }

    /// A denial.
    #[must_use]
    pub fn denied(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            valid: false,
            status: None,
            expiration: None,
            error: Some(kind),
            message: Some(message.into()),
            warning: None,
        }
    }

    fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    fn with_expiration(mut self, expiration: Option<DateTime<Utc>>) -> Self {
        self.expiration = expiration;
        self
    }
}

/// Local verdict plus whether a successful verify should bind the device.
struct LocalVerdict {
    result: VerificationResult,
    needs_binding: bool,
}

/// Verifies licenses for one device.
pub struct LicenseVerifier {
    store: LocalLicenseStore,
    authority: Arc<dyn RemoteAuthority>,
    clock: Arc<dyn Clock>,
    device: DeviceInfo,
    config: KeywardConfig,
}

impl LicenseVerifier {
    /// Creates a verifier for `device` using wall-clock time.
    #[must_use]
    pub fn new(
        store: LocalLicenseStore,
        authority: Arc<dyn RemoteAuthority>,
        config: &KeywardConfig,
        device: DeviceInfo,
    ) -> Self {
        Self {
            store,
            authority,
            clock: Arc::new(SystemClock),
            device,
            config: config.clone(),
        }
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The device this verifier speaks for.
    #[must_use]
    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Verifies `license_key` for this verifier's device.
    ///
    /// With `strict_check` the remote authority must confirm the verdict;
    /// otherwise a valid local verdict for an already bound license is
    /// returned without a network call. Never fails: every problem becomes
    /// a denial.
    pub async fn verify(&self, license_key: &str, strict_check: bool) -> VerificationResult {
        let local = self.local_verdict(license_key, &self.device);

        if local.result.valid && !local.needs_binding && !strict_check {
            debug!(license_key, "local verdict accepted");
            return self.commit(license_key, local.result, local.needs_binding);
        }

        match self.remote_check(license_key, &self.device).await {
            Ok(remote) => {
                debug!(license_key, valid = remote.valid, "remote verdict received");
                let bind = remote.valid && local.needs_binding;
                self.commit(license_key, remote, bind)
            }
            Err(e) if strict_check => {
                warn!(license_key, error = %e, "strict verification failed: authority unavailable");
                VerificationResult::denied(e.kind(), e.to_string())
            }
            Err(e) => {
                warn!(license_key, error = %e, "authority unavailable, using local verdict");
                let mut result = local.result;
                result.warning = Some(Warning::ServerUnavailable);
                let bind = result.valid && local.needs_binding;
                self.commit(license_key, result, bind)
            }
        }
    }

    /// Checks `license_key` against the local store only.
    #[must_use]
    pub fn local_check(&self, license_key: &str, device: &DeviceInfo) -> VerificationResult {
        self.local_verdict(license_key, device).result
    }

    /// Asks the remote authority about `license_key`.
    ///
    /// # Errors
    ///
    /// Returns an error if no shared secret is configured, or if the
    /// authority is unreachable, times out, answers with a non-2xx status or
    /// sends an unparseable body.
    pub async fn remote_check(
        &self,
        license_key: &str,
        device: &DeviceInfo,
    ) -> LicenseResult<VerificationResult> {
        let secret_key = self.config.require_secret()?;
        let now = self.clock.now();
        let request = ValidateRequest::signed(license_key, device, &self.config.app_name, secret_key, now);
        let verdict = self.authority.validate(&request).await?;
        Ok(self.remote_result(verdict, now))
    }

    fn local_verdict(&self, license_key: &str, device: &DeviceInfo) -> LocalVerdict {
        let deny = |result| LocalVerdict {
            result,
            needs_binding: false,
        };

        let license = match self.store.get_license(license_key) {
            Ok(Some(license)) => license,
            Ok(None) => {
                return deny(VerificationResult::denied(
                    ErrorKind::LicenseNotFound,
                    "license key not found",
                ));
            }
            Err(e) => {
                error!(license_key, error = %e, "license lookup failed");
                return deny(VerificationResult::denied(ErrorKind::DatabaseError, e.to_string()));
            }
        };

        let now = self.clock.now();
        let denied = |kind, message: &str| {
            deny(
                VerificationResult::denied(kind, message)
                    .with_status(license.status.clone())
                    .with_expiration(license.expiration_date),
            )
        };

        match license.state() {
            _ if license.is_expired_at(now) => {
                return denied(ErrorKind::LicenseNotFound, "license expired");
            }
            Some(LicenseState::Blocked) => {
                return denied(ErrorKind::FraudBlocked, "license blocked");
            }
            Some(state) if state.is_usable() => {}
            Some(_) => {
                return denied(ErrorKind::LicenseNotFound, "license expired");
            }
            None => {
                warn!(license_key, status = %license.status, "unrecognised license status");
                return denied(ErrorKind::LicenseNotFound, "license status not recognised");
            }
        }

        match license.bound_device() {
            Some(bound) if bound != device.device_id => {
                denied(ErrorKind::DeviceMismatch, "license is bound to another device")
            }
            bound => LocalVerdict {
                result: VerificationResult::granted(license.status.clone(), license.expiration_date),
                needs_binding: bound.is_none(),
            },
        }
    }

    fn remote_result(&self, verdict: RemoteVerdict, now: DateTime<Utc>) -> VerificationResult {
        let expiration = verdict.expiration.as_deref().and_then(|raw| match parse_timestamp(raw) {
            Ok(ts) => Some(ts),
            Err(e) => {
                warn!(expiration = raw, error = %e, "ignoring unparseable remote expiration");
                None
            }
        });

        if verdict.valid && expiration.is_some_and(|exp| exp < now) {
            return VerificationResult::denied(ErrorKind::LicenseNotFound, "license expired")
                .with_status(verdict.status)
                .with_expiration(expiration);
        }

        // An authority denial without a recognised label reads as "no usable license".
        let error = verdict
            .error
            .as_deref()
            .and_then(|e| e.parse().ok())
            .or((!verdict.valid).then_some(ErrorKind::LicenseNotFound));

        VerificationResult {
            valid: verdict.valid,
            status: Some(verdict.status),
            expiration,
            error,
            message: verdict.message,
            warning: None,
        }
    }

    /// Persists the first-device binding for a valid verdict.
    ///
    /// If another device won a concurrent bind, the verdict turns into a
    /// device mismatch. A failed write fails closed.
    fn commit(&self, license_key: &str, result: VerificationResult, bind: bool) -> VerificationResult {
        if !bind {
            return result;
        }

        let device_id = &self.device.device_id;
        match self.store.bind_device(license_key, device_id, self.clock.now()) {
            Ok(true) => {
                info!(license_key, device_id = %device_id, "license bound on first verification");
                result
            }
            Ok(false) => match self.store.get_license(license_key) {
                Ok(Some(license)) if license.bound_device().is_some_and(|d| d != device_id) => {
                    VerificationResult::denied(ErrorKind::DeviceMismatch, "license is bound to another device")
                        .with_status(license.status)
                        .with_expiration(license.expiration_date)
                }
                Ok(_) => result,
                Err(e) => {
                    error!(license_key, error = %e, "license re-read failed");
                    VerificationResult::denied(ErrorKind::DatabaseError, e.to_string())
                }
            },
            Err(e) => {
                error!(license_key, error = %e, "failed to bind license");
                VerificationResult::denied(ErrorKind::DatabaseError, e.to_string())
            }
        }
    }
}
