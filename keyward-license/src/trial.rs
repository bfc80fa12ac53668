//! Trial issuance and repeated-trial fraud detection.

use crate::clock::{Clock, SystemClock};
use crate::config::FRAUD_THRESHOLD;
use crate::error::{ErrorKind, LicenseResult};
use chrono::Duration;
use keyward_store::{LocalLicenseStore, TrialStart};
use keyward_types::TrialRecord;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Outcome of a trial activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrialActivation {
    /// A trial was started.
    Activated(TrialRecord),
    /// The activation was refused; nothing was written.
    Denied(ErrorKind),
}

impl TrialActivation {
    /// Returns true if a trial was started.
    #[must_use]
    pub fn is_activated(&self) -> bool {
        matches!(self, Self::Activated(_))
    }

    /// Returns the denial reason, if any.
    #[must_use]
    pub fn denial(&self) -> Option<ErrorKind> {
        match self {
            Self::Activated(_) => None,
            Self::Denied(kind) => Some(*kind),
        }
    }
}

/// Snapshot of a hardware id's trial standing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialStatus {
    /// Whether the trial currently grants access.
    pub active: bool,
    /// Whether the hardware id is blocked.
    pub blocked: bool,
    /// Total activations ever recorded.
    pub attempts: u32,
    /// Seconds of trial left.
    pub remaining_secs: i64,
    /// The current trial row.
    pub record: Option<TrialRecord>,
}

/// Issues trials and enforces the fraud threshold.
pub struct TrialManager {
    store: LocalLicenseStore,
    clock: Arc<dyn Clock>,
}

impl TrialManager {
    /// Creates a manager using wall-clock time.
    #[must_use]
    pub fn new(store: LocalLicenseStore) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Creates a manager with an explicit time source.
    #[must_use]
    pub fn with_clock(store: LocalLicenseStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Starts a `trial_days`-long trial for `hardware_id`.
    ///
    /// Denied with [`ErrorKind::FraudBlocked`] if the hardware id is blocked,
    /// or [`ErrorKind::TrialAlreadyActive`] if an unexpired trial exists.
    /// Fraud detection is not run here; callers invoke
    /// [`Self::detect_fraud`] themselves.
    ///
    /// # Errors
    ///
    /// Returns [`crate::LicenseError::Storage`] if the store fails.
    pub fn activate_trial(
        &self,
        hardware_id: &str,
        email: &str,
        trial_days: u32,
    ) -> LicenseResult<TrialActivation> {
        let now = self.clock.now();
        let outcome = match self.store.begin_trial(hardware_id, email, trial_days, now)? {
            TrialStart::Started(record) => {
                info!(hardware_id, end = %record.end_time, "trial activated");
                TrialActivation::Activated(record)
            }
            TrialStart::AlreadyActive(_) => {
                info!(hardware_id, "trial already active");
                TrialActivation::Denied(ErrorKind::TrialAlreadyActive)
            }
            TrialStart::Blocked => {
                warn!(hardware_id, "trial refused for blocked hardware");
                TrialActivation::Denied(ErrorKind::FraudBlocked)
            }
        };
        Ok(outcome)
    }

    /// Returns true if `hardware_id` holds an unexpired, used trial and is
    /// not blocked.
    ///
    /// Storage failures are logged and reported as "no trial".
    #[must_use]
    pub fn check_trial(&self, hardware_id: &str) -> bool {
        match self.store.is_blocked(hardware_id) {
            Ok(true) => return false,
            Ok(false) => {}
            Err(e) => {
                error!(hardware_id, error = %e, "blocklist lookup failed");
                return false;
            }
        }

        match self.store.get_trial(hardware_id) {
            Ok(Some(record)) => record.is_active_at(self.clock.now()),
            Ok(None) => false,
            Err(e) => {
                error!(hardware_id, error = %e, "trial lookup failed");
                false
            }
        }
    }

    /// Blocks `hardware_id` if its recorded activations exceed
    /// [`FRAUD_THRESHOLD`]. Returns true when the threshold is exceeded.
    ///
    /// Storage failures are logged and reported as "no fraud".
    #[must_use]
    pub fn detect_fraud(&self, hardware_id: &str) -> bool {
        let attempts = match self.store.count_trials(hardware_id) {
            Ok(n) => n,
            Err(e) => {
                error!(hardware_id, error = %e, "trial count lookup failed");
                return false;
            }
        };

        if attempts <= FRAUD_THRESHOLD {
            return false;
        }

        warn!(hardware_id, attempts, "repeated trial activations detected");
        if let Err(e) = self.block_hardware(hardware_id) {
            error!(hardware_id, error = %e, "failed to block hardware");
        }
        true
    }

    /// Total trial activations recorded for `hardware_id`.
    pub fn trial_attempts(&self, hardware_id: &str) -> LicenseResult<u32> {
        Ok(self.store.count_trials(hardware_id)?)
    }

    /// Reports the trial standing of `hardware_id`.
    pub fn trial_status(&self, hardware_id: &str) -> LicenseResult<TrialStatus> {
        let now = self.clock.now();
        let blocked = self.store.is_blocked(hardware_id)?;
        let attempts = self.store.count_trials(hardware_id)?;
        let record = self.store.get_trial(hardware_id)?;

        let active = !blocked && record.as_ref().is_some_and(|r| r.is_active_at(now));
        let remaining = record
            .as_ref()
            .filter(|_| active)
            .map_or(Duration::zero(), |r| r.remaining_at(now));

        Ok(TrialStatus {
            active,
            blocked,
            attempts,
            remaining_secs: remaining.num_seconds(),
            record,
        })
    }

    fn block_hardware(&self, hardware_id: &str) -> LicenseResult<()> {
        self.store.block(hardware_id)?;
        Ok(())
    }
}
