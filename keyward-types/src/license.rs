//! Provisioned license records.

use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a provisioned license.
///
/// ```text
/// available --(first successful verify)--> device_bound --(expiry)--> expired
/// ```
///
/// `blocked` is only ever set by an administrative action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseState {
    /// Provisioned, never verified.
    Available,
    /// Activated without a device binding (legacy rows).
    Activated,
    /// Bound to the first device that verified it.
    DeviceBound,
    /// Past its expiration date.
    Expired,
    /// Administratively blocked.
    Blocked,
}

impl LicenseState {
    /// Returns the canonical label written by this crate.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Activated => "activated",
            Self::DeviceBound => "device_bound",
            Self::Expired => "expired",
            Self::Blocked => "blocked",
        }
    }

    /// Returns true if a license in this state may pass verification.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Available | Self::Activated | Self::DeviceBound)
    }
}

impl fmt::Display for LicenseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseState {
    type Err = Error;

    /// Accepts the canonical labels and the Portuguese labels found in
    /// provisioned databases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" | "disponivel" => Ok(Self::Available),
            "activated" | "ativado" | "ativa" => Ok(Self::Activated),
            "device_bound" | "vinculado" => Ok(Self::DeviceBound),
            "expired" | "expirado" => Ok(Self::Expired),
            "blocked" | "bloqueado" => Ok(Self::Blocked),
            other => Err(Error::UnknownState(other.to_string())),
        }
    }
}

/// A provisioned license row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    /// Unique license key.
    pub key: String,
    /// Purchaser email, if known.
    pub email: Option<String>,
    /// Raw stored status label. Kept verbatim so it can be echoed back.
    pub status: String,
    /// Device the license is bound to. Immutable once set, except through
    /// an administrative reset.
    pub device_id: Option<String>,
    /// When the license was first bound.
    pub activation_date: Option<DateTime<Utc>>,
    /// When the license stops being valid. `None` never expires.
    pub expiration_date: Option<DateTime<Utc>>,
    /// Temporary licenses are issued for evaluations.
    pub is_temporary: bool,
}

impl License {
    /// Creates a fresh `available` license.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            email: None,
            status: LicenseState::Available.as_str().to_string(),
            device_id: None,
            activation_date: None,
            expiration_date: None,
            is_temporary: false,
        }
    }

    /// Sets the purchaser email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the raw status label.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Sets the expiration date.
    #[must_use]
    pub fn with_expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration_date = Some(expiration);
        self
    }

    /// Marks the license as temporary.
    #[must_use]
    pub fn temporary(mut self) -> Self {
        self.is_temporary = true;
        self
    }

    /// Parses the stored status label, if it is one we recognise.
    #[must_use]
    pub fn state(&self) -> Option<LicenseState> {
        self.status.parse().ok()
    }

    /// Returns true if the expiration date lies strictly before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date.is_some_and(|exp| exp < now)
    }

    /// Returns the bound device id, treating an empty string as unbound.
    #[must_use]
    pub fn bound_device(&self) -> Option<&str> {
        self.device_id.as_deref().filter(|d| !d.is_empty())
    }
}
