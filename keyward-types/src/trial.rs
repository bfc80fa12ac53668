//! Trial records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The single trial row kept per hardware id.
///
/// Re-activation overwrites the row; the total number of activations is
/// tracked separately by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Hardware id the trial is tied to.
    pub hardware_id: String,
    /// Email supplied at activation.
    pub email: String,
    /// When the trial started.
    pub start_time: DateTime<Utc>,
    /// When the trial ends.
    pub end_time: DateTime<Utc>,
    /// Whether the trial has been consumed.
    pub used: bool,
}

impl TrialRecord {
    /// Returns true if the trial grants access at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.used && self.end_time >= now
    }

    /// Time left before the trial ends, or zero once it has ended.
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.end_time - now).max(Duration::zero())
    }
}
