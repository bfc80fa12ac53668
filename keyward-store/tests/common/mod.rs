//! Shared test helpers for store tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use keyward_store::LocalLicenseStore;

/// A fixed reference instant used across tests.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

/// Opens a fresh in-memory store.
pub fn memory_store() -> LocalLicenseStore {
    LocalLicenseStore::open_in_memory().unwrap()
}
