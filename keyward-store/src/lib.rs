//! Local license store for Keyward.
//!
//! Durable, transactional storage for the three record families the
//! licensing engine relies on:
//! - `licenses`: provisioned keys and their device binding
//! - `trials`: one upserted row per hardware id
//! - `blocked_hardware`: permanent fraud blocklist
//!
//! Trial re-activations overwrite the `trials` row, so a separate
//! `trial_attempts` counter keeps the total number of activations per
//! hardware id. The counter only ever increases.

mod error;
mod schema;
mod store;

pub use error::{StoreError, StoreResult};
pub use store::{LocalLicenseStore, TrialStart};
