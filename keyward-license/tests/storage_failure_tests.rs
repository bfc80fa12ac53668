//! Verification and trial checks against a store whose schema has been
//! damaged underneath it.

mod common;

use common::{clock, verifier, FakeAuthority};
use keyward_license::{ErrorKind, TrialManager};
use keyward_store::LocalLicenseStore;
use keyward_types::License;
use rusqlite::Connection;
use tempfile::TempDir;

const HW: &str = "0b6380cb86125d86";

fn file_store() -> (TempDir, LocalLicenseStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalLicenseStore::open(dir.path().join("licenses.db")).unwrap();
    (dir, store)
}

/// Runs `sql` from a second connection to the same database file.
fn tamper(dir: &TempDir, sql: &str) {
    let conn = Connection::open(dir.path().join("licenses.db")).unwrap();
    conn.execute_batch(sql).unwrap();
}

#[tokio::test]
async fn license_lookup_failure_is_database_error() {
    let (dir, store) = file_store();
    store.insert_license(&License::new("KEY1")).unwrap();
    tamper(&dir, "DROP TABLE licenses;");

    let v = verifier(&store, FakeAuthority::unreachable(), &clock(), "DEV-A");
    assert_eq!(v.local_check("KEY1", v.device()).error, Some(ErrorKind::DatabaseError));

    let result = v.verify("KEY1", false).await;
    assert!(!result.valid);
    assert_eq!(result.error, Some(ErrorKind::DatabaseError));
}

#[tokio::test]
async fn bind_failure_fails_closed() {
    let (dir, store) = file_store();
    store.insert_license(&License::new("KEY1")).unwrap();
    tamper(
        &dir,
        "CREATE TRIGGER licenses_read_only BEFORE UPDATE ON licenses
         BEGIN SELECT RAISE(ABORT, 'read only'); END;",
    );

    let result = verifier(&store, FakeAuthority::unreachable(), &clock(), "DEV-A")
        .verify("KEY1", false)
        .await;

    assert!(!result.valid);
    assert_eq!(result.error, Some(ErrorKind::DatabaseError));
    assert_eq!(store.get_license("KEY1").unwrap().unwrap().device_id, None);
}

#[test]
fn check_trial_is_false_when_trials_unreadable() {
    let (dir, store) = file_store();
    let manager = TrialManager::with_clock(store, clock());
    assert!(manager.activate_trial(HW, "a@example.com", 1).unwrap().is_activated());
    assert!(manager.check_trial(HW));

    tamper(&dir, "DROP TABLE trials;");

    assert!(!manager.check_trial(HW));
    assert!(manager.trial_status(HW).is_err());
}

#[test]
fn check_trial_is_false_when_blocklist_unreadable() {
    let (dir, store) = file_store();
    let manager = TrialManager::with_clock(store, clock());
    manager.activate_trial(HW, "a@example.com", 1).unwrap();

    tamper(&dir, "DROP TABLE blocked_hardware;");

    assert!(!manager.check_trial(HW));
}

#[test]
fn detect_fraud_is_false_when_counter_unreadable() {
    let (dir, store) = file_store();
    for _ in 0..3 {
        store.upsert_trial(HW, "a@example.com", 1, common::t0()).unwrap();
    }
    let manager = TrialManager::with_clock(store.clone(), clock());

    tamper(&dir, "DROP TABLE trial_attempts;");

    assert!(!manager.detect_fraud(HW));
    assert!(!store.is_blocked(HW).unwrap());
    assert!(manager.trial_attempts(HW).is_err());
}
