mod common;

use chrono::Duration;
use common::{memory_store, t0};
use keyward_store::{StoreError, TrialStart};
use std::sync::{Arc, Barrier};
use std::thread;

const HW: &str = "0123456789abcdef";

// ── Upsert & counter ─────────────────────────────────────────────

#[test]
fn no_trial_by_default() {
    let store = memory_store();
    assert!(store.get_trial(HW).unwrap().is_none());
    assert_eq!(store.count_trials(HW).unwrap(), 0);
}

#[test]
fn upsert_writes_record() {
    let store = memory_store();
    let record = store.upsert_trial(HW, "a@b.com", 1, t0()).unwrap();

    assert_eq!(record.start_time, t0());
    assert_eq!(record.end_time, t0() + Duration::days(1));
    assert!(record.used);
    assert_eq!(store.get_trial(HW).unwrap(), Some(record));
}

#[test]
fn upsert_overwrites_row_but_counts_every_attempt() {
    let store = memory_store();
    store.upsert_trial(HW, "first@b.com", 1, t0()).unwrap();
    store.upsert_trial(HW, "second@b.com", 1, t0() + Duration::days(2)).unwrap();
    store.upsert_trial(HW, "third@b.com", 3, t0() + Duration::days(4)).unwrap();

    let record = store.get_trial(HW).unwrap().unwrap();
    assert_eq!(record.email, "third@b.com");
    assert_eq!(record.end_time, t0() + Duration::days(7));
    assert_eq!(store.count_trials(HW).unwrap(), 3);
}

#[test]
fn counters_are_per_hardware_id() {
    let store = memory_store();
    store.upsert_trial("aaaa", "a@b.com", 1, t0()).unwrap();
    store.upsert_trial("aaaa", "a@b.com", 1, t0()).unwrap();
    store.upsert_trial("bbbb", "b@b.com", 1, t0()).unwrap();
    assert_eq!(store.count_trials("aaaa").unwrap(), 2);
    assert_eq!(store.count_trials("bbbb").unwrap(), 1);
}

// ── Atomic start ─────────────────────────────────────────────────

#[test]
fn begin_trial_starts_when_eligible() {
    let store = memory_store();
    let start = store.begin_trial(HW, "a@b.com", 1, t0()).unwrap();
    assert!(matches!(start, TrialStart::Started(ref r) if r.hardware_id == HW));
    assert_eq!(store.count_trials(HW).unwrap(), 1);
}

#[test]
fn begin_trial_rejects_active_trial_without_counting() {
    let store = memory_store();
    store.begin_trial(HW, "a@b.com", 1, t0()).unwrap();

    let second = store.begin_trial(HW, "a@b.com", 1, t0() + Duration::hours(1)).unwrap();
    assert!(matches!(second, TrialStart::AlreadyActive(_)));
    assert_eq!(store.count_trials(HW).unwrap(), 1);
}

#[test]
fn begin_trial_allows_restart_after_expiry() {
    let store = memory_store();
    store.begin_trial(HW, "a@b.com", 1, t0()).unwrap();

    let later = t0() + Duration::days(2);
    let again = store.begin_trial(HW, "a@b.com", 1, later).unwrap();
    assert!(matches!(again, TrialStart::Started(ref r) if r.start_time == later));
    assert_eq!(store.count_trials(HW).unwrap(), 2);
}

#[test]
fn begin_trial_rejects_blocked_hardware() {
    let store = memory_store();
    store.block(HW).unwrap();
    assert_eq!(store.begin_trial(HW, "a@b.com", 1, t0()).unwrap(), TrialStart::Blocked);
    assert!(store.get_trial(HW).unwrap().is_none());
}

#[test]
fn concurrent_begin_trial_admits_exactly_one() {
    let store = memory_store();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.begin_trial(HW, "race@b.com", 1, t0()).unwrap()
            })
        })
        .collect();

    let started = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|s| matches!(s, TrialStart::Started(_)))
        .count();

    assert_eq!(started, 1);
    assert_eq!(store.count_trials(HW).unwrap(), 1);
}

#[test]
fn oversized_trial_length_is_rejected_and_store_stays_usable() {
    let store = memory_store();

    let err = store.begin_trial(HW, "a@b.com", u32::MAX, t0()).unwrap_err();
    assert!(matches!(err, StoreError::InvalidTrialLength(u32::MAX)));
    assert!(matches!(
        store.upsert_trial(HW, "a@b.com", 3_000_000, t0()),
        Err(StoreError::InvalidTrialLength(3_000_000))
    ));

    assert!(store.get_trial(HW).unwrap().is_none());
    assert_eq!(store.count_trials(HW).unwrap(), 0);
    assert!(!store.is_blocked("other").unwrap());
    assert!(matches!(
        store.begin_trial(HW, "a@b.com", 1, t0()).unwrap(),
        TrialStart::Started(_)
    ));
}

// ── Blocklist ────────────────────────────────────────────────────

#[test]
fn block_is_idempotent() {
    let store = memory_store();
    assert!(!store.is_blocked(HW).unwrap());
    assert!(store.block(HW).unwrap());
    assert!(!store.block(HW).unwrap());
    assert!(store.is_blocked(HW).unwrap());
}

#[test]
fn block_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    keyward_store::LocalLicenseStore::open(&path).unwrap().block(HW).unwrap();
    let reopened = keyward_store::LocalLicenseStore::open(&path).unwrap();
    assert!(reopened.is_blocked(HW).unwrap());
}
