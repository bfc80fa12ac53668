//! Shared test helpers for license tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use keyward_license::{
    DeviceInfo, KeywardConfig, LicenseError, LicenseResult, LicenseVerifier, MockClock,
    RemoteAuthority, RemoteVerdict, SecretKey, ValidateRequest,
};
use keyward_store::LocalLicenseStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const SECRET: &str = "top-secret";
pub const APP: &str = "keyward";

/// A fixed reference instant, before the scenario licenses expire.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

pub fn clock() -> Arc<MockClock> {
    Arc::new(MockClock::new(t0()))
}

pub fn config() -> KeywardConfig {
    KeywardConfig {
        secret_key: SecretKey::new(SECRET),
        app_name: APP.to_string(),
        ..Default::default()
    }
}

/// What the fake authority answers with.
#[derive(Clone)]
pub enum Script {
    Verdict(RemoteVerdict),
    Unreachable,
    Status(u16),
}

/// In-process authority double that records every request.
pub struct FakeAuthority {
    script: Mutex<Script>,
    calls: AtomicUsize,
    last: Mutex<Option<ValidateRequest>>,
}

impl FakeAuthority {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Self::new(Script::Unreachable)
    }

    pub fn answering(verdict: RemoteVerdict) -> Arc<Self> {
        Self::new(Script::Verdict(verdict))
    }

    pub fn set(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ValidateRequest> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteAuthority for FakeAuthority {
    async fn validate(&self, request: &ValidateRequest) -> LicenseResult<RemoteVerdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(request.clone());
        let script = self.script.lock().unwrap().clone();
        match script {
            Script::Verdict(v) => Ok(v),
            Script::Unreachable => Err(LicenseError::Network("connection refused".into())),
            Script::Status(status) => Err(LicenseError::Server {
                status,
                message: "boom".into(),
            }),
        }
    }
}

pub fn verdict(valid: bool, status: &str, expiration: Option<&str>) -> RemoteVerdict {
    RemoteVerdict {
        valid,
        status: status.to_string(),
        expiration: expiration.map(String::from),
        message: None,
        error: None,
    }
}

/// Builds a verifier for `device_id` sharing `store` and `clock`.
pub fn verifier(
    store: &LocalLicenseStore,
    authority: Arc<FakeAuthority>,
    clock: &Arc<MockClock>,
    device_id: &str,
) -> LicenseVerifier {
    LicenseVerifier::new(store.clone(), authority, &config(), DeviceInfo::new(device_id))
        .with_clock(clock.clone())
}
