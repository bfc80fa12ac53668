use keyward_license::{
    default_database_path, ErrorKind, KeywardConfig, LicenseError, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_TRIAL_DAYS, FRAUD_THRESHOLD,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

#[test]
fn fixed_constants() {
    assert_eq!(FRAUD_THRESHOLD, 2);
    assert_eq!(DEFAULT_TRIAL_DAYS, 1);
    assert_eq!(DEFAULT_REQUEST_TIMEOUT_SECS, 5);
}

#[test]
fn defaults() {
    let config = KeywardConfig::default();
    assert!(config.secret_key.is_empty());
    assert_eq!(config.server_url, "http://127.0.0.1:8000");
    assert_eq!(config.app_name, "keyward");
    assert_eq!(config.database_path, default_database_path());
    assert_eq!(config.request_timeout(), Duration::from_secs(5));
}

#[test]
fn reads_variables() {
    let config = KeywardConfig::from_lookup(lookup(&[
        ("KEYWARD_SECRET_KEY", "s3cret"),
        ("KEYWARD_SERVER_URL", "https://licenses.example.com"),
        ("KEYWARD_APP_NAME", "poker-pro"),
        ("KEYWARD_DB_PATH", "/var/lib/keyward/l.db"),
    ]));

    assert_eq!(config.require_secret().unwrap().expose(), b"s3cret");
    assert_eq!(config.server_url, "https://licenses.example.com");
    assert_eq!(config.app_name, "poker-pro");
    assert_eq!(config.database_path, PathBuf::from("/var/lib/keyward/l.db"));
}

#[test]
fn empty_variables_keep_defaults() {
    let config = KeywardConfig::from_lookup(lookup(&[
        ("KEYWARD_SECRET_KEY", ""),
        ("KEYWARD_APP_NAME", ""),
    ]));
    assert!(config.secret_key.is_empty());
    assert_eq!(config.app_name, "keyward");
}

#[test]
fn missing_secret_is_config_error() {
    let err = KeywardConfig::default().require_secret().unwrap_err();
    assert!(matches!(err, LicenseError::Config(_)));
    assert!(err.to_string().contains("KEYWARD_SECRET_KEY"));
    assert_eq!(err.kind(), ErrorKind::ServerError);
}

#[test]
fn debug_output_redacts_secret() {
    let config = KeywardConfig::from_lookup(lookup(&[("KEYWARD_SECRET_KEY", "hunter2-hunter2")]));
    let debug = format!("{config:?}");
    assert!(!debug.contains("hunter2"));
    assert!(debug.contains("[redacted]"));
}

#[test]
fn deserializes_with_defaults() {
    let config: KeywardConfig =
        serde_json::from_str(r#"{ "secret_key": "abc", "request_timeout_secs": 2 }"#).unwrap();
    assert_eq!(config.require_secret().unwrap().expose(), b"abc");
    assert_eq!(config.request_timeout(), Duration::from_secs(2));
    assert_eq!(config.app_name, "keyward");
}
