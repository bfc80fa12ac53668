//! Request signing for the remote license authority.
//!
//! A signature is `hex(HMAC-SHA256(secret, license_key || device_id ||
//! app_name || timestamp))`. The authority holds the same secret and
//! recomputes the MAC over the same four fields.

use crate::config::SecretKey;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn mac_over(
    license_key: &str,
    device_id: &str,
    app_name: &str,
    secret_key: &SecretKey,
    timestamp: &str,
) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret_key.expose()).expect("HMAC can take key of any size");
    mac.update(license_key.as_bytes());
    mac.update(device_id.as_bytes());
    mac.update(app_name.as_bytes());
    mac.update(timestamp.as_bytes());
    mac
}

/// Signs a validation request.
#[must_use]
pub fn sign(
    license_key: &str,
    device_id: &str,
    app_name: &str,
    secret_key: &SecretKey,
    timestamp: &str,
) -> String {
    hex::encode(mac_over(license_key, device_id, app_name, secret_key, timestamp).finalize().into_bytes())
}

/// Checks a hex signature in constant time.
#[must_use]
pub fn verify_signature(
    license_key: &str,
    device_id: &str,
    app_name: &str,
    secret_key: &SecretKey,
    timestamp: &str,
    signature: &str,
) -> bool {
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    mac_over(license_key, device_id, app_name, secret_key, timestamp)
        .verify_slice(&expected)
        .is_ok()
}
