//! Hardware fingerprinting for license binding and trial tracking.
//!
//! The hardware id is the first 16 hex characters of
//! `SHA-256("{host}-{node}")`, where `host` is the machine hostname and
//! `node` is a 48-bit number derived from the MAC address of the first
//! hardware-backed network adapter (or, where none is readable, from the
//! platform machine id). Reading identifiers never fails the caller: if
//! either component is unavailable the constant [`FALLBACK_HARDWARE_ID`]
//! is returned instead.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Returned when the machine cannot be fingerprinted.
///
/// Contains non-hex characters, so it can never collide with a real id.
pub const FALLBACK_HARDWARE_ID: &str = "HWID-UNAVAILABLE";

const HARDWARE_ID_LEN: usize = 16;

/// The device a verification request is made from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Stable device identifier, normally [`hardware_id`].
    pub device_id: String,
    /// Client address, forwarded to the authority when known.
    pub ip_address: Option<String>,
}

impl DeviceInfo {
    /// Describes a device by id.
    #[must_use]
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ip_address: None,
        }
    }

    /// Describes the current machine.
    #[must_use]
    pub fn current() -> Self {
        Self::new(hardware_id())
    }

    /// Attaches the client address.
    #[must_use]
    pub fn with_ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }
}

/// Returns the hardware id of the current machine.
///
/// Deterministic across calls and process restarts on the same machine.
#[must_use]
pub fn hardware_id() -> String {
    derive_hardware_id(get_hostname().as_deref(), get_adapter_node())
}

/// Derives a hardware id from its components.
#[must_use]
pub fn derive_hardware_id(host: Option<&str>, node: Option<u64>) -> String {
    let (Some(host), Some(node)) = (host.filter(|h| !h.is_empty()), node) else {
        return FALLBACK_HARDWARE_ID.to_string();
    };

    let digest = Sha256::digest(format!("{host}-{node}").as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(HARDWARE_ID_LEN);
    id
}

/// Gets the machine hostname.
fn get_hostname() -> Option<String> {
    hostname::get().ok().and_then(|h| h.into_string().ok())
}

/// Gets a 48-bit node number for this machine.
fn get_adapter_node() -> Option<u64> {
    get_mac_node().or_else(|| get_machine_id().map(|id| node_from_bytes(&Sha256::digest(id.as_bytes()))))
}

/// Folds the first six bytes into a 48-bit number.
fn node_from_bytes(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .take(6)
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

/// Parses `aa:bb:cc:dd:ee:ff` into a node number, rejecting the all-zero
/// address.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_mac(mac: &str) -> Option<u64> {
    let bytes: Vec<u8> = mac
        .trim()
        .split(':')
        .map(|part| u8::from_str_radix(part, 16).ok())
        .collect::<Option<_>>()?;
    if bytes.len() != 6 || bytes.iter().all(|b| *b == 0) {
        return None;
    }
    Some(node_from_bytes(&bytes))
}

/// Picks the node of the first hardware-backed adapter, by interface name.
///
/// Each entry is `(name, has_device, mac)`. Virtual interfaces (bridges,
/// veth pairs, tunnels) have no backing device and often get a fresh MAC
/// on every start, so they are skipped.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn select_adapter_node(adapters: impl IntoIterator<Item = (String, bool, String)>) -> Option<u64> {
    let mut physical: Vec<(String, String)> = adapters
        .into_iter()
        .filter(|(name, has_device, _)| *has_device && name != "lo")
        .map(|(name, _, mac)| (name, mac))
        .collect();
    physical.sort();
    physical.iter().find_map(|(_, mac)| parse_mac(mac))
}

/// Reads the MAC of the first physical network adapter.
fn get_mac_node() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let adapters = std::fs::read_dir("/sys/class/net")
            .ok()?
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let path = entry.path();
                let name = entry.file_name().into_string().ok()?;
                let mac = std::fs::read_to_string(path.join("address")).ok()?;
                Some((name, path.join("device").exists(), mac))
            });
        select_adapter_node(adapters)
    }

    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Gets the machine ID (platform-specific unique identifier).
fn get_machine_id() -> Option<String> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .find(|l| l.contains("IOPlatformUUID"))
                    .and_then(|l| l.split('"').nth(3))
                    .map(String::from)
            })
    }

    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/machine-id")
            .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("reg")
            .args([
                "query",
                r"HKLM\SOFTWARE\Microsoft\Cryptography",
                "/v",
                "MachineGuid",
            ])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .find(|l| l.contains("MachineGuid"))
                    .and_then(|l| l.split_whitespace().last())
                    .map(String::from)
            })
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        None
    }
}
