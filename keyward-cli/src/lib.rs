//! Command handling for the `keyward` binary.
//!
//! Every command prints a single JSON document to the supplied writer so
//! the output can be consumed by a UI or a script.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keyward_license::{
    hardware_id, DeviceInfo, HttpAuthority, KeywardConfig, LicenseVerifier, OfflineAuthority,
    RemoteAuthority, TrialActivation, TrialManager, DEFAULT_TRIAL_DAYS,
};
use keyward_store::LocalLicenseStore;
use keyward_types::{parse_timestamp, License, LicenseState};
use serde::Serialize;
use serde_json::json;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "keyward")]
#[command(about = "Device-bound license and trial management")]
pub struct Args {
    /// Path to the local license database (overrides KEYWARD_DB_PATH)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Remote authority base URL (overrides KEYWARD_SERVER_URL)
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Act on this hardware id instead of the current machine's
    #[arg(long, global = true)]
    pub hardware_id: Option<String>,

    /// Never contact the remote authority
    #[arg(long, global = true)]
    pub offline: bool,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print this machine's hardware id
    Hwid,

    /// Manage the trial for this device
    Trial {
        #[command(subcommand)]
        action: TrialAction,
    },

    /// Verify a license key for this device
    Verify {
        /// License key
        key: String,

        /// Require confirmation from the remote authority
        #[arg(long)]
        strict: bool,

        /// Client address forwarded to the authority
        #[arg(long)]
        ip: Option<String>,
    },

    /// Administer provisioned licenses
    License {
        #[command(subcommand)]
        action: LicenseAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum TrialAction {
    /// Start a trial (runs fraud detection first)
    Activate {
        /// Email to register the trial under
        #[arg(long)]
        email: String,

        /// Trial length in days
        #[arg(long, default_value_t = DEFAULT_TRIAL_DAYS)]
        days: u32,
    },

    /// Show trial standing
    Status,
}

#[derive(Subcommand, Debug)]
pub enum LicenseAction {
    /// Provision a new license
    Add {
        /// License key
        key: String,

        /// Purchaser email
        #[arg(long)]
        email: Option<String>,

        /// Expiration (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        expires: Option<String>,

        /// Mark as a temporary evaluation license
        #[arg(long)]
        temporary: bool,
    },

    /// Show a license row
    Show {
        /// License key
        key: String,
    },

    /// Clear a license's device binding
    Reset {
        /// License key
        key: String,
    },

    /// Administratively block a license
    Block {
        /// License key
        key: String,
    },
}

/// Executes a parsed command, writing its JSON result to `out`.
///
/// Returns false when the command completed but its answer is negative
/// (denied verification, refused trial, unknown license).
pub async fn run(args: Args, out: &mut impl Write) -> Result<bool> {
    let mut config = KeywardConfig::from_env();
    if let Some(db) = args.db {
        config.database_path = db;
    }
    if let Some(server) = args.server {
        config.server_url = server;
    }
    let hw = args.hardware_id.unwrap_or_else(hardware_id);

    match args.command {
        Command::Hwid => {
            print_json(out, &json!({ "hardware_id": hw }))?;
            Ok(true)
        }
        Command::Trial { action } => {
            let manager = TrialManager::new(open_store(&config)?);
            run_trial(&manager, &hw, action, out)
        }
        Command::Verify { key, strict, ip } => {
            let mut device = DeviceInfo::new(hw);
            if let Some(ip) = ip {
                device = device.with_ip_address(ip);
            }
            let authority: Arc<dyn RemoteAuthority> = if args.offline {
                Arc::new(OfflineAuthority)
            } else {
                Arc::new(HttpAuthority::new(&config)?)
            };
            let verifier = LicenseVerifier::new(open_store(&config)?, authority, &config, device);

            let result = verifier.verify(&key, strict).await;
            print_json(out, &result)?;
            Ok(result.valid)
        }
        Command::License { action } => run_license(&open_store(&config)?, action, out),
    }
}

fn run_trial(
    manager: &TrialManager,
    hw: &str,
    action: TrialAction,
    out: &mut impl Write,
) -> Result<bool> {
    match action {
        TrialAction::Activate { email, days } => {
            if manager.detect_fraud(hw) {
                print_json(out, &json!({ "activated": false, "error": "fraud_blocked" }))?;
                return Ok(false);
            }
            match manager.activate_trial(hw, &email, days)? {
                TrialActivation::Activated(record) => {
                    print_json(out, &json!({ "activated": true, "trial": record }))?;
                    Ok(true)
                }
                TrialActivation::Denied(kind) => {
                    print_json(out, &json!({ "activated": false, "error": kind }))?;
                    Ok(false)
                }
            }
        }
        TrialAction::Status => {
            let status = manager.trial_status(hw)?;
            print_json(out, &status)?;
            Ok(status.active)
        }
    }
}

fn run_license(store: &LocalLicenseStore, action: LicenseAction, out: &mut impl Write) -> Result<bool> {
    match action {
        LicenseAction::Add {
            key,
            email,
            expires,
            temporary,
        } => {
            let mut license = License::new(key);
            license.email = email;
            license.is_temporary = temporary;
            if let Some(raw) = expires {
                let expiration =
                    parse_timestamp(&raw).with_context(|| format!("invalid expiration: {raw}"))?;
                license = license.with_expiration(expiration);
            }
            store.insert_license(&license)?;
            print_json(out, &license)?;
            Ok(true)
        }
        LicenseAction::Show { key } => match store.get_license(&key)? {
            Some(license) => {
                print_json(out, &license)?;
                Ok(true)
            }
            None => {
                print_json(out, &json!({ "error": "license_not_found" }))?;
                Ok(false)
            }
        },
        LicenseAction::Reset { key } => {
            let changed = store.reset_device(&key)?;
            info!(key = %key, changed, "device reset requested");
            print_json(out, &json!({ "key": key, "reset": changed }))?;
            Ok(changed)
        }
        LicenseAction::Block { key } => {
            let changed = store.set_license_status(&key, LicenseState::Blocked)?;
            print_json(out, &json!({ "key": key, "blocked": changed }))?;
            Ok(changed)
        }
    }
}

fn open_store(config: &KeywardConfig) -> Result<LocalLicenseStore> {
    LocalLicenseStore::open(&config.database_path).with_context(|| {
        format!(
            "failed to open license store at {}",
            config.database_path.display()
        )
    })
}

fn print_json(out: &mut impl Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
