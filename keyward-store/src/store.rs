use crate::error::{StoreError, StoreResult};
use crate::schema::init_schema;
use chrono::{DateTime, Datelike, TimeDelta, Utc};
use keyward_types::{format_timestamp, parse_timestamp, License, LicenseState, TrialRecord};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// How long a writer waits on another process's lock before giving up.
const BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Outcome of an atomic trial start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrialStart {
    /// A new trial row was written.
    Started(TrialRecord),
    /// An unexpired trial already exists; nothing was written.
    AlreadyActive(TrialRecord),
    /// The hardware id is on the blocklist; nothing was written.
    Blocked,
}

/// Persistent license store backed by SQLite.
///
/// Cloning is cheap and shares the underlying connection.
#[derive(Clone)]
pub struct LocalLicenseStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for LocalLicenseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalLicenseStore").finish_non_exhaustive()
    }
}

impl LocalLicenseStore {
    /// Opens (or creates) a store at the given path.
    ///
    /// Missing parent directories are created. Schema creation is
    /// idempotent, so reopening an existing database is safe.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        debug!(path = %path.display(), "opened license store");
        Self::with_connection(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    // ── Licenses ─────────────────────────────────────────────────

    /// Looks up a license by key.
    pub fn get_license(&self, key: &str) -> StoreResult<Option<License>> {
        let conn = self.lock()?;
        let license = conn
            .query_row(
                "SELECT key, email, status, device_id, activation_date, expiration_date, is_temporary
                 FROM licenses WHERE key = ?1",
                params![key],
                license_from_row,
            )
            .optional()?;
        Ok(license)
    }

    /// Provisions a new license row.
    pub fn insert_license(&self, license: &License) -> StoreResult<()> {
        let conn = self.lock()?;
        let result = conn.execute(
            "INSERT INTO licenses (key, email, status, device_id, activation_date, expiration_date, is_temporary)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                license.key,
                license.email,
                license.status,
                license.device_id,
                license.activation_date.map(format_timestamp),
                license.expiration_date.map(format_timestamp),
                license.is_temporary,
            ],
        );
        match result {
            Ok(_) => {
                info!(key = %license.key, "provisioned license");
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::AlreadyExists(license.key.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Binds an unbound license to `device_id`.
    ///
    /// Returns false if the license does not exist or is already bound;
    /// an existing binding is never overwritten here.
    pub fn bind_device(&self, key: &str, device_id: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE licenses
             SET device_id = ?2, activation_date = ?3, status = ?4
             WHERE key = ?1 AND (device_id IS NULL OR device_id = '')",
            params![
                key,
                device_id,
                format_timestamp(now),
                LicenseState::DeviceBound.as_str(),
            ],
        )?;
        if changed > 0 {
            info!(key, device_id, "bound license to device");
        }
        Ok(changed > 0)
    }

    /// Administrative reset: clears the device binding so the next
    /// successful verification may bind a new device.
    ///
    /// A bound license returns to `available`; any other status label
    /// (for example `blocked`) is left untouched.
    pub fn reset_device(&self, key: &str) -> StoreResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE licenses
             SET device_id = NULL,
                 activation_date = NULL,
                 status = CASE WHEN status IN ('device_bound', 'vinculado') THEN ?2 ELSE status END
             WHERE key = ?1",
            params![key, LicenseState::Available.as_str()],
        )?;
        if changed > 0 {
            info!(key, "reset license device binding");
        }
        Ok(changed > 0)
    }

    /// Administrative status change.
    pub fn set_license_status(&self, key: &str, state: LicenseState) -> StoreResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE licenses SET status = ?2 WHERE key = ?1",
            params![key, state.as_str()],
        )?;
        Ok(changed > 0)
    }

    // ── Trials ───────────────────────────────────────────────────

    /// Returns the trial row for a hardware id, if any.
    pub fn get_trial(&self, hardware_id: &str) -> StoreResult<Option<TrialRecord>> {
        let conn = self.lock()?;
        Ok(read_trial(&conn, hardware_id)?)
    }

    /// Writes (or overwrites) the trial row and bumps the attempt counter
    /// in a single transaction.
    ///
    /// No eligibility checks are made; see [`Self::begin_trial`].
    pub fn upsert_trial(
        &self,
        hardware_id: &str,
        email: &str,
        trial_days: u32,
        now: DateTime<Utc>,
    ) -> StoreResult<TrialRecord> {
        let end_time = trial_end(now, trial_days)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let record = write_trial(&tx, hardware_id, email, now, end_time)?;
        tx.commit()?;
        Ok(record)
    }

    /// Starts a trial if the hardware id is neither blocked nor already
    /// holding an unexpired trial.
    ///
    /// The checks and the write share one `IMMEDIATE` transaction, so a
    /// second concurrent caller sees the first caller's committed row.
    pub fn begin_trial(
        &self,
        hardware_id: &str,
        email: &str,
        trial_days: u32,
        now: DateTime<Utc>,
    ) -> StoreResult<TrialStart> {
        let end_time = trial_end(now, trial_days)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if read_blocked(&tx, hardware_id)? {
            return Ok(TrialStart::Blocked);
        }
        if let Some(existing) = read_trial(&tx, hardware_id)? {
            if existing.is_active_at(now) {
                return Ok(TrialStart::AlreadyActive(existing));
            }
        }

        let record = write_trial(&tx, hardware_id, email, now, end_time)?;
        tx.commit()?;
        Ok(TrialStart::Started(record))
    }

    /// Total number of trial activations ever recorded for a hardware id.
    pub fn count_trials(&self, hardware_id: &str) -> StoreResult<u32> {
        let conn = self.lock()?;
        let attempts: Option<u32> = conn
            .query_row(
                "SELECT attempts FROM trial_attempts WHERE hardware_id = ?1",
                params![hardware_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(attempts.unwrap_or(0))
    }

    // ── Blocklist ────────────────────────────────────────────────

    /// Returns true if the hardware id is blocked.
    pub fn is_blocked(&self, hardware_id: &str) -> StoreResult<bool> {
        let conn = self.lock()?;
        Ok(read_blocked(&conn, hardware_id)?)
    }

    /// Adds a hardware id to the blocklist. Idempotent; returns true only
    /// when the entry is new. There is no corresponding removal.
    pub fn block(&self, hardware_id: &str) -> StoreResult<bool> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO blocked_hardware (hardware_id) VALUES (?1)",
            params![hardware_id],
        )?;
        if inserted > 0 {
            info!(hardware_id, "blocked hardware");
        }
        Ok(inserted > 0)
    }
}

fn read_blocked(conn: &Connection, hardware_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM blocked_hardware WHERE hardware_id = ?1)",
        params![hardware_id],
        |row| row.get(0),
    )
}

fn read_trial(conn: &Connection, hardware_id: &str) -> rusqlite::Result<Option<TrialRecord>> {
    conn.query_row(
        "SELECT hardware_id, email, start_time, end_time, used FROM trials WHERE hardware_id = ?1",
        params![hardware_id],
        trial_from_row,
    )
    .optional()
}

/// End of a `trial_days`-long trial starting at `now`.
///
/// The end must stay within four-digit years so it round-trips through
/// the RFC 3339 column.
fn trial_end(now: DateTime<Utc>, trial_days: u32) -> StoreResult<DateTime<Utc>> {
    TimeDelta::try_days(i64::from(trial_days))
        .and_then(|length| now.checked_add_signed(length))
        .filter(|end| end.year() <= 9999)
        .ok_or(StoreError::InvalidTrialLength(trial_days))
}

fn write_trial(
    conn: &Connection,
    hardware_id: &str,
    email: &str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> rusqlite::Result<TrialRecord> {
    let record = TrialRecord {
        hardware_id: hardware_id.to_string(),
        email: email.to_string(),
        start_time,
        end_time,
        used: true,
    };

    conn.execute(
        "INSERT INTO trials (hardware_id, email, start_time, end_time, used)
         VALUES (?1, ?2, ?3, ?4, 1)
         ON CONFLICT(hardware_id) DO UPDATE SET
             email = excluded.email,
             start_time = excluded.start_time,
             end_time = excluded.end_time,
             used = 1",
        params![
            record.hardware_id,
            record.email,
            format_timestamp(record.start_time),
            format_timestamp(record.end_time),
        ],
    )?;
    conn.execute(
        "INSERT INTO trial_attempts (hardware_id, attempts) VALUES (?1, 1)
         ON CONFLICT(hardware_id) DO UPDATE SET attempts = attempts + 1",
        params![hardware_id],
    )?;

    debug!(hardware_id, end = %record.end_time, "wrote trial record");
    Ok(record)
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| {
            parse_timestamp(&s)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
        })
        .transpose()
}

fn required_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    timestamp_column(row, idx)?.ok_or(rusqlite::Error::InvalidColumnType(
        idx,
        "timestamp".to_string(),
        Type::Null,
    ))
}

fn license_from_row(row: &Row<'_>) -> rusqlite::Result<License> {
    let status: Option<String> = row.get(2)?;
    let is_temporary: Option<i64> = row.get(6)?;
    Ok(License {
        key: row.get(0)?,
        email: row.get(1)?,
        status: status.unwrap_or_else(|| LicenseState::Available.as_str().to_string()),
        device_id: row.get(3)?,
        activation_date: timestamp_column(row, 4)?,
        expiration_date: timestamp_column(row, 5)?,
        is_temporary: is_temporary.unwrap_or(0) != 0,
    })
}

fn trial_from_row(row: &Row<'_>) -> rusqlite::Result<TrialRecord> {
    let email: Option<String> = row.get(1)?;
    let used: Option<bool> = row.get(4)?;
    Ok(TrialRecord {
        hardware_id: row.get(0)?,
        email: email.unwrap_or_default(),
        start_time: required_timestamp(row, 2)?,
        end_time: required_timestamp(row, 3)?,
        used: used.unwrap_or(true),
    })
}
