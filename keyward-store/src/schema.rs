use rusqlite::Connection;

/// Creates the store tables if they do not exist yet.
pub(crate) fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS licenses (
            key TEXT PRIMARY KEY,
            email TEXT,
            status TEXT,
            device_id TEXT,
            activation_date TEXT,
            expiration_date TEXT,
            is_temporary INTEGER DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS trials (
            hardware_id TEXT PRIMARY KEY,
            email TEXT,
            start_time TEXT,
            end_time TEXT,
            used INTEGER DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS blocked_hardware (
            hardware_id TEXT PRIMARY KEY
        );

        -- Monotonic per-device activation counter; survives trial upserts
        CREATE TABLE IF NOT EXISTS trial_attempts (
            hardware_id TEXT PRIMARY KEY,
            attempts INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )
}
