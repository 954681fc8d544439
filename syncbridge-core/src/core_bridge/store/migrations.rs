//! Database migrations for the SQLite record store
//!
//! Provides versioned migrations for the record and sync metadata schema.
//! Each migration is applied atomically and tracked in the schema_version table.

use rusqlite::{params, Connection};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Current schema version for the record store
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Migration descriptor
pub struct Migration {
    pub version: i32,
    pub description: &'static str,
    pub up_sql: &'static str,
}

/// All available migrations in order
pub fn get_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial records schema",
            up_sql: r#"
                -- Credentials; id is the primary key handed to the sync bridge
                CREATE TABLE IF NOT EXISTS records (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    origin_url TEXT NOT NULL,
                    action_url TEXT NOT NULL DEFAULT '',
                    username_element TEXT NOT NULL,
                    username_value TEXT NOT NULL,
                    password_element TEXT NOT NULL,
                    password_value TEXT NOT NULL DEFAULT '',
                    signon_realm TEXT NOT NULL,
                    scheme INTEGER NOT NULL DEFAULT 0,
                    preferred INTEGER NOT NULL DEFAULT 0,
                    blacklisted_by_user INTEGER NOT NULL DEFAULT 0,
                    times_used INTEGER NOT NULL DEFAULT 0,
                    date_created INTEGER NOT NULL DEFAULT 0,
                    display_name TEXT NOT NULL DEFAULT '',
                    icon_url TEXT NOT NULL DEFAULT '',
                    UNIQUE (origin_url, username_element, username_value,
                            password_element, signon_realm)
                );

                CREATE INDEX IF NOT EXISTS idx_records_realm ON records(signon_realm);
            "#,
        },
        Migration {
            version: 2,
            description: "Sync metadata tables",
            up_sql: r#"
                -- Opaque per-record bookkeeping, keyed by storage key
                CREATE TABLE IF NOT EXISTS sync_entity_metadata (
                    storage_key TEXT PRIMARY KEY,
                    metadata BLOB NOT NULL
                );

                -- Single-row global model state
                CREATE TABLE IF NOT EXISTS sync_model_state (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    state BLOB NOT NULL
                );
            "#,
        },
    ]
}

/// Get current schema version from database
pub fn get_current_version(conn: &Connection) -> Result<i32, rusqlite::Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let version: Result<i32, _> = conn.query_row(
        "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
        [],
        |row| row.get(0),
    );

    Ok(version.unwrap_or(0))
}

/// Run all pending migrations
pub fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    let current_version = get_current_version(conn)?;

    let pending: Vec<_> =
        get_migrations().into_iter().filter(|m| m.version > current_version).collect();

    for migration in pending {
        let tx = conn.unchecked_transaction()?;

        tx.execute_batch(migration.up_sql)?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        tx.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?, ?)",
            params![migration.version, now],
        )?;

        tx.commit()?;

        info!(version = migration.version, description = migration.description, "applied migration");
    }

    Ok(())
}

/// Get the latest migration version available
pub fn get_latest_version() -> i32 {
    get_migrations().iter().map(|m| m.version).max().unwrap_or(0)
}
