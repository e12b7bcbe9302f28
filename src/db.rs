//! Local SQLite database layer for the counter.
//!
//! Uses rusqlite with WAL mode. The customer collection is kept as a single
//! JSON document in the `local_settings` key/value table (category `local`,
//! key `customer-storage`) and rewritten whole on every save.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::customers::{CustomerPersistence, CustomerRecord};
use crate::error::StoreError;

/// Database connection shared by the customer store.
pub struct DbState {
    pub conn: Mutex<Connection>,
}

const LOCAL_CATEGORY: &str = "local";
const CUSTOMER_STORAGE_KEY: &str = "customer-storage";

type Migration = fn(&Connection) -> Result<(), StoreError>;

/// Schema migrations in version order. Append, never edit.
const MIGRATIONS: &[(i32, Migration)] = &[(1, migrate_v1 as Migration)];

/// Open (or create) the counter database at `db_path` and bring its schema
/// up to date. A file that cannot be opened is removed with its WAL/SHM
/// side files and recreated empty.
pub fn init(db_path: &Path) -> Result<DbState, StoreError> {
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let conn = open_and_configure(db_path).or_else(|first_err| {
        warn!(
            path = %db_path.display(),
            error = %first_err,
            "Counter database unusable, recreating it"
        );
        remove_database_files(db_path);
        open_and_configure(db_path)
    })?;

    let version = run_migrations(&conn)?;
    info!(path = %db_path.display(), schema = version, "Counter database ready");

    Ok(DbState {
        conn: Mutex::new(conn),
    })
}

fn open_and_configure(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(conn)
}

fn remove_database_files(db_path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut name = db_path.as_os_str().to_owned();
        name.push(suffix);
        let path = Path::new(&name);
        if path.exists() {
            if let Err(e) = fs::remove_file(path) {
                error!(path = %path.display(), error = %e, "Could not remove database file");
            }
        }
    }
}

/// Apply every migration newer than the recorded version. Returns the
/// schema version the database is at afterwards.
fn run_migrations(conn: &Connection) -> Result<i32, StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )?;

    let recorded: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    let mut applied = recorded;
    for &(version, migrate) in MIGRATIONS.iter().filter(|(v, _)| *v > recorded) {
        migrate(conn)?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            params![version],
        )?;
        debug!(version, "Applied schema migration");
        applied = version;
    }

    Ok(applied)
}

/// v1: key/value settings table holding the customer document.
fn migrate_v1(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS local_settings (
            id TEXT PRIMARY KEY DEFAULT (lower(hex(randomblob(16)))),
            setting_category TEXT NOT NULL,
            setting_key TEXT NOT NULL,
            setting_value TEXT NOT NULL,
            created_at TEXT DEFAULT (datetime('now')),
            updated_at TEXT DEFAULT (datetime('now')),
            UNIQUE(setting_category, setting_key)
        );",
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Settings helpers
// ---------------------------------------------------------------------------

pub fn get_setting(
    conn: &Connection,
    category: &str,
    key: &str,
) -> Result<Option<String>, StoreError> {
    let value = conn
        .query_row(
            "SELECT setting_value FROM local_settings WHERE setting_category = ?1 AND setting_key = ?2",
            params![category, key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

/// Insert or update a setting.
pub fn set_setting(
    conn: &Connection,
    category: &str,
    key: &str,
    value: &str,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO local_settings (setting_category, setting_key, setting_value, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(setting_category, setting_key) DO UPDATE SET
            setting_value = excluded.setting_value,
            updated_at = excluded.updated_at",
        params![category, key, value],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Customer collection
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct PersistedCustomers {
    customers: Vec<CustomerRecord>,
}

impl CustomerPersistence for DbState {
    fn load(&self) -> Result<Vec<CustomerRecord>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;
        match get_setting(&conn, LOCAL_CATEGORY, CUSTOMER_STORAGE_KEY)? {
            Some(raw) => {
                let persisted: PersistedCustomers = serde_json::from_str(&raw)?;
                Ok(persisted.customers)
            }
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, customers: &[CustomerRecord]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&PersistedCustomers {
            customers: customers.to_vec(),
        })?;
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;
        set_setting(&conn, LOCAL_CATEGORY, CUSTOMER_STORAGE_KEY, &raw)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
