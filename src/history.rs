//! Install history, used to order packages by how recently they were installed

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, error, info};

use crate::error::HistoryError;

/// Layout written by [`InstallHistory::open`], stored in `user_version`
const SCHEMA_VERSION: i32 = 1;

/// Notified when packages are added to or removed from the host project
pub trait InstallObserver: Send + Sync {
    fn on_package_added(&self, package_name: &str);
    fn on_package_removed(&self, package_name: &str);
}

/// Relative install ordering: larger values were installed more recently
pub trait InstallOrdering {
    fn install_order(&self, package_name: &str) -> Option<i64>;
}

impl InstallOrdering for HashMap<String, i64> {
    fn install_order(&self, package_name: &str) -> Option<i64> {
        self.get(package_name).copied()
    }
}

pub struct InstallHistory {
    conn: Mutex<Connection>,
}

impl InstallHistory {
    pub fn open(db_path: &Path) -> Result<Self, HistoryError> {
        info!("Opening install history at {:?}", db_path);

        let conn = Connection::open(db_path)?;

        // Enable WAL mode for better concurrency
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let history = Self {
            conn: Mutex::new(conn),
        };
        history.create_schema()?;

        Ok(history)
    }

    /// Acquire database connection lock with proper error handling
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, HistoryError> {
        self.conn.lock().map_err(|_| HistoryError::LockPoisoned)
    }

    /// Create the table on first open and refuse databases written by a newer layout
    fn create_schema(&self) -> Result<(), HistoryError> {
        let conn = self.lock_conn()?;

        let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            return Err(HistoryError::UnsupportedSchema {
                found: version,
                supported: SCHEMA_VERSION,
            });
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS install_history (
                package_name TEXT PRIMARY KEY,
                installed_at INTEGER NOT NULL,
                removed_at INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_installed_at ON install_history(installed_at);
            "#,
        )?;

        if version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            debug!("Created install history schema v{}", SCHEMA_VERSION);
        }
        Ok(())
    }

    /// Record an install and return its timestamp.
    ///
    /// Timestamps are milliseconds since the epoch, bumped when needed so each
    /// install sorts strictly after every earlier one.
    pub fn record_install(&self, package_name: &str) -> Result<i64, HistoryError> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let latest: i64 = tx.query_row(
            "SELECT COALESCE(MAX(installed_at), 0) FROM install_history",
            [],
            |row| row.get(0),
        )?;
        let timestamp = chrono::Utc::now().timestamp_millis().max(latest + 1);

        tx.execute(
            r#"
            INSERT INTO install_history (package_name, installed_at, removed_at)
            VALUES (?1, ?2, NULL)
            ON CONFLICT(package_name) DO UPDATE SET
                installed_at = excluded.installed_at,
                removed_at = NULL
            "#,
            (package_name, timestamp),
        )?;
        tx.commit()?;

        debug!("Recorded install of {} at {}", package_name, timestamp);
        Ok(timestamp)
    }

    /// Mark a package as removed. Its install ordering is kept.
    pub fn record_removal(&self, package_name: &str) -> Result<(), HistoryError> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE install_history SET removed_at = ?2 WHERE package_name = ?1",
            (package_name, chrono::Utc::now().timestamp_millis()),
        )?;
        debug!("Recorded removal of {}", package_name);
        Ok(())
    }

    pub fn install_timestamp(&self, package_name: &str) -> Result<Option<i64>, HistoryError> {
        let conn = self.lock_conn()?;
        let timestamp = conn
            .query_row(
                "SELECT installed_at FROM install_history WHERE package_name = ?1",
                [package_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(timestamp)
    }

    /// Whether the package was ever installed and has not been removed since
    pub fn is_installed(&self, package_name: &str) -> Result<bool, HistoryError> {
        let conn = self.lock_conn()?;
        let removed_at: Option<Option<i64>> = conn
            .query_row(
                "SELECT removed_at FROM install_history WHERE package_name = ?1",
                [package_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(matches!(removed_at, Some(None)))
    }

    /// Every recorded install timestamp, for sorting many packages at once
    pub fn install_orders(&self) -> Result<HashMap<String, i64>, HistoryError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT package_name, installed_at FROM install_history")?;

        let orders = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<HashMap<String, i64>, _>>()?;

        Ok(orders)
    }
}

impl InstallOrdering for InstallHistory {
    fn install_order(&self, package_name: &str) -> Option<i64> {
        self.install_timestamp(package_name)
            .inspect_err(|e| error!("Failed to read install history for {}: {}", package_name, e))
            .ok()
            .flatten()
    }
}

impl InstallObserver for InstallHistory {
    fn on_package_added(&self, package_name: &str) {
        let _ = self
            .record_install(package_name)
            .inspect_err(|e| error!("Failed to record install of {}: {}", package_name, e));
    }

    fn on_package_removed(&self, package_name: &str) {
        let _ = self
            .record_removal(package_name)
            .inspect_err(|e| error!("Failed to record removal of {}: {}", package_name, e));
    }
}
