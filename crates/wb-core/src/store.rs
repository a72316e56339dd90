//! SQLite database shared by the settings store and the membership ledger.

use std::{path::Path, sync::Mutex};

use rusqlite::Connection;
use tracing::{info, warn};

use crate::Result;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        migrate(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` with exclusive access to the connection.
    ///
    /// Calls are short and synchronous; never hold the connection across an `.await`.
    /// A lock poisoned by a panicking caller is recovered.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("Database lock was poisoned; reusing the connection");
            poisoned.into_inner()
        });
        f(&conn)
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS joined_users (
            user_id INTEGER,
            chat_id INTEGER,
            join_timestamp TEXT,
            username TEXT,
            full_name TEXT,
            is_bot INTEGER DEFAULT 0,
            PRIMARY KEY (user_id, chat_id, join_timestamp)
        );
        ",
    )?;

    // Databases created before bots were tracked lack the flag.
    if !has_column(conn, "joined_users", "is_bot")? {
        info!("Adding is_bot column to joined_users");
        conn.execute_batch("ALTER TABLE joined_users ADD COLUMN is_bot INTEGER DEFAULT 0;")?;
    }

    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_joined_users_chat_time
            ON joined_users (chat_id, join_timestamp);

        CREATE TABLE IF NOT EXISTS chat_settings (
            chat_id INTEGER PRIMARY KEY,
            welcome_template TEXT
        );
        ",
    )?;
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|n| n == column))
}
