//! Schema creation and versioning.
//!
//! Versioned via `PRAGMA user_version`. Each migration is idempotent DDL;
//! opening a database written by a newer build fails rather than guessing.

use rusqlite::Connection;
use tracing::debug;

use crate::errors::{Result, StoreError};

/// Highest schema version this build understands.
pub const SCHEMA_VERSION: i64 = 1;

/// Run all pending migrations on the given connection.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let found: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if found > SCHEMA_VERSION {
        return Err(StoreError::SchemaTooNew {
            found,
            supported: SCHEMA_VERSION,
        });
    }
    if found < 1 {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS events (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 event TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS metadata (
                 key TEXT PRIMARY KEY NOT NULL,
                 value TEXT
             );
             CREATE TABLE IF NOT EXISTS metadata_long (
                 key TEXT PRIMARY KEY NOT NULL,
                 value INTEGER
             );
             PRAGMA user_version = 1;",
        )?;
        debug!(from = found, to = 1, "schema migrated");
    }
    Ok(())
}
