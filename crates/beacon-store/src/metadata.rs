//! Durable key/value state — identity and session fields that must
//! survive process restart.
//!
//! Strings and integers live in separate tables so numeric state
//! (`sequence_number`, `last_event_time`, `previous_session_id`) never
//! round-trips through text.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;

/// Well-known keys.
pub mod keys {
    /// Device identifier.
    pub const DEVICE_ID: &str = "device_id";
    /// User identifier.
    pub const USER_ID: &str = "user_id";
    /// Opt-out flag (long: 0/1).
    pub const OPT_OUT: &str = "opt_out";
    /// Last assigned sequence number (long).
    pub const SEQUENCE_NUMBER: &str = "sequence_number";
    /// Session id active when the process last ran (long).
    pub const PREVIOUS_SESSION_ID: &str = "previous_session_id";
    /// Timestamp of the last in-session event (long).
    pub const LAST_EVENT_TIME: &str = "last_event_time";
}

/// Repository for the `metadata` / `metadata_long` tables.
pub struct MetadataStore;

impl MetadataStore {
    /// Get a string value.
    pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
        let value = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Insert or overwrite a string value.
    pub fn put(conn: &Connection, key: &str, value: &str) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO metadata (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a string value.
    pub fn delete(conn: &Connection, key: &str) -> Result<()> {
        let _ = conn.execute("DELETE FROM metadata WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Get an integer value.
    pub fn get_long(conn: &Connection, key: &str) -> Result<Option<i64>> {
        let value = conn
            .query_row(
                "SELECT value FROM metadata_long WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Insert or overwrite an integer value.
    pub fn put_long(conn: &Connection, key: &str, value: i64) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO metadata_long (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove an integer value.
    pub fn delete_long(conn: &Connection, key: &str) -> Result<()> {
        let _ = conn.execute("DELETE FROM metadata_long WHERE key = ?1", params![key])?;
        Ok(())
    }
}
