//! The durable event queue — a FIFO over the `events` table.
//!
//! `rowid` is the `eventId`: unique, monotonically increasing with
//! insertion order (AUTOINCREMENT, never reused), and distinct from the
//! event's own `sequence_number`. The two coincide in a healthy database
//! but are kept separate so storage-level ordering never depends on the
//! agent's counter surviving intact.
//!
//! Stateless repository: every method takes `&Connection`. The agent's
//! producer path appends; the uploader peeks a page and deletes exactly
//! the range it peeked (`delete_up_to` is bound to the id captured at peek
//! time, never a re-queried count), so appends racing a flush are never
//! deleted by it.

use beacon_core::event::Event;
use rusqlite::{Connection, params};
use tracing::warn;

use crate::errors::Result;

/// Repository for the `events` table.
pub struct EventQueue;

impl EventQueue {
    /// Append an event, returning its storage id.
    pub fn append(conn: &Connection, event: &Event) -> Result<i64> {
        let json = serde_json::to_string(event)?;
        let _ = conn.execute("INSERT INTO events (event) VALUES (?1)", params![json])?;
        Ok(conn.last_insert_rowid())
    }

    /// Read the oldest `limit` events, oldest first, without removing them.
    ///
    /// Rows whose JSON no longer parses are deleted and skipped — a corrupt
    /// row must not wedge the queue — so the page may be shorter than
    /// `limit` even when more rows exist.
    pub fn peek_page(conn: &Connection, limit: usize) -> Result<Vec<(i64, Event)>> {
        let mut stmt =
            conn.prepare("SELECT id, event FROM events ORDER BY id ASC LIMIT ?1")?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut page = Vec::with_capacity(rows.len());
        for (id, json) in rows {
            match serde_json::from_str::<Event>(&json) {
                Ok(event) => page.push((id, event)),
                Err(e) => {
                    warn!(event_id = id, error = %e, "corrupt event row removed from queue");
                    let _ = conn.execute("DELETE FROM events WHERE id = ?1", params![id])?;
                }
            }
        }
        Ok(page)
    }

    /// Delete every event with id ≤ `max_id`. Idempotent.
    ///
    /// Returns the number of rows removed.
    pub fn delete_up_to(conn: &Connection, max_id: i64) -> Result<usize> {
        let removed = conn.execute("DELETE FROM events WHERE id <= ?1", params![max_id])?;
        Ok(removed)
    }

    /// Number of queued events.
    pub fn count(conn: &Connection) -> Result<usize> {
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Evict oldest events once the queue exceeds `max_count`.
    ///
    /// Removes the overflow plus `remove_batch` extra slack so sustained
    /// producers don't evict one row per append. Lossy by design: bounded
    /// local storage wins over completeness. Returns the number evicted.
    pub fn trim_to_capacity(
        conn: &Connection,
        max_count: usize,
        remove_batch: usize,
    ) -> Result<usize> {
        let count = Self::count(conn)?;
        if count <= max_count {
            return Ok(0);
        }
        let excess = count - max_count + remove_batch;
        let evicted = conn.execute(
            "DELETE FROM events WHERE id IN
                 (SELECT id FROM events ORDER BY id ASC LIMIT ?1)",
            params![excess as i64],
        )?;
        warn!(
            evicted,
            max_count, "event queue over capacity, oldest events evicted"
        );
        Ok(evicted)
    }
}
