//! SQLite connection pooling.
//!
//! WAL journaling plus a busy timeout lets the producer path append while
//! the uploader reads or deletes on another connection without either side
//! seeing `SQLITE_BUSY` under normal interleaving.

use std::path::Path;
use std::time::Duration;

use r2d2_sqlite::SqliteConnectionManager;

use crate::errors::Result;

/// Pool of SQLite connections.
pub type ConnectionPool = r2d2::Pool<SqliteConnectionManager>;
/// One pooled connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Pool tuning knobs.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Maximum pooled connections.
    pub max_size: u32,
    /// How long `get()` waits for a free connection.
    pub connection_timeout: Duration,
    /// SQLite busy timeout per connection.
    pub busy_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_size: 4,
            connection_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

fn build_pool(manager: SqliteConnectionManager, config: &ConnectionConfig) -> Result<ConnectionPool> {
    let busy_ms = config.busy_timeout.as_millis() as u64;
    let manager = manager.with_init(move |conn| {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = {busy_ms};"
        ))
    });
    let pool = r2d2::Pool::builder()
        .max_size(config.max_size)
        .connection_timeout(config.connection_timeout)
        .build(manager)?;
    Ok(pool)
}

/// Open (or create) a file-backed database.
pub fn new_file(path: impl AsRef<Path>, config: &ConnectionConfig) -> Result<ConnectionPool> {
    build_pool(SqliteConnectionManager::file(path), config)
}

/// Open a shared in-memory database, for tests.
///
/// Uses a shared-cache URI so every pooled connection sees the same data.
pub fn new_in_memory(config: &ConnectionConfig) -> Result<ConnectionPool> {
    use rusqlite::OpenFlags;
    // A unique name per pool keeps parallel tests isolated.
    static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let uri = format!("file:beacon_mem_{n}?mode=memory&cache=shared");
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    build_pool(
        SqliteConnectionManager::file(uri).with_flags(flags),
        config,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_pool_shares_data_across_connections() {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        {
            let conn = pool.get().unwrap();
            conn.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (7);")
                .unwrap();
        }
        let conn = pool.get().unwrap();
        let x: i64 = conn
            .query_row("SELECT x FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(x, 7);
    }

    #[test]
    fn separate_in_memory_pools_are_isolated() {
        let a = new_in_memory(&ConnectionConfig::default()).unwrap();
        let b = new_in_memory(&ConnectionConfig::default()).unwrap();
        a.get()
            .unwrap()
            .execute_batch("CREATE TABLE only_a (x INTEGER);")
            .unwrap();
        let err = b
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM only_a", [], |row| row.get::<_, i64>(0));
        assert!(err.is_err());
    }
}
