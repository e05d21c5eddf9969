//! r2d2 pool construction for [`SqliteStore`](crate::SqliteStore).
//!
//! Every pooled connection enforces foreign keys (room membership and
//! messages reference users and rooms) and waits `busy_timeout_ms` on a
//! locked database. File databases run in WAL mode so REST writes do not
//! block readers on other pooled connections.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::errors::Result;
use crate::store::IN_MEMORY;

/// Pool of store connections.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Pool tuning.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Maximum pooled connections for a file database (default: 4).
    pub pool_size: u32,
    /// How long a statement waits on a locked database (default: 5000).
    pub busy_timeout_ms: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            busy_timeout_ms: 5_000,
        }
    }
}

fn init(conn: &mut Connection, busy_timeout: Duration, wal: bool) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    if wal {
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    }
    Ok(())
}

/// Build the pool for `path`.
///
/// [`IN_MEMORY`] gets a single connection that is never recycled, since
/// each in-memory connection is a separate database.
pub(crate) fn open_pool(path: &str, config: &ConnectionConfig) -> Result<ConnectionPool> {
    let busy_timeout = Duration::from_millis(u64::from(config.busy_timeout_ms));
    let in_memory = path == IN_MEMORY;
    let manager = if in_memory {
        SqliteConnectionManager::memory()
    } else {
        SqliteConnectionManager::file(path)
    }
    .with_init(move |conn| init(conn, busy_timeout, !in_memory));

    let builder = Pool::builder().connection_timeout(Duration::from_secs(5));
    let builder = if in_memory {
        builder.max_size(1).max_lifetime(None).idle_timeout(None)
    } else {
        builder.max_size(config.pool_size)
    };
    Ok(builder.build(manager)?)
}
