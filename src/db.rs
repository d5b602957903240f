use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::error::Result;
use crate::models::Mandate;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS mandates (
    id INTEGER PRIMARY KEY,
    external_ref TEXT,
    name TEXT NOT NULL UNIQUE,
    mandate_group TEXT NOT NULL,
    currency TEXT,
    is_active INTEGER DEFAULT 1,
    total_revenue REAL NOT NULL DEFAULT 0,
    last_entry TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS day_values (
    id INTEGER PRIMARY KEY,
    mandate_id INTEGER NOT NULL,
    date TEXT NOT NULL,
    value REAL NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),
    UNIQUE (mandate_id, date),
    FOREIGN KEY (mandate_id) REFERENCES mandates(id)
);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    checksum TEXT,
    mandate_count INTEGER,
    value_count INTEGER,
    imported_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS import_sessions (
    session_id TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    updated_at TEXT DEFAULT (datetime('now'))
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    // Bound on lock waits; batch transactions must not queue indefinitely.
    conn.busy_timeout(Duration::from_secs(10))?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub fn list_mandates(conn: &Connection) -> Result<Vec<Mandate>> {
    let mut stmt = conn.prepare(
        "SELECT id, external_ref, name, mandate_group, currency, is_active, total_revenue, last_entry \
         FROM mandates ORDER BY name",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Mandate {
                id: row.get(0)?,
                external_ref: row.get(1)?,
                name: row.get(2)?,
                group: row.get(3)?,
                currency: row.get(4)?,
                is_active: row.get::<_, i64>(5)? != 0,
                total_revenue: row.get(6)?,
                last_entry: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
