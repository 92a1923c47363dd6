//! Database schema definitions
//!
//! The four lifecycle stores share one column layout. Catalog content lives in the
//! `entry` JSON column; `directory` and `application_version` are copied out of it
//! so supersession queries can filter on them.

use crate::state::StoreKind;
use rusqlite::Connection;

/// Column layout shared by every store table
const STORE_COLUMNS: &str = r#"
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    domain TEXT NOT NULL DEFAULT '',
    last_scanned INTEGER NOT NULL DEFAULT 0,
    next_scan INTEGER NOT NULL DEFAULT 0,
    strikes INTEGER NOT NULL DEFAULT 0,
    parent_url TEXT,
    seed INTEGER NOT NULL DEFAULT 0,
    zip_file TEXT,
    riscos_xml TEXT,
    rss_feed TEXT,
    directory TEXT,
    application_version TEXT,
    superseded_by INTEGER,
    entry TEXT
"#;

/// Tables that are not stores
pub const SCHEMA_SQL: &str = r#"
-- When each housekeeping task last ran
CREATE TABLE IF NOT EXISTS task_schedule (
    slot INTEGER PRIMARY KEY,
    last_ran INTEGER NOT NULL
);
"#;

/// Initializes the database schema
///
/// Safe to call on an existing database.
pub fn initialize_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    for store in StoreKind::all() {
        let table = store.table_name();
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} ({STORE_COLUMNS});
             CREATE INDEX IF NOT EXISTS idx_{table}_url ON {table}(url);
             CREATE INDEX IF NOT EXISTS idx_{table}_domain ON {table}(domain);
             CREATE INDEX IF NOT EXISTS idx_{table}_next_scan ON {table}(next_scan);
             CREATE INDEX IF NOT EXISTS idx_{table}_last_scanned ON {table}(last_scanned);"
        ))?;
    }
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
