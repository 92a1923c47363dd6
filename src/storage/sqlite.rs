//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::catalog::CatalogEntry;
use crate::state::{StoreKind, TaskScheduleState, UrlRecord};
use crate::storage::filter::{Field, Filter};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::path::Path;

const SELECT_COLUMNS: &str = "id, url, domain, last_scanned, next_scan, strikes, parent_url, \
     seed, zip_file, riscos_xml, rss_feed, superseded_by, entry";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn row_to_record(row: &Row) -> rusqlite::Result<UrlRecord> {
    let entry: Option<String> = row.get(12)?;
    let entry = entry
        .map(|json| serde_json::from_str::<CatalogEntry>(&json))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(12, Type::Text, Box::new(e)))?;

    Ok(UrlRecord {
        id: Some(row.get(0)?),
        url: row.get(1)?,
        domain: row.get(2)?,
        last_scanned: row.get(3)?,
        next_scan: row.get(4)?,
        strikes: row.get(5)?,
        parent_url: row.get(6)?,
        seed: row.get(7)?,
        zip_file: row.get(8)?,
        riscos_xml: row.get(9)?,
        rss_feed: row.get(10)?,
        superseded_by: row.get(11)?,
        entry,
    })
}

fn entry_json(record: &UrlRecord) -> StorageResult<Option<String>> {
    Ok(record.entry.as_ref().map(serde_json::to_string).transpose()?)
}

impl Storage for SqliteStorage {
    // ===== Document Store =====

    fn find(&self, store: StoreKind, filter: &Filter) -> StorageResult<Vec<UrlRecord>> {
        let (clause, values) = filter.to_sql();
        let mut sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY id",
            SELECT_COLUMNS,
            store.table_name(),
            clause
        );
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(values.iter()), row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn distinct(
        &self,
        store: StoreKind,
        field: Field,
        filter: &Filter,
    ) -> StorageResult<Vec<String>> {
        let (clause, values) = filter.to_sql();
        let column = field.column();
        let sql = format!(
            "SELECT DISTINCT {column} FROM {} WHERE {} AND {column} IS NOT NULL ORDER BY {column}",
            store.table_name(),
            clause
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let distinct = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(distinct)
    }

    fn count(&self, store: StoreKind, filter: &Filter) -> StorageResult<u64> {
        let (clause, values) = filter.to_sql();
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE {}", store.table_name(), clause),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn insert(&mut self, store: StoreKind, record: &UrlRecord) -> StorageResult<i64> {
        let entry = entry_json(record)?;
        self.conn.execute(
            &format!(
                "INSERT INTO {} (url, domain, last_scanned, next_scan, strikes, parent_url, seed,
                    zip_file, riscos_xml, rss_feed, directory, application_version,
                    superseded_by, entry)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                store.table_name()
            ),
            params![
                record.url,
                record.domain,
                record.last_scanned,
                record.next_scan,
                record.strikes,
                record.parent_url,
                record.seed,
                record.zip_file,
                record.riscos_xml,
                record.rss_feed,
                record.directory(),
                record.application_version(),
                record.superseded_by,
                entry,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&mut self, store: StoreKind, record: &UrlRecord) -> StorageResult<()> {
        let id = record
            .id
            .ok_or_else(|| StorageError::MissingId(record.url.clone()))?;
        let entry = entry_json(record)?;

        let changed = self.conn.execute(
            &format!(
                "UPDATE {} SET url = ?2, domain = ?3, last_scanned = ?4, next_scan = ?5,
                    strikes = ?6, parent_url = ?7, seed = ?8, zip_file = ?9, riscos_xml = ?10,
                    rss_feed = ?11, directory = ?12, application_version = ?13,
                    superseded_by = ?14, entry = ?15
                 WHERE id = ?1",
                store.table_name()
            ),
            params![
                id,
                record.url,
                record.domain,
                record.last_scanned,
                record.next_scan,
                record.strikes,
                record.parent_url,
                record.seed,
                record.zip_file,
                record.riscos_xml,
                record.rss_feed,
                record.directory(),
                record.application_version(),
                record.superseded_by,
                entry,
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::NotFound { store, id });
        }
        Ok(())
    }

    fn remove(&mut self, store: StoreKind, filter: &Filter) -> StorageResult<usize> {
        let (clause, values) = filter.to_sql();
        let removed = self.conn.execute(
            &format!("DELETE FROM {} WHERE {}", store.table_name(), clause),
            params_from_iter(values.iter()),
        )?;
        Ok(removed)
    }

    // ===== Housekeeping State =====

    fn load_task_schedule(&self) -> StorageResult<TaskScheduleState> {
        let mut stmt = self
            .conn
            .prepare("SELECT slot, last_ran FROM task_schedule")?;
        let entries = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)? as usize, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TaskScheduleState::from_entries(entries))
    }

    fn save_task_schedule(&mut self, state: &TaskScheduleState) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        for (slot, last_ran) in state.entries() {
            tx.execute(
                "INSERT OR REPLACE INTO task_schedule (slot, last_ran) VALUES (?1, ?2)",
                params![slot as i64, last_ran],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
