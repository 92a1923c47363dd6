//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the spider, including:
//! - SQLite database initialization and schema management
//! - The four lifecycle stores (pending, catalog, rejected, reserved)
//! - Filtered queries over URL records
//! - Persistence of the housekeeping schedule

mod filter;
mod schema;
mod sqlite;
mod traits;

pub use filter::{Cmp, Field, Filter, TagMatch};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::SpiderError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(SpiderError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, SpiderError> {
    Ok(SqliteStorage::new(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_storage_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("riscos.db");
        assert!(open_storage(&path).is_ok());
        assert!(path.exists());
        // Reopening an existing database is fine
        assert!(open_storage(&path).is_ok());
    }
}
