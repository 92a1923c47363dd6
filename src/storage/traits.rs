//! Storage traits and error types
//!
//! This module defines the document-store contract the spider relies on and the
//! associated error types.

use crate::state::{StoreKind, TaskScheduleState, UrlRecord};
use crate::storage::filter::{Field, Filter};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record has no id: {0}")]
    MissingId(String),

    #[error("Record not found: {store} #{id}")]
    NotFound { store: StoreKind, id: i64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The crawler only ever talks to its stores through these operations. Nothing
/// here enforces that a URL lives in a single store; callers check with
/// `crawler::lifecycle::locate` before inserting.
pub trait Storage {
    // ===== Document Store =====

    /// Returns every record in `store` matching `filter`, in insertion order
    fn find(&self, store: StoreKind, filter: &Filter) -> StorageResult<Vec<UrlRecord>>;

    /// Returns the first matching record
    fn find_one(&self, store: StoreKind, filter: &Filter) -> StorageResult<Option<UrlRecord>> {
        let limited = filter.clone().limit(1);
        Ok(self.find(store, &limited)?.into_iter().next())
    }

    /// Returns the distinct non-null values of `field` among matching records
    fn distinct(&self, store: StoreKind, field: Field, filter: &Filter)
        -> StorageResult<Vec<String>>;

    /// Counts matching records
    fn count(&self, store: StoreKind, filter: &Filter) -> StorageResult<u64>;

    /// Inserts a record and returns its new id
    ///
    /// Any id already set on `record` is ignored.
    fn insert(&mut self, store: StoreKind, record: &UrlRecord) -> StorageResult<i64>;

    /// Overwrites the stored record with the same id
    fn update(&mut self, store: StoreKind, record: &UrlRecord) -> StorageResult<()>;

    /// Removes matching records and returns how many were removed
    fn remove(&mut self, store: StoreKind, filter: &Filter) -> StorageResult<usize>;

    // ===== Housekeeping State =====

    /// Loads the persisted housekeeping schedule (all zero if never saved)
    fn load_task_schedule(&self) -> StorageResult<TaskScheduleState>;

    /// Persists the housekeeping schedule
    fn save_task_schedule(&mut self, state: &TaskScheduleState) -> StorageResult<()>;
}
