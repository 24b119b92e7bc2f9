//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{ModuleProgressState, RunMode};
use crate::storage::{ArchiveRecord, CrawlRunRecord};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the harvester.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new run in the `running` state and returns its id
    fn create_run(&mut self, mode: RunMode, config_hash: &str) -> StorageResult<i64>;

    /// Persists the final state of a run
    fn finish_run(&mut self, record: &CrawlRunRecord) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<CrawlRunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<CrawlRunRecord>>;

    /// Most recent runs first
    fn list_runs(&self, limit: usize) -> StorageResult<Vec<CrawlRunRecord>>;

    // ===== Module Progress =====

    /// Loads a module's progress together with its full known-id index
    ///
    /// Returns a fresh state for a module that has never been scanned.
    fn load_module_progress(&self, module_id: &str) -> StorageResult<ModuleProgressState>;

    /// Saves the progress counters of a module
    ///
    /// Known ids are not written here; they are committed with their
    /// archive record.
    fn save_module_progress(&mut self, state: &ModuleProgressState) -> StorageResult<()>;

    // ===== Archive Records =====

    /// Inserts an archive record and its known id in one transaction
    ///
    /// Returns false if the document was already committed.
    fn commit_archive(&mut self, record: &ArchiveRecord) -> StorageResult<bool>;

    fn is_known(&self, module_id: &str, doc_id: &str) -> StorageResult<bool>;

    fn get_archive_record(
        &self,
        module_id: &str,
        doc_id: &str,
    ) -> StorageResult<Option<ArchiveRecord>>;

    /// Returns the doc id whose HTML or PDF occupies `relative_path`, if any
    fn path_owner(&self, module_id: &str, relative_path: &str) -> StorageResult<Option<String>>;

    // ===== Statistics =====

    fn count_archive_records(&self) -> StorageResult<u64>;

    /// Archived document count per module
    fn archive_counts_by_module(&self) -> StorageResult<BTreeMap<String, u64>>;

    /// Archived documents whose PDF was skipped
    fn count_asset_notes(&self) -> StorageResult<u64>;
}
