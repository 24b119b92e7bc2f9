//! Storage module for persisting harvest state
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Run records
//! - Per-module progress and the known-document index
//! - Archive records, committed together with their known id

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::{RunMode, RunStatus};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// One archived document
///
/// Also the line format of the manifest. Paths are relative to the data
/// directory (`{module_id}/{file}`). Immutable once committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub module_id: String,
    pub doc_id: String,
    pub title: String,
    pub publish_date: Option<String>,
    pub source_url: String,
    pub local_html_path: String,
    #[serde(default)]
    pub local_pdf_path: Option<String>,
    #[serde(default)]
    pub doc_number: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    /// Why the linked PDF is missing, when it is
    #[serde(default)]
    pub asset_note: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

/// One invocation of the harvester
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlRunRecord {
    pub run_id: i64,
    pub mode: RunMode,
    pub modules_processed: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub new_doc_count: u32,
    pub total_scanned_count: u32,
    pub status: RunStatus,
    pub interrupted: bool,
    pub error_summary: Vec<String>,
    pub config_hash: String,
}

impl CrawlRunRecord {
    /// Status as shown to operators, e.g. `failed (interrupted)`
    pub fn status_label(&self) -> String {
        if self.interrupted {
            format!("{} (interrupted)", self.status)
        } else {
            self.status.to_string()
        }
    }
}
