//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::policy::KnownDocIndex;
use crate::state::{ModuleProgressState, RunMode, RunStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{ArchiveRecord, CrawlRunRecord};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;

const RUN_COLUMNS: &str = "id, mode, modules_processed, started_at, finished_at, new_doc_count,
     total_scanned_count, status, interrupted, error_summary, config_hash";

const ARCHIVE_COLUMNS: &str = "module_id, doc_id, title, publish_date, source_url, local_html_path,
     local_pdf_path, doc_number, department, asset_note, fetched_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    ///
    /// The parent directory is created if it does not exist.
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // FULL sync: the archive commit must survive power loss
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Raw `runs` row before text columns are decoded
struct RunRow {
    id: i64,
    mode: String,
    modules_processed: String,
    started_at: String,
    finished_at: Option<String>,
    new_doc_count: u32,
    total_scanned_count: u32,
    status: String,
    interrupted: bool,
    error_summary: String,
    config_hash: String,
}

impl RunRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            mode: row.get(1)?,
            modules_processed: row.get(2)?,
            started_at: row.get(3)?,
            finished_at: row.get(4)?,
            new_doc_count: row.get(5)?,
            total_scanned_count: row.get(6)?,
            status: row.get(7)?,
            interrupted: row.get(8)?,
            error_summary: row.get(9)?,
            config_hash: row.get(10)?,
        })
    }

    fn into_record(self) -> StorageResult<CrawlRunRecord> {
        Ok(CrawlRunRecord {
            run_id: self.id,
            mode: RunMode::from_db_string(&self.mode).ok_or_else(|| {
                StorageError::Serialization(format!("unknown run mode '{}'", self.mode))
            })?,
            modules_processed: decode_list(&self.modules_processed)?,
            start_time: parse_time(&self.started_at)?,
            end_time: self.finished_at.as_deref().map(parse_time).transpose()?,
            new_doc_count: self.new_doc_count,
            total_scanned_count: self.total_scanned_count,
            status: RunStatus::from_db_string(&self.status).unwrap_or(RunStatus::Failed),
            interrupted: self.interrupted,
            error_summary: decode_list(&self.error_summary)?,
            config_hash: self.config_hash,
        })
    }
}

fn archive_from_row(row: &Row<'_>) -> rusqlite::Result<ArchiveRecord> {
    let fetched_at: String = row.get(10)?;
    let fetched_at = DateTime::parse_from_rfc3339(&fetched_at)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?;

    Ok(ArchiveRecord {
        module_id: row.get(0)?,
        doc_id: row.get(1)?,
        title: row.get(2)?,
        publish_date: row.get(3)?,
        source_url: row.get(4)?,
        local_html_path: row.get(5)?,
        local_pdf_path: row.get(6)?,
        doc_number: row.get(7)?,
        department: row.get(8)?,
        asset_note: row.get(9)?,
        fetched_at,
    })
}

fn parse_time(s: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization(format!("bad timestamp '{}': {}", s, e)))
}

fn encode_list(items: &[String]) -> StorageResult<String> {
    serde_json::to_string(items).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode_list(s: &str) -> StorageResult<Vec<String>> {
    serde_json::from_str(s).map_err(|e| StorageError::Serialization(e.to_string()))
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, mode: RunMode, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (mode, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                mode.to_db_string(),
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, record: &CrawlRunRecord) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET modules_processed = ?1, finished_at = ?2, new_doc_count = ?3,
             total_scanned_count = ?4, status = ?5, interrupted = ?6, error_summary = ?7
             WHERE id = ?8",
            params![
                encode_list(&record.modules_processed)?,
                record.end_time.map(|t| t.to_rfc3339()),
                record.new_doc_count,
                record.total_scanned_count,
                record.status.to_db_string(),
                record.interrupted,
                encode_list(&record.error_summary)?,
                record.run_id,
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(record.run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<CrawlRunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![run_id], RunRow::from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))?;
        row.into_record()
    }

    fn get_latest_run(&self) -> StorageResult<Option<CrawlRunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, [], RunRow::from_row)
            .optional()?
            .map(RunRow::into_record)
            .transpose()
    }

    fn list_runs(&self, limit: usize) -> StorageResult<Vec<CrawlRunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT ?1", RUN_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit as i64], RunRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RunRow::into_record).collect()
    }

    // ===== Module Progress =====

    fn load_module_progress(&self, module_id: &str) -> StorageResult<ModuleProgressState> {
        let mut state = ModuleProgressState::new(module_id);

        let progress = self
            .conn
            .query_row(
                "SELECT last_listing_page_reached, last_run_at, resume_page, consecutive_known_count
                 FROM module_progress WHERE module_id = ?1",
                params![module_id],
                |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<u32>>(2)?,
                        row.get::<_, u32>(3)?,
                    ))
                },
            )
            .optional()?;

        if let Some((last_page, last_run_at, resume_page, consecutive)) = progress {
            state.last_listing_page_reached = last_page;
            state.last_run_at = last_run_at.as_deref().map(parse_time).transpose()?;
            state.resume_page = resume_page;
            state.consecutive_known_count = consecutive;
        }

        let mut stmt = self
            .conn
            .prepare("SELECT doc_id FROM known_docs WHERE module_id = ?1")?;
        state.known_doc_ids = stmt
            .query_map(params![module_id], |row| row.get::<_, String>(0))?
            .collect::<Result<KnownDocIndex, _>>()?;

        Ok(state)
    }

    fn save_module_progress(&mut self, state: &ModuleProgressState) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO module_progress
                (module_id, last_listing_page_reached, last_run_at, resume_page, consecutive_known_count)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(module_id) DO UPDATE SET
                last_listing_page_reached = excluded.last_listing_page_reached,
                last_run_at = excluded.last_run_at,
                resume_page = excluded.resume_page,
                consecutive_known_count = excluded.consecutive_known_count",
            params![
                state.module_id,
                state.last_listing_page_reached,
                state.last_run_at.map(|t| t.to_rfc3339()),
                state.resume_page,
                state.consecutive_known_count,
            ],
        )?;
        Ok(())
    }

    // ===== Archive Records =====

    fn commit_archive(&mut self, record: &ArchiveRecord) -> StorageResult<bool> {
        let tx = self.conn.transaction()?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO archive_records
                (module_id, doc_id, title, publish_date, source_url, local_html_path,
                 local_pdf_path, doc_number, department, asset_note, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.module_id,
                record.doc_id,
                record.title,
                record.publish_date,
                record.source_url,
                record.local_html_path,
                record.local_pdf_path,
                record.doc_number,
                record.department,
                record.asset_note,
                record.fetched_at.to_rfc3339(),
            ],
        )?;

        tx.execute(
            "INSERT OR IGNORE INTO known_docs (module_id, doc_id) VALUES (?1, ?2)",
            params![record.module_id, record.doc_id],
        )?;

        tx.commit()?;
        Ok(inserted > 0)
    }

    fn is_known(&self, module_id: &str, doc_id: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM known_docs WHERE module_id = ?1 AND doc_id = ?2",
                params![module_id, doc_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn get_archive_record(
        &self,
        module_id: &str,
        doc_id: &str,
    ) -> StorageResult<Option<ArchiveRecord>> {
        let sql = format!(
            "SELECT {} FROM archive_records WHERE module_id = ?1 AND doc_id = ?2",
            ARCHIVE_COLUMNS
        );
        let record = self
            .conn
            .query_row(&sql, params![module_id, doc_id], archive_from_row)
            .optional()?;
        Ok(record)
    }

    fn path_owner(&self, module_id: &str, relative_path: &str) -> StorageResult<Option<String>> {
        let owner = self
            .conn
            .query_row(
                "SELECT doc_id FROM archive_records
                 WHERE module_id = ?1 AND (local_html_path = ?2 OR local_pdf_path = ?2)
                 LIMIT 1",
                params![module_id, relative_path],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner)
    }

    // ===== Statistics =====

    fn count_archive_records(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM archive_records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn archive_counts_by_module(&self) -> StorageResult<BTreeMap<String, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT module_id, COUNT(*) FROM archive_records GROUP BY module_id")?;
        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(counts)
    }

    fn count_asset_notes(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM archive_records WHERE asset_note IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
