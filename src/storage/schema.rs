//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per invocation
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mode TEXT NOT NULL,
    modules_processed TEXT NOT NULL DEFAULT '[]',
    started_at TEXT NOT NULL,
    finished_at TEXT,
    new_doc_count INTEGER NOT NULL DEFAULT 0,
    total_scanned_count INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    interrupted INTEGER NOT NULL DEFAULT 0,
    error_summary TEXT NOT NULL DEFAULT '[]',
    config_hash TEXT NOT NULL
);

-- Scan progress per module
CREATE TABLE IF NOT EXISTS module_progress (
    module_id TEXT PRIMARY KEY,
    last_listing_page_reached INTEGER NOT NULL DEFAULT 0,
    last_run_at TEXT,
    resume_page INTEGER,
    consecutive_known_count INTEGER NOT NULL DEFAULT 0
);

-- Known-document index; written in the same transaction as archive_records
CREATE TABLE IF NOT EXISTS known_docs (
    module_id TEXT NOT NULL,
    doc_id TEXT NOT NULL,
    PRIMARY KEY (module_id, doc_id)
);

-- Archived documents
CREATE TABLE IF NOT EXISTS archive_records (
    module_id TEXT NOT NULL,
    doc_id TEXT NOT NULL,
    title TEXT NOT NULL,
    publish_date TEXT,
    source_url TEXT NOT NULL,
    local_html_path TEXT NOT NULL,
    local_pdf_path TEXT,
    doc_number TEXT,
    department TEXT,
    asset_note TEXT,
    fetched_at TEXT NOT NULL,
    PRIMARY KEY (module_id, doc_id)
);

CREATE INDEX IF NOT EXISTS idx_archive_html_path ON archive_records(module_id, local_html_path);
CREATE INDEX IF NOT EXISTS idx_archive_pdf_path ON archive_records(module_id, local_pdf_path);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
