//! Append-only JSON-lines manifest
//!
//! The manifest is the commit log of the archive: a document counts as
//! committed once its line has been appended and synced, even if the database
//! transaction that follows never happened.

use crate::storage::ArchiveRecord;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// File name of the manifest inside the data directory
pub const MANIFEST_FILE: &str = "manifest.jsonl";

pub struct Manifest {
    path: PathBuf,
}

impl Manifest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record and syncs it to disk
    pub fn append(&self, record: &ArchiveRecord) -> io::Result<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_data()
    }

    /// Reads every well-formed record
    ///
    /// A missing manifest reads as empty. Malformed lines (for example a
    /// torn final line after a crash) are logged and skipped.
    pub fn read_all(&self) -> io::Result<Vec<ArchiveRecord>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut records = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<ArchiveRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(
                    "Skipping malformed manifest line {} in {}: {}",
                    idx + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(records)
    }
}
