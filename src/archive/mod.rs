//! Archive writer
//!
//! Turns a new [`DocumentReference`](crate::listing::DocumentReference) into
//! files on disk and a committed [`ArchiveRecord`](crate::storage::ArchiveRecord):
//!
//! 1. Fetch and parse the detail page, then fetch the linked PDF if any
//! 2. Write each artifact atomically (temp file, fsync, rename)
//! 3. Append the record to the manifest and fsync
//! 4. Insert the record and its known id in one database transaction
//!
//! Document-level problems become a [`SkipReason`]; anything that threatens
//! durability is an [`ArchiveError`] and ends the run.

mod extract;
mod manifest;
mod naming;
mod writer;

pub use extract::{extract_detail_fields, DetailFields};
pub use manifest::{Manifest, MANIFEST_FILE};
pub use naming::{
    archive_filename, disambiguate, sanitize_title, MAX_FILENAME_BYTES, MAX_TITLE_BYTES,
    MAX_TITLE_CHARS,
};
pub use writer::{ArchiveOutcome, ArchiveWriter, RecoveryReport};

use crate::fetch::FetchError;
use crate::storage::StorageError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Why a document was not archived this run
///
/// Skipped documents are not added to the known index, so the next run
/// tries them again.
#[derive(Debug, Clone)]
pub enum SkipReason {
    FetchFailed(FetchError),
    ParseFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchFailed(e) => write!(f, "fetch failed: {}", e),
            Self::ParseFailed(msg) => write!(f, "parse failed: {}", msg),
        }
    }
}

/// Failures that make the archive unreliable; fatal to the run
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to update manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
