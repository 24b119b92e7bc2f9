//! policy-harvest: an incremental archiver for government policy listings
//!
//! This crate walks the paginated listings of configured site modules, decides
//! which documents are new relative to previous runs, archives their detail
//! pages and linked PDFs, and persists enough state that runs can be repeated
//! or interrupted without duplicating work.

pub mod archive;
pub mod config;
pub mod crawler;
pub mod fetch;
pub mod listing;
pub mod lock;
pub mod notify;
pub mod output;
pub mod policy;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for harvest operations
///
/// Document-level failures never surface here; they are converted into
/// [`archive::SkipReason`] values and recorded in the run summary. Anything
/// that reaches this type means durability can no longer be guaranteed.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("Archive error: {0}")]
    Archive(#[from] archive::ArchiveError),

    #[error("Run lock error: {0}")]
    Lock(#[from] lock::LockError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown module: {0}")]
    UnknownModule(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, RunOptions, RunSummary};
pub use state::{ModuleProgressState, ModuleStatus, RunMode, RunStatus};
pub use storage::{ArchiveRecord, CrawlRunRecord};
