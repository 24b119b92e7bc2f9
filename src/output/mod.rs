//! Output module for run summaries and archive statistics
//!
//! This module handles:
//! - Formatting a finished run as a markdown summary
//! - Reporting archive statistics from the database (`--stats`)

pub mod stats;
mod summary;

pub use stats::{load_statistics, print_statistics, HarvestStatistics, ModuleStatistics};
pub use summary::format_run_summary;
