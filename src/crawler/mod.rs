//! Crawl orchestration
//!
//! This module drives whole runs:
//! - Selecting modules and their scan mode
//! - Walking, classifying and archiving one module at a time
//! - Recording the run and per-module outcomes
//! - Handling interrupts and run locks

mod coordinator;
mod report;

pub use coordinator::{select_modules, Coordinator, RunOptions};
pub use report::{ModuleReport, RunSummary};
