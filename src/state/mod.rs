//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `RunMode` / `RunStatus`: mode and lifecycle of a crawl run
//! - `ModuleStatus`: how one module's scan ended
//! - `ModuleProgressState`: durable per-module progress and the known-id index

mod module_state;
mod run_state;

// Re-export main types
pub use module_state::ModuleProgressState;
pub use run_state::{ModuleStatus, RunMode, RunStatus};
