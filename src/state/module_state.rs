use crate::policy::KnownDocIndex;
use chrono::{DateTime, Utc};

/// Durable per-module progress
///
/// Loaded once at the start of a module's scan and owned by the crawl
/// session for its duration. `known_doc_ids` is the only answer to "have we
/// seen this document"; it is persisted in the same transaction as the
/// archive record it covers.
#[derive(Debug, Clone)]
pub struct ModuleProgressState {
    pub module_id: String,

    /// Every document id archived for this module
    pub known_doc_ids: KnownDocIndex,

    /// Highest listing page reached by the most recent scan
    pub last_listing_page_reached: u32,

    pub last_run_at: Option<DateTime<Utc>>,

    /// Page a full walk should restart from after ending early
    pub resume_page: Option<u32>,

    /// Known-document streak at the end of the most recent scan
    pub consecutive_known_count: u32,
}

impl ModuleProgressState {
    /// Creates the state for a module that has never been scanned
    pub fn new(module_id: impl Into<String>) -> Self {
        Self {
            module_id: module_id.into(),
            known_doc_ids: KnownDocIndex::new(),
            last_listing_page_reached: 0,
            last_run_at: None,
            resume_page: None,
            consecutive_known_count: 0,
        }
    }

    /// Records that a listing page was reached during the current scan
    pub fn reached_page(&mut self, page: u32) {
        self.last_listing_page_reached = page;
    }

    /// Returns true if this module has never archived anything
    pub fn is_fresh(&self) -> bool {
        self.known_doc_ids.is_empty()
    }
}
