//! Listing walker
//!
//! Walks a module's paginated index one page at a time and yields
//! [`DocumentReference`]s lazily, so the caller can stop the walk as soon as
//! its stop rule fires without fetching pages it will never look at.

mod pagination;
mod parser;
mod walker;

pub use pagination::{detect_total_pages, page_url};
pub use parser::{doc_id_from_url, parse_listing};
pub use walker::{ListingWalker, WalkEnd};

/// One row of a listing page
///
/// Constructed while parsing a page and consumed immediately; never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReference {
    pub module_id: String,
    /// Stable id derived from the detail URL; unique within a module
    pub doc_id: String,
    pub title: String,
    pub detail_url: String,
    /// `YYYY-MM-DD`, or `YYYY-MM-00` when only the month is known
    pub publish_date: Option<String>,
    /// 1-based page the row was found on
    pub listing_page_index: u32,
}
