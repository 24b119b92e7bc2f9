//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! archive statistics from the storage layer.

use crate::storage::{CrawlRunRecord, Storage};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// How many recent runs the statistics show
const RECENT_RUNS: usize = 5;

/// Progress snapshot of one configured module
#[derive(Debug, Clone)]
pub struct ModuleStatistics {
    pub module_id: String,
    pub archived: u64,
    pub last_listing_page_reached: u32,
    pub last_run_at: Option<DateTime<Utc>>,
    pub resume_page: Option<u32>,
}

/// Archive statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Total number of archived documents
    pub total_archived: u64,

    /// Archived documents whose PDF was skipped
    pub missing_assets: u64,

    /// Per configured module, in configuration order
    pub modules: Vec<ModuleStatistics>,

    /// Archived counts of modules no longer in the configuration
    pub unconfigured: BTreeMap<String, u64>,

    /// Most recent runs first
    pub recent_runs: Vec<CrawlRunRecord>,
}

/// Loads statistics from storage for the given configured modules
pub fn load_statistics(
    storage: &dyn Storage,
    module_ids: &[String],
) -> Result<HarvestStatistics, HarvestError> {
    let total_archived = storage.count_archive_records()?;
    let missing_assets = storage.count_asset_notes()?;
    let mut counts = storage.archive_counts_by_module()?;

    let mut modules = Vec::with_capacity(module_ids.len());
    for module_id in module_ids {
        let progress = storage.load_module_progress(module_id)?;
        modules.push(ModuleStatistics {
            module_id: module_id.clone(),
            archived: counts.remove(module_id).unwrap_or(0),
            last_listing_page_reached: progress.last_listing_page_reached,
            last_run_at: progress.last_run_at,
            resume_page: progress.resume_page,
        });
    }

    Ok(HarvestStatistics {
        total_archived,
        missing_assets,
        modules,
        unconfigured: counts,
        recent_runs: storage.list_runs(RECENT_RUNS)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Documents archived: {}", stats.total_archived);
    println!("  Documents without their PDF: {}", stats.missing_assets);
    println!();

    println!("Modules:");
    for module in &stats.modules {
        let last_run = module
            .last_run_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        print!(
            "  {}: {} archived, last page {}, last run {}",
            module.module_id, module.archived, module.last_listing_page_reached, last_run
        );
        if let Some(page) = module.resume_page {
            print!(", full walk resumes at page {}", page);
        }
        println!();
    }
    for (module_id, count) in &stats.unconfigured {
        println!("  {} (not configured): {} archived", module_id, count);
    }
    println!();

    if !stats.recent_runs.is_empty() {
        println!("Recent Runs:");
        for run in &stats.recent_runs {
            println!(
                "  #{} {} {} - {} new / {} scanned - {}",
                run.run_id,
                run.start_time.format("%Y-%m-%d %H:%M:%S"),
                run.mode,
                run.new_doc_count,
                run.total_scanned_count,
                run.status_label()
            );
        }
    }
}
