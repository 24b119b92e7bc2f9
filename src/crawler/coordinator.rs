//! Crawl coordinator - run orchestration
//!
//! One run processes the selected modules strictly one after another:
//! - Take the run locks and open the run record
//! - Roll the manifest forward into the database
//! - Per module: walk the listing, classify each reference, archive the new
//!   ones and persist progress after every page
//! - Close the run record and hand new documents to the notifier

use crate::archive::{ArchiveOutcome, ArchiveWriter};
use crate::config::{Config, ModuleConfig};
use crate::crawler::{ModuleReport, RunSummary};
use crate::fetch::Fetcher;
use crate::listing::{ListingWalker, WalkEnd};
use crate::lock::{break_locks, RunLock};
use crate::notify::{build_notifier, Notifier};
use crate::policy::{Classification, DedupPolicy};
use crate::state::{ModuleStatus, RunMode, RunStatus};
use crate::storage::{SqliteStorage, Storage};
use crate::HarvestError;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-invocation choices made on the command line
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Overrides every module's configured mode
    pub mode: Option<RunMode>,
    /// Modules to process; empty means all configured modules
    pub modules: Vec<String>,
    /// Caps listing pages per module, overriding `max-pages`
    pub max_pages: Option<u32>,
    /// Remove stale lock files before acquiring
    pub break_locks: bool,
}

impl RunOptions {
    /// Mode a module is scanned in
    pub fn mode_for(&self, module: &ModuleConfig) -> RunMode {
        self.mode.unwrap_or(module.mode)
    }
}

/// Resolves the modules a run processes, in configuration order
pub fn select_modules<'a>(
    config: &'a Config,
    requested: &[String],
) -> Result<Vec<&'a ModuleConfig>, HarvestError> {
    if requested.is_empty() {
        return Ok(config.modules.iter().collect());
    }

    for id in requested {
        if config.module(id).is_none() {
            return Err(HarvestError::UnknownModule(id.clone()));
        }
    }
    Ok(config
        .modules
        .iter()
        .filter(|m| requested.contains(&m.id))
        .collect())
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    options: RunOptions,
    module_ids: Vec<String>,
    storage: SqliteStorage,
    fetcher: Fetcher,
    writer: ArchiveWriter,
    notifier: Box<dyn Notifier>,
    interrupt: Arc<AtomicBool>,
    config_hash: String,
}

impl Coordinator {
    /// Creates a coordinator for one run
    ///
    /// Opens the database and builds the HTTP client; fails if a requested
    /// module is not configured.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use policy_harvest::config::load_config_with_hash;
    /// use policy_harvest::{Coordinator, RunOptions};
    /// use std::path::Path;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let (config, hash) = load_config_with_hash(Path::new("harvest.toml"))?;
    /// let mut coordinator = Coordinator::new(config, RunOptions::default(), hash)?;
    /// let summary = coordinator.run().await?;
    /// println!("{} new documents", summary.record.new_doc_count);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(
        config: Config,
        options: RunOptions,
        config_hash: impl Into<String>,
    ) -> Result<Self, HarvestError> {
        let module_ids = select_modules(&config, &options.modules)?
            .into_iter()
            .map(|m| m.id.clone())
            .collect();

        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        let fetcher = Fetcher::from_config(&config)?;
        let writer = ArchiveWriter::new(PathBuf::from(&config.output.data_dir));
        let notifier = build_notifier(config.notify.as_ref(), &config.user_agent)?;

        Ok(Self {
            config,
            options,
            module_ids,
            storage,
            fetcher,
            writer,
            notifier,
            interrupt: Arc::new(AtomicBool::new(false)),
            config_hash: config_hash.into(),
        })
    }

    /// Replaces the notifier picked from the configuration
    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Flag that, once set, ends the run after the document in flight
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Mode recorded on the run: the override, or `full` when every
    /// selected module is configured for it
    fn run_mode(&self) -> RunMode {
        if let Some(mode) = self.options.mode {
            return mode;
        }
        let all_full = self
            .module_ids
            .iter()
            .filter_map(|id| self.config.module(id))
            .all(|m| m.mode == RunMode::Full);
        if all_full && !self.module_ids.is_empty() {
            RunMode::Full
        } else {
            RunMode::Incremental
        }
    }

    /// Runs every selected module and closes the run record
    ///
    /// Returns `Err` only when the run could not start or its record could
    /// not be closed. Failures during the run are reflected in the returned
    /// summary's status and error lines.
    pub async fn run(&mut self) -> Result<RunSummary, HarvestError> {
        let data_dir = self.writer.data_dir().to_path_buf();
        if self.options.break_locks {
            let removed = break_locks(&data_dir, &self.module_ids)?;
            tracing::info!("Removed {} stale lock(s)", removed);
        }
        let _lock = RunLock::acquire(&data_dir, &self.module_ids)?;

        let run_id = self.storage.create_run(self.run_mode(), &self.config_hash)?;
        let mut record = self.storage.get_run(run_id)?;
        tracing::info!(
            "Starting {} run {} over {} module(s)",
            record.mode,
            run_id,
            self.module_ids.len()
        );

        let mut modules: Vec<ModuleReport> = Vec::new();
        let mut errors: Vec<String> = Vec::new();
        let mut fatal = false;

        let recovery = match self.writer.recover(&mut self.storage) {
            Ok(report) => {
                if report.rolled_forward > 0 || report.missing_files > 0 {
                    tracing::info!(
                        "Manifest recovery: {} rolled forward, {} with missing files",
                        report.rolled_forward,
                        report.missing_files
                    );
                }
                report
            }
            Err(e) => {
                tracing::error!("Manifest recovery failed: {}", e);
                errors.push(format!("fatal: {}", e));
                fatal = true;
                Default::default()
            }
        };

        let scan = ModuleScan {
            fetcher: &self.fetcher,
            writer: &self.writer,
            interrupt: &self.interrupt,
        };

        for module_id in &self.module_ids {
            if fatal || self.interrupt.load(Ordering::SeqCst) {
                errors.push(format!("{}: not scanned", module_id));
                continue;
            }
            let Some(module) = self.config.module(module_id) else {
                continue;
            };

            let mode = self.options.mode_for(module);
            let max_pages = self.options.max_pages.or(module.max_pages);
            let mut report = ModuleReport::new(&module.id, mode, 1);

            let result = scan
                .run(module, mode, max_pages, &mut self.storage, &mut report, &mut errors)
                .await;
            if let Err(e) = result {
                tracing::error!("{}: fatal error, ending run: {}", module.id, e);
                errors.push(format!("fatal: {}: {}", module.id, e));
                report.status = ModuleStatus::Failed;
                fatal = true;
            }

            record.modules_processed.push(module.id.clone());
            modules.push(report);
        }

        let interrupted = self.interrupt.load(Ordering::SeqCst);
        let module_failed = modules.iter().any(|m| m.status.is_failure());

        record.end_time = Some(Utc::now());
        record.new_doc_count = modules.iter().map(|m| m.archived.len() as u32).sum();
        record.total_scanned_count = modules.iter().map(|m| m.scanned).sum();
        record.interrupted = interrupted;
        record.error_summary = errors;
        record.status = if fatal || module_failed || interrupted {
            RunStatus::Failed
        } else {
            RunStatus::Success
        };
        self.storage.finish_run(&record)?;

        let mut summary = RunSummary {
            record,
            modules,
            recovery,
            receipts: Vec::new(),
        };

        tracing::info!(
            "Run {} finished: {}, {} new of {} scanned, {} error line(s)",
            run_id,
            summary.record.status_label(),
            summary.record.new_doc_count,
            summary.record.total_scanned_count,
            summary.record.error_summary.len()
        );

        if summary.is_success() {
            let archived: Vec<_> = summary.archived().cloned().collect();
            if !archived.is_empty() {
                summary.receipts = self.notifier.notify(&archived).await;
                tracing::info!("Sent {} notification(s)", summary.receipts.len());
            }
        }

        Ok(summary)
    }
}

/// Borrowed collaborators for scanning one module at a time
struct ModuleScan<'a> {
    fetcher: &'a Fetcher,
    writer: &'a ArchiveWriter,
    interrupt: &'a AtomicBool,
}

impl ModuleScan<'_> {
    /// Scans one module, filling in `report`
    ///
    /// Document skips and pagination problems end up in `errors`; only a
    /// storage or archive write failure is returned as `Err`.
    async fn run(
        &self,
        module: &ModuleConfig,
        mode: RunMode,
        max_pages: Option<u32>,
        storage: &mut dyn Storage,
        report: &mut ModuleReport,
        errors: &mut Vec<String>,
    ) -> Result<(), HarvestError> {
        let mut progress = storage.load_module_progress(&module.id)?;
        let start_page = match mode {
            RunMode::Full => progress.resume_page.unwrap_or(1),
            RunMode::Incremental => 1,
        };
        report.start_page = start_page;

        let mut policy = DedupPolicy::for_module(module, mode);
        let mut walker = ListingWalker::new(module, self.fetcher, start_page, max_pages);

        tracing::info!(
            "{} ({}): {} scan from page {}, {} known, stop rule: {}",
            module.id,
            module.display_name(),
            mode,
            start_page,
            progress.known_doc_ids.len(),
            policy.rule_description()
        );

        let mut current_page = 0;
        let mut interrupted = false;

        loop {
            if self.interrupt.load(Ordering::SeqCst) {
                interrupted = true;
                break;
            }
            let Some(reference) = walker.next().await else {
                break;
            };

            if reference.listing_page_index != current_page {
                current_page = reference.listing_page_index;
                progress.reached_page(current_page);
                if mode == RunMode::Full {
                    progress.resume_page = Some(current_page);
                }
                storage.save_module_progress(&progress)?;
            }

            if policy.classify(&progress.known_doc_ids, &reference) == Classification::New {
                match self.writer.archive(self.fetcher, storage, &reference).await? {
                    ArchiveOutcome::Archived(record) => {
                        progress.known_doc_ids.insert(record.doc_id.clone());
                        report.archived.push(record);
                    }
                    ArchiveOutcome::Skipped { doc_id, reason } => {
                        errors.push(format!("{}/{}: {}", module.id, doc_id, reason));
                        report.skipped += 1;
                    }
                }
            }

            if !policy.should_continue_module() {
                tracing::info!(
                    "{}: stopping after {} consecutive known references",
                    module.id,
                    policy.consecutive_known_count()
                );
                walker.stop();
                break;
            }
        }

        report.scanned = policy.scanned_count();
        report.resets = policy.reset_count();
        report.last_page_reached = walker.last_page_reached();
        if let Some(end) = walker.end() {
            tracing::debug!("{}: walk ended: {}", module.id, end);
        }

        report.status = if interrupted {
            ModuleStatus::Interrupted
        } else {
            match walker.end() {
                Some(WalkEnd::Stopped) => ModuleStatus::StoppedEarly,
                Some(WalkEnd::Halted { page, cause }) if *page == walker.start_page() => {
                    tracing::error!("{}: listing unreachable: {}", module.id, cause);
                    errors.push(format!(
                        "{}: listing unreachable at page {}: {}",
                        module.id, page, cause
                    ));
                    ModuleStatus::Failed
                }
                Some(WalkEnd::Halted { page, cause }) => {
                    errors.push(format!(
                        "{}: pagination halted at page {}: {}",
                        module.id, page, cause
                    ));
                    ModuleStatus::PaginationHalted { page: *page }
                }
                Some(WalkEnd::Exhausted) | Some(WalkEnd::PageLimit) | None => {
                    ModuleStatus::Completed
                }
            }
        };
        if interrupted {
            errors.push(format!("{}: interrupted", module.id));
        }

        if mode == RunMode::Full {
            progress.resume_page = match (&report.status, walker.end()) {
                (ModuleStatus::Interrupted, _) => Some(current_page.max(start_page)),
                (ModuleStatus::PaginationHalted { page }, _) => Some(*page),
                (ModuleStatus::Failed, _) => progress.resume_page,
                (_, Some(WalkEnd::PageLimit)) => Some(walker.next_page()),
                _ => None,
            };
        }
        report.resume_page = progress.resume_page;
        progress.consecutive_known_count = policy.consecutive_known_count();
        progress.last_run_at = Some(Utc::now());
        storage.save_module_progress(&progress)?;

        tracing::info!(
            "{}: {} ({} scanned, {} new, {} skipped, {} streak reset(s), last page {})",
            module.id,
            report.status,
            report.scanned,
            report.archived.len(),
            report.skipped,
            report.resets,
            report.last_page_reached
        );

        Ok(())
    }
}
