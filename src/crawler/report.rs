use crate::archive::RecoveryReport;
use crate::notify::NotificationReceipt;
use crate::state::{ModuleStatus, RunMode, RunStatus};
use crate::storage::{ArchiveRecord, CrawlRunRecord};

/// Outcome of one module's scan within a run
#[derive(Debug, Clone)]
pub struct ModuleReport {
    pub module_id: String,
    pub mode: RunMode,
    pub start_page: u32,
    /// Highest listing page parsed, 0 if none
    pub last_page_reached: u32,
    pub status: ModuleStatus,
    /// References classified, known and new
    pub scanned: u32,
    /// Times a new document broke a known streak
    pub resets: u32,
    /// Documents committed by this scan
    pub archived: Vec<ArchiveRecord>,
    /// New documents that could not be archived
    pub skipped: u32,
    /// Page a later full run resumes from
    pub resume_page: Option<u32>,
}

impl ModuleReport {
    pub fn new(module_id: impl Into<String>, mode: RunMode, start_page: u32) -> Self {
        Self {
            module_id: module_id.into(),
            mode,
            start_page,
            last_page_reached: 0,
            status: ModuleStatus::Completed,
            scanned: 0,
            resets: 0,
            archived: Vec::new(),
            skipped: 0,
            resume_page: None,
        }
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// The persisted run record
    pub record: CrawlRunRecord,
    /// One report per module scanned, in scan order
    pub modules: Vec<ModuleReport>,
    pub recovery: RecoveryReport,
    /// Empty unless the run succeeded with new documents
    pub receipts: Vec<NotificationReceipt>,
}

impl RunSummary {
    /// Every document archived by this run
    pub fn archived(&self) -> impl Iterator<Item = &ArchiveRecord> {
        self.modules.iter().flat_map(|m| m.archived.iter())
    }

    pub fn is_success(&self) -> bool {
        self.record.status == RunStatus::Success
    }

    pub fn module(&self, module_id: &str) -> Option<&ModuleReport> {
        self.modules.iter().find(|m| m.module_id == module_id)
    }
}
