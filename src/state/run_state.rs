/// Run and module state definitions
///
/// A run moves `Idle -> Running -> {Success, Failed}`; `Idle` is implicit
/// (no run record exists yet), so only the persisted states are modelled.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which scan strategy a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Walk every page with the early-stop heuristic disabled (backfill/audit)
    Full,
    /// Stop a module after enough consecutive known documents
    #[default]
    Incremental,
}

impl RunMode {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "full" => Some(Self::Full),
            "incremental" => Some(Self::Incremental),
            _ => None,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// How a single module's scan ended within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    /// Pagination ran out (or hit the page limit) without an early stop
    Completed,
    /// The stop rule ended the scan
    StoppedEarly,
    /// A listing page past the start page could not be fetched or parsed;
    /// the module resumes from this page next time
    PaginationHalted { page: u32 },
    /// The start page itself was unreachable
    Failed,
    /// The run was interrupted while this module was in progress
    Interrupted,
}

impl ModuleStatus {
    /// Whether this outcome should fail the whole run
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Interrupted)
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::StoppedEarly => f.write_str("stopped early"),
            Self::PaginationHalted { page } => write!(f, "pagination halted at page {}", page),
            Self::Failed => f.write_str("failed"),
            Self::Interrupted => f.write_str("interrupted"),
        }
    }
}
