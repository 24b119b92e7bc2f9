//! Dedup and stop policy
//!
//! Classifies each listing reference as new or known against the module's
//! known-id index and decides, through a pluggable [`StopRule`], whether the
//! scan of that module should go on.

mod dedup;
mod index;
mod stop;

pub use dedup::DedupPolicy;
pub use index::{DocIndex, KnownDocIndex};
pub use stop::{ConsecutiveKnown, Never, PublishedBefore, ScanState, StopRule};

use std::fmt;

/// Whether a reference has been archived before
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    New,
    Known,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => f.write_str("new"),
            Self::Known => f.write_str("known"),
        }
    }
}
