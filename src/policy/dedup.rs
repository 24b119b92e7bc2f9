use crate::config::ModuleConfig;
use crate::listing::DocumentReference;
use crate::policy::{
    Classification, ConsecutiveKnown, DocIndex, Never, PublishedBefore, ScanState, StopRule,
};
use crate::state::RunMode;

/// Per-module classifier and stop decision
///
/// One instance lives for one module scan. The known-id index is passed in
/// on every call so the session keeps ownership of it while archiving.
pub struct DedupPolicy {
    rule: Box<dyn StopRule>,
    state: ScanState,
    resets: u32,
    new_count: u32,
}

impl DedupPolicy {
    pub fn new(rule: Box<dyn StopRule>) -> Self {
        Self {
            rule,
            state: ScanState::default(),
            resets: 0,
            new_count: 0,
        }
    }

    /// Picks the stop rule for a module scan
    ///
    /// Full mode never stops early. Incremental mode uses the module's
    /// `stop-before` date when set, otherwise its consecutive-known
    /// threshold.
    pub fn for_module(module: &ModuleConfig, mode: RunMode) -> Self {
        let rule: Box<dyn StopRule> = match (mode, module.stop_before) {
            (RunMode::Full, _) => Box::new(Never),
            (RunMode::Incremental, Some(cutoff)) => Box::new(PublishedBefore { cutoff }),
            (RunMode::Incremental, None) => Box::new(ConsecutiveKnown {
                threshold: module.stop_threshold,
            }),
        };
        Self::new(rule)
    }

    /// Classifies a reference and updates the known-streak counter
    pub fn classify(&mut self, index: &dyn DocIndex, reference: &DocumentReference) -> Classification {
        let class = if index.contains(&reference.doc_id) {
            self.state.consecutive_known += 1;
            Classification::Known
        } else {
            if self.state.consecutive_known > 0 {
                self.resets += 1;
            }
            self.state.consecutive_known = 0;
            self.new_count += 1;
            Classification::New
        };

        self.state.scanned += 1;
        self.state.last_publish_date = reference.publish_date.clone();
        self.state.last_class = Some(class);

        tracing::debug!(
            "{}: {} classified {} (streak {})",
            reference.module_id,
            reference.doc_id,
            class,
            self.state.consecutive_known
        );

        class
    }

    pub fn should_continue_module(&self) -> bool {
        !self.rule.should_stop(&self.state)
    }

    pub fn consecutive_known_count(&self) -> u32 {
        self.state.consecutive_known
    }

    /// How many times a new document broke a known streak
    pub fn reset_count(&self) -> u32 {
        self.resets
    }

    pub fn scanned_count(&self) -> u32 {
        self.state.scanned
    }

    pub fn new_count(&self) -> u32 {
        self.new_count
    }

    pub fn rule_description(&self) -> String {
        self.rule.describe()
    }
}
