use crate::policy::Classification;
use chrono::NaiveDate;

/// Scan counters a stop rule may inspect
#[derive(Debug, Clone, Default)]
pub struct ScanState {
    pub consecutive_known: u32,
    pub scanned: u32,
    /// Publish date of the most recently classified reference
    pub last_publish_date: Option<String>,
    pub last_class: Option<Classification>,
}

/// Decides when a module's scan should end early
pub trait StopRule: Send + Sync {
    fn should_stop(&self, state: &ScanState) -> bool;

    fn describe(&self) -> String;
}

/// Stop after `threshold` known references in a row
#[derive(Debug, Clone, Copy)]
pub struct ConsecutiveKnown {
    pub threshold: u32,
}

impl StopRule for ConsecutiveKnown {
    fn should_stop(&self, state: &ScanState) -> bool {
        state.consecutive_known >= self.threshold
    }

    fn describe(&self) -> String {
        format!("{} consecutive known documents", self.threshold)
    }
}

/// Never stop early
#[derive(Debug, Clone, Copy)]
pub struct Never;

impl StopRule for Never {
    fn should_stop(&self, _state: &ScanState) -> bool {
        false
    }

    fn describe(&self) -> String {
        "never".to_string()
    }
}

/// Stop at the first reference published before `cutoff`
///
/// Month-only dates (`YYYY-MM-00`) count as the first of the month;
/// undated references never trigger the rule.
#[derive(Debug, Clone, Copy)]
pub struct PublishedBefore {
    pub cutoff: NaiveDate,
}

impl StopRule for PublishedBefore {
    fn should_stop(&self, state: &ScanState) -> bool {
        state
            .last_publish_date
            .as_deref()
            .and_then(parse_listing_date)
            .map(|date| date < self.cutoff)
            .unwrap_or(false)
    }

    fn describe(&self) -> String {
        format!("published before {}", self.cutoff)
    }
}

fn parse_listing_date(s: &str) -> Option<NaiveDate> {
    let normalized = match s.strip_suffix("-00") {
        Some(month) => format!("{}-01", month),
        None => s.to_string(),
    };
    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_known_threshold() {
        let rule = ConsecutiveKnown { threshold: 3 };
        let mut state = ScanState::default();
        state.consecutive_known = 2;
        assert!(!rule.should_stop(&state));
        state.consecutive_known = 3;
        assert!(rule.should_stop(&state));
    }

    #[test]
    fn test_never() {
        let state = ScanState {
            consecutive_known: u32::MAX,
            ..Default::default()
        };
        assert!(!Never.should_stop(&state));
    }

    #[test]
    fn test_published_before() {
        let rule = PublishedBefore {
            cutoff: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        };
        let mut state = ScanState::default();
        assert!(!rule.should_stop(&state));

        state.last_publish_date = Some("2020-01-01".to_string());
        assert!(!rule.should_stop(&state));

        state.last_publish_date = Some("2019-12-31".to_string());
        assert!(rule.should_stop(&state));

        state.last_publish_date = Some("2019-12-00".to_string());
        assert!(rule.should_stop(&state));

        state.last_publish_date = Some("garbage".to_string());
        assert!(!rule.should_stop(&state));
    }
}
