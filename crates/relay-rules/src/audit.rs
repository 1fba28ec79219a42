//! Bounded in-memory log of enforcement results.
//!
//! Enforcement results are ephemeral: every match appends here and to the
//! tracing log, but nothing is persisted as an entity.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::types::RuleEnforcementResult;

pub const DEFAULT_MAX_ENTRIES: usize = 1000;

pub struct EnforcementLog {
    entries: Mutex<VecDeque<RuleEnforcementResult>>,
    max_entries: usize,
}

impl EnforcementLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_entries,
        }
    }

    pub fn push(&self, result: RuleEnforcementResult) {
        let mut entries = self.entries.lock();
        if entries.len() == self.max_entries {
            entries.pop_front();
        }
        entries.push_back(result);
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<RuleEnforcementResult> {
        self.entries
            .lock()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for EnforcementLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EnforcementOutcome;
    use relay_core::ids::RuleId;

    fn result(action: &str) -> RuleEnforcementResult {
        RuleEnforcementResult {
            rule_id: RuleId::from_raw("rule_1"),
            action_type: action.into(),
            outcome: EnforcementOutcome::Allowed,
            message: None,
            alternatives: Vec::new(),
            timestamp: "2026-08-25T12:00:00Z".into(),
        }
    }

    #[test]
    fn recent_returns_newest_first() {
        let log = EnforcementLog::default();
        log.push(result("first"));
        log.push(result("second"));

        let recent = log.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].action_type, "second");
    }

    #[test]
    fn capacity_evicts_oldest() {
        let log = EnforcementLog::new(2);
        log.push(result("a"));
        log.push(result("b"));
        log.push(result("c"));

        assert_eq!(log.len(), 2);
        let recent = log.recent(10);
        assert_eq!(recent[0].action_type, "c");
        assert_eq!(recent[1].action_type, "b");
    }
}
