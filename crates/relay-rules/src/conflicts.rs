//! Conflict detection and per-action optimization suggestions.
//!
//! Conflicts are reported alongside validation results, never raised as
//! errors.

use relay_core::action::{ProposedAction, RiskLevel};

use crate::types::{
    ConflictKind, EnforcementOutcome, OptimizationSuggestion, RuleConflict, RuleEnforcementResult,
    SessionRule, SuggestionKind,
};

const LOW_FIRED_EFFECTIVENESS: f64 = 0.5;

/// Inspect one enforcement pass for rules pulling in opposite directions.
pub fn detect_conflicts(
    results: &[RuleEnforcementResult],
    fired: &[SessionRule],
) -> Vec<RuleConflict> {
    let mut conflicts = Vec::new();

    let blocked: Vec<_> = results
        .iter()
        .filter(|r| r.outcome == EnforcementOutcome::Blocked)
        .collect();
    let allowed: Vec<_> = results
        .iter()
        .filter(|r| r.outcome == EnforcementOutcome::Allowed)
        .collect();
    let warned: Vec<_> = results
        .iter()
        .filter(|r| r.outcome == EnforcementOutcome::Warned)
        .collect();

    if !blocked.is_empty() && !allowed.is_empty() {
        conflicts.push(RuleConflict {
            kind: ConflictKind::Contradictory,
            rule_ids: blocked
                .iter()
                .chain(allowed.iter())
                .map(|r| r.rule_id.clone())
                .collect(),
            detail: "the same action is both blocked and allowed by active rules".into(),
        });
    }

    if !blocked.is_empty() && !warned.is_empty() {
        conflicts.push(RuleConflict {
            kind: ConflictKind::Contradictory,
            rule_ids: blocked
                .iter()
                .chain(warned.iter())
                .map(|r| r.rule_id.clone())
                .collect(),
            detail: "a blocking rule overlaps a warn-and-continue rule for the same action".into(),
        });
    }

    // TODO: flag shared-priority pairs instead; distinct priorities already
    // define a winner, so this marks the wrong case as redundant.
    if fired.len() > 1 {
        let mut priorities: Vec<u32> = fired.iter().map(|r| r.priority).collect();
        priorities.sort_unstable();
        priorities.dedup();
        if priorities.len() == fired.len() {
            conflicts.push(RuleConflict {
                kind: ConflictKind::Redundant,
                rule_ids: fired.iter().map(|r| r.id.clone()).collect(),
                detail: format!("{} rules fired on one action at distinct priorities", fired.len()),
            });
        }
    }

    conflicts
}

/// Per-action suggestions derived from how the enforcement pass went.
pub fn suggest_optimizations(
    action: &ProposedAction,
    results: &[RuleEnforcementResult],
    fired: &[SessionRule],
) -> Vec<OptimizationSuggestion> {
    let mut suggestions = Vec::new();

    if fired.len() > 2 {
        suggestions.push(OptimizationSuggestion {
            kind: SuggestionKind::MergeRules,
            rule_ids: fired.iter().map(|r| r.id.clone()).collect(),
            detail: format!(
                "{} rules fired on '{}'; overlapping rules may be mergeable",
                fired.len(),
                action.action_type
            ),
        });
    }

    let any_blocked = results
        .iter()
        .any(|r| r.outcome == EnforcementOutcome::Blocked);
    let any_warned = results
        .iter()
        .any(|r| r.outcome == EnforcementOutcome::Warned);

    if any_blocked {
        let blocked_ids: Vec<_> = results
            .iter()
            .filter(|r| r.outcome == EnforcementOutcome::Blocked)
            .map(|r| r.rule_id.clone())
            .collect();
        suggestions.push(OptimizationSuggestion {
            kind: SuggestionKind::DecomposeRule,
            rule_ids: blocked_ids.clone(),
            detail: "a hard block fired; a narrower rule may allow safe variants".into(),
        });
        suggestions.push(OptimizationSuggestion {
            kind: SuggestionKind::ReviewStrictness,
            rule_ids: blocked_ids,
            detail: "review whether hard-block enforcement is still warranted".into(),
        });
    } else if any_warned {
        suggestions.push(OptimizationSuggestion {
            kind: SuggestionKind::PromoteEnforcement,
            rule_ids: results
                .iter()
                .filter(|r| r.outcome == EnforcementOutcome::Warned)
                .map(|r| r.rule_id.clone())
                .collect(),
            detail: "warnings only; promote to a block if violations keep recurring".into(),
        });
    }

    if results.is_empty() && action.risk_level == RiskLevel::High {
        suggestions.push(OptimizationSuggestion {
            kind: SuggestionKind::RefineConditions,
            rule_ids: Vec::new(),
            detail: format!(
                "high-risk action '{}' matched no rule; consider adding one",
                action.action_type
            ),
        });
    }

    for rule in fired {
        if rule.effectiveness_or_default() < LOW_FIRED_EFFECTIVENESS {
            suggestions.push(OptimizationSuggestion {
                kind: SuggestionKind::ReviseEnforcement,
                rule_ids: vec![rule.id.clone()],
                detail: format!(
                    "rule '{}' fired but scores {:.2}; its enforcement level is ignored",
                    rule.rule,
                    rule.effectiveness_or_default()
                ),
            });
        }
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EnforcementLevel, RuleScope, RuleType};
    use relay_core::ids::RuleId;

    fn result(outcome: EnforcementOutcome) -> RuleEnforcementResult {
        RuleEnforcementResult {
            rule_id: RuleId::new(),
            action_type: "deploy_service".into(),
            outcome,
            message: None,
            alternatives: Vec::new(),
            timestamp: "2026-08-25T12:00:00Z".into(),
        }
    }

    fn rule(priority: u32) -> SessionRule {
        SessionRule::new(
            "some rule",
            RuleType::Workflow,
            priority,
            RuleScope::Project,
            EnforcementLevel::Reminder,
        )
    }

    #[test]
    fn blocked_and_allowed_is_contradictory() {
        let results = vec![
            result(EnforcementOutcome::Blocked),
            result(EnforcementOutcome::Allowed),
        ];
        let conflicts = detect_conflicts(&results, &[]);
        assert!(conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::Contradictory));
    }

    #[test]
    fn warned_plus_blocked_pair_is_contradictory() {
        let results = vec![
            result(EnforcementOutcome::Warned),
            result(EnforcementOutcome::Blocked),
        ];
        let conflicts = detect_conflicts(&results, &[rule(10), rule(20)]);
        assert!(conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::Contradictory));
    }

    #[test]
    fn uniform_outcomes_are_not_contradictory() {
        let results = vec![
            result(EnforcementOutcome::Allowed),
            result(EnforcementOutcome::Allowed),
        ];
        let conflicts = detect_conflicts(&results, &[]);
        assert!(!conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::Contradictory));
    }

    #[test]
    fn multiple_fired_at_distinct_priorities_flags_redundant() {
        let conflicts = detect_conflicts(&[], &[rule(10), rule(20)]);
        assert!(conflicts.iter().any(|c| c.kind == ConflictKind::Redundant));
    }

    #[test]
    fn no_rules_high_risk_suggests_refining_conditions() {
        let action =
            ProposedAction::new("refactor_module", "rework the auth module", RiskLevel::High);
        let suggestions = suggest_optimizations(&action, &[], &[]);
        assert!(suggestions
            .iter()
            .any(|s| s.kind == SuggestionKind::RefineConditions));
    }

    #[test]
    fn no_rules_low_risk_suggests_nothing() {
        let action = ProposedAction::new("read_file", "open a config file", RiskLevel::Low);
        assert!(suggest_optimizations(&action, &[], &[]).is_empty());
    }

    #[test]
    fn blocked_suggests_decompose_and_strictness_review() {
        let action =
            ProposedAction::new("deploy_service", "ship to production", RiskLevel::Medium);
        let results = vec![result(EnforcementOutcome::Blocked)];
        let suggestions = suggest_optimizations(&action, &results, &[rule(10)]);
        assert!(suggestions
            .iter()
            .any(|s| s.kind == SuggestionKind::DecomposeRule));
        assert!(suggestions
            .iter()
            .any(|s| s.kind == SuggestionKind::ReviewStrictness));
    }

    #[test]
    fn warned_without_blocked_suggests_promotion() {
        let action = ProposedAction::new("modify_schema", "alter a table", RiskLevel::Medium);
        let results = vec![result(EnforcementOutcome::Warned)];
        let suggestions = suggest_optimizations(&action, &results, &[rule(10)]);
        assert!(suggestions
            .iter()
            .any(|s| s.kind == SuggestionKind::PromoteEnforcement));
        assert!(!suggestions
            .iter()
            .any(|s| s.kind == SuggestionKind::DecomposeRule));
    }

    #[test]
    fn low_effectiveness_fired_rule_suggests_revision() {
        let action =
            ProposedAction::new("commit_changes", "commit work in progress", RiskLevel::Low);
        let mut weak = rule(10);
        weak.effectiveness = Some(0.1);
        let results = vec![result(EnforcementOutcome::Allowed)];
        let suggestions = suggest_optimizations(&action, &results, &[weak]);
        assert!(suggestions
            .iter()
            .any(|s| s.kind == SuggestionKind::ReviseEnforcement));
    }
}
