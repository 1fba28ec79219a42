//! Priority-ordered, fail-fast rule enforcement.
//!
//! Active rules are evaluated ascending by priority. A hard block stops the
//! pass immediately: nothing after the blocking rule is evaluated.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use relay_core::action::{ProposedAction, RiskLevel};

use crate::audit::EnforcementLog;
use crate::conflicts;
use crate::effectiveness;
use crate::store::RuleStore;
use crate::types::{
    ActionValidation, EnforcementLevel, EnforcementOutcome, RuleEnforcementResult, SessionRule,
};

pub struct RuleEnforcementEngine {
    store: Arc<RuleStore>,
    log: EnforcementLog,
}

impl RuleEnforcementEngine {
    pub fn new(store: Arc<RuleStore>) -> Self {
        Self {
            store,
            log: EnforcementLog::default(),
        }
    }

    pub fn store(&self) -> &Arc<RuleStore> {
        &self.store
    }

    pub fn log(&self) -> &EnforcementLog {
        &self.log
    }

    /// Evaluate an action against every active rule in priority order.
    /// Returns one result per matched rule, stopping at the first hard block.
    pub async fn enforce(&self, action: &ProposedAction) -> Vec<RuleEnforcementResult> {
        let rules = self.store.get_rules(None).await;
        let mut results = Vec::new();

        for rule in rules.iter().filter(|r| r.active) {
            if !matches_rule(rule, action) {
                continue;
            }

            self.store.record_usage(&rule.id).await;
            let result = evaluate(rule, action);

            match result.outcome {
                EnforcementOutcome::Blocked => {
                    warn!(rule_id = %rule.id, action = %action.action_type, "action blocked");
                }
                EnforcementOutcome::Warned => {
                    info!(rule_id = %rule.id, action = %action.action_type, "action warned");
                }
                EnforcementOutcome::Allowed => {
                    debug!(rule_id = %rule.id, action = %action.action_type, "rule matched");
                }
            }

            let blocked = result.outcome == EnforcementOutcome::Blocked;
            self.log.push(result.clone());
            results.push(result);
            if blocked {
                break;
            }
        }

        results
    }

    /// Full validation pass: enforcement plus conflict detection and
    /// per-action optimization suggestions.
    pub async fn validate_action(&self, action: &ProposedAction) -> ActionValidation {
        let results = self.enforce(action).await;

        let rules = self.store.get_rules(None).await;
        let fired: Vec<SessionRule> = rules
            .into_iter()
            .filter(|r| results.iter().any(|res| res.rule_id == r.id))
            .collect();

        let valid = !results
            .iter()
            .any(|r| r.outcome == EnforcementOutcome::Blocked);
        let estimated_effectiveness = if fired.is_empty() {
            effectiveness::DEFAULT_EFFECTIVENESS
        } else {
            fired.iter().map(|r| r.effectiveness_or_default()).sum::<f64>() / fired.len() as f64
        };

        ActionValidation {
            valid,
            conflicts: conflicts::detect_conflicts(&results, &fired),
            suggestions: conflicts::suggest_optimizations(action, &results, &fired),
            estimated_effectiveness,
        }
    }
}

/// Trigger keywords match case-insensitively as a substring of the action
/// type or of the description, each field checked on its own. Rules without
/// triggers fall back to per-type heuristics.
fn matches_rule(rule: &SessionRule, action: &ProposedAction) -> bool {
    let action_type = action.action_type.to_lowercase();
    let description = action.description.to_lowercase();
    let field_contains =
        |needle: &str| action_type.contains(needle) || description.contains(needle);

    if !rule.triggers.is_empty() {
        return rule
            .triggers
            .iter()
            .any(|t| field_contains(&t.to_lowercase()));
    }

    match rule.rule_type {
        crate::types::RuleType::Approval => {
            action.risk_level == RiskLevel::High
                || field_contains("create")
                || field_contains("modify")
        }
        crate::types::RuleType::Architecture => {
            field_contains("design") || field_contains("implement") || field_contains("refactor")
        }
        crate::types::RuleType::Documentation => {
            field_contains("artifact") || field_contains("document")
        }
        crate::types::RuleType::Workflow => false,
    }
}

fn evaluate(rule: &SessionRule, action: &ProposedAction) -> RuleEnforcementResult {
    let (outcome, message, alternatives) = match rule.enforcement {
        EnforcementLevel::HardBlock => (
            EnforcementOutcome::Blocked,
            Some(format!("blocked by rule: {}", rule.rule)),
            Vec::new(),
        ),
        EnforcementLevel::SoftBlock => (
            EnforcementOutcome::Warned,
            Some(format!("confirm before proceeding: {}", rule.rule)),
            vec![
                format!("revise '{}' to comply with: {}", action.action_type, rule.rule),
                "ask the user to confirm the action".to_string(),
            ],
        ),
        EnforcementLevel::Reminder | EnforcementLevel::Suggestion => (
            EnforcementOutcome::Allowed,
            Some(format!("note: {}", rule.rule)),
            Vec::new(),
        ),
        EnforcementLevel::LogOnly => (EnforcementOutcome::Allowed, None, Vec::new()),
    };

    RuleEnforcementResult {
        rule_id: rule.id.clone(),
        action_type: action.action_type.clone(),
        outcome,
        message,
        alternatives,
        timestamp: Utc::now().to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConflictKind, RuleScope, RuleType, SuggestionKind};

    fn engine() -> RuleEnforcementEngine {
        RuleEnforcementEngine::new(Arc::new(RuleStore::new(None)))
    }

    fn rule(
        text: &str,
        priority: u32,
        enforcement: EnforcementLevel,
        triggers: &[&str],
    ) -> SessionRule {
        SessionRule::new(text, RuleType::Workflow, priority, RuleScope::Project, enforcement)
            .with_triggers(triggers.iter().map(|t| t.to_string()).collect())
    }

    #[tokio::test]
    async fn hard_block_blocks_and_invalidates() {
        let engine = engine();
        engine
            .store()
            .create_rule(rule(
                "never create artifacts without approval",
                10,
                EnforcementLevel::HardBlock,
                &["artifact_create"],
            ))
            .await
            .unwrap();

        let action = ProposedAction::new(
            "artifact_create_file",
            "write the quarterly report",
            RiskLevel::High,
        );

        let results = engine.enforce(&action).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].outcome, EnforcementOutcome::Blocked);
        assert!(results[0].message.is_some());

        let validation = engine.validate_action(&action).await;
        assert!(!validation.valid);
    }

    #[tokio::test]
    async fn nothing_evaluates_after_first_block() {
        let engine = engine();
        engine
            .store()
            .create_rule(rule("block it", 10, EnforcementLevel::HardBlock, &["deploy"]))
            .await
            .unwrap();
        let later = engine
            .store()
            .create_rule(rule("remind me", 20, EnforcementLevel::Reminder, &["deploy"]))
            .await
            .unwrap();

        let action = ProposedAction::new("deploy_service", "push to prod", RiskLevel::High);
        let results = engine.enforce(&action).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].outcome, EnforcementOutcome::Blocked);
        // The later rule never ran
        assert_eq!(engine.store().get_rule(&later.id).await.unwrap().usage_count, 0);
    }

    #[tokio::test]
    async fn multi_word_trigger_never_matches_across_fields() {
        let engine = engine();
        engine
            .store()
            .create_rule(rule(
                "note every file write",
                10,
                EnforcementLevel::Reminder,
                &["file write"],
            ))
            .await
            .unwrap();

        // "stage_file" + "write audit entry" only contain the phrase when the
        // two fields are glued together.
        let split = ProposedAction::new("stage_file", "write audit entry", RiskLevel::Low);
        assert!(engine.enforce(&split).await.is_empty());

        let within = ProposedAction::new("commit", "queue a file write for review", RiskLevel::Low);
        assert_eq!(engine.enforce(&within).await.len(), 1);
    }

    #[tokio::test]
    async fn rules_evaluate_ascending_by_priority() {
        let engine = engine();
        engine
            .store()
            .create_rule(rule("second", 20, EnforcementLevel::Reminder, &["commit"]))
            .await
            .unwrap();
        engine
            .store()
            .create_rule(rule("first", 10, EnforcementLevel::Reminder, &["commit"]))
            .await
            .unwrap();

        let action = ProposedAction::new("commit_changes", "save work", RiskLevel::Low);
        let results = engine.enforce(&action).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].message.as_deref(), Some("note: first"));
    }

    #[tokio::test]
    async fn inactive_rules_never_fire() {
        let engine = engine();
        let created = engine
            .store()
            .create_rule(rule("dormant", 10, EnforcementLevel::HardBlock, &["deploy"]))
            .await
            .unwrap();
        engine
            .store()
            .update_rule(
                &created.id,
                crate::types::RuleUpdate { active: Some(false), ..Default::default() },
            )
            .await
            .unwrap();

        let action = ProposedAction::new("deploy_service", "push to prod", RiskLevel::High);
        assert!(engine.enforce(&action).await.is_empty());
    }

    #[tokio::test]
    async fn soft_block_warns_with_alternatives() {
        let engine = engine();
        engine
            .store()
            .create_rule(rule("confirm deletes", 10, EnforcementLevel::SoftBlock, &["delete"]))
            .await
            .unwrap();

        let action = ProposedAction::new("delete_branch", "remove stale branch", RiskLevel::Medium);
        let results = engine.enforce(&action).await;
        assert_eq!(results[0].outcome, EnforcementOutcome::Warned);
        assert!(!results[0].alternatives.is_empty());
    }

    #[tokio::test]
    async fn log_only_allows_silently() {
        let engine = engine();
        engine
            .store()
            .create_rule(rule("observe pushes", 10, EnforcementLevel::LogOnly, &["push"]))
            .await
            .unwrap();

        let action = ProposedAction::new("push_commits", "sync remote", RiskLevel::Low);
        let results = engine.enforce(&action).await;
        assert_eq!(results[0].outcome, EnforcementOutcome::Allowed);
        assert!(results[0].message.is_none());
    }

    #[tokio::test]
    async fn matched_rules_bump_usage_and_log() {
        let engine = engine();
        let created = engine
            .store()
            .create_rule(rule("tracked", 10, EnforcementLevel::Reminder, &["merge"]))
            .await
            .unwrap();

        let action = ProposedAction::new("merge_branch", "merge feature work", RiskLevel::Low);
        engine.enforce(&action).await;

        assert_eq!(engine.store().get_rule(&created.id).await.unwrap().usage_count, 1);
        assert_eq!(engine.log().len(), 1);
    }

    #[tokio::test]
    async fn triggerless_approval_rule_matches_high_risk() {
        let engine = engine();
        let approval = SessionRule::new(
            "high-risk work needs approval",
            RuleType::Approval,
            10,
            RuleScope::User,
            EnforcementLevel::SoftBlock,
        );
        engine.store().create_rule(approval).await.unwrap();

        let risky = ProposedAction::new("rotate_keys", "rotate signing keys", RiskLevel::High);
        assert_eq!(engine.enforce(&risky).await.len(), 1);

        let tame = ProposedAction::new("read_file", "inspect a log", RiskLevel::Low);
        assert!(engine.enforce(&tame).await.is_empty());
    }

    #[tokio::test]
    async fn no_rules_high_risk_yields_refine_conditions() {
        let engine = engine();
        let action = ProposedAction::new("refactor_module", "rework auth", RiskLevel::High);

        let validation = engine.validate_action(&action).await;
        assert!(validation.valid);
        assert!(validation
            .suggestions
            .iter()
            .any(|s| s.kind == SuggestionKind::RefineConditions));
        assert_eq!(
            validation.estimated_effectiveness,
            effectiveness::DEFAULT_EFFECTIVENESS
        );
    }

    #[tokio::test]
    async fn warned_and_blocked_pair_reports_contradiction() {
        let engine = engine();
        engine
            .store()
            .create_rule(rule("warn on deploys", 10, EnforcementLevel::SoftBlock, &["deploy"]))
            .await
            .unwrap();
        engine
            .store()
            .create_rule(rule("block deploys", 20, EnforcementLevel::HardBlock, &["deploy"]))
            .await
            .unwrap();

        let action = ProposedAction::new("deploy_service", "ship release", RiskLevel::High);
        let validation = engine.validate_action(&action).await;

        assert!(!validation.valid);
        assert!(validation
            .conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::Contradictory));
    }

    #[tokio::test]
    async fn estimated_effectiveness_is_mean_of_fired() {
        let engine = engine();
        let mut strong = rule("strong", 10, EnforcementLevel::Reminder, &["commit"]);
        strong.effectiveness = Some(0.9);
        let mut weak = rule("weak", 20, EnforcementLevel::Reminder, &["commit"]);
        weak.effectiveness = Some(0.3);
        engine.store().create_rule(strong).await.unwrap();
        engine.store().create_rule(weak).await.unwrap();

        let action = ProposedAction::new("commit_changes", "save work", RiskLevel::Low);
        let validation = engine.validate_action(&action).await;
        assert!((validation.estimated_effectiveness - 0.6).abs() < 1e-9);
    }
}
