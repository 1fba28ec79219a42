//! Effectiveness learning, rule optimization, and rule drafting.

use relay_core::action::BehaviorPattern;

use crate::types::{
    EnforcementLevel, OptimizationSuggestion, RuleDraft, RuleType, SessionRule, SuggestionKind,
    UserResponse,
};

/// Starting score for a rule that has never been responded to.
pub const DEFAULT_EFFECTIVENESS: f64 = 0.5;

/// Effectiveness below this after enough uses flags an enforcement change.
const LOW_EFFECTIVENESS: f64 = 0.3;
const MIN_USES_FOR_OPTIMIZATION: u64 = 5;

/// Pair similarity above this flags a merge candidate.
const MERGE_SIMILARITY: f64 = 0.8;

/// Patterns observed at least this often produce a draft rule.
const MIN_PATTERN_FREQUENCY: u32 = 3;

/// Recalculate effectiveness from a user response.
///
/// Monotonic per response: `complied` never decreases the score and
/// `disabled_rule` always lands on exactly 0.
pub fn apply_response(current: Option<f64>, response: UserResponse) -> f64 {
    let current = current.unwrap_or(DEFAULT_EFFECTIVENESS);
    match response {
        UserResponse::Complied => (current + 0.1).min(1.0),
        UserResponse::Overrode => (current - 0.2).max(0.0),
        UserResponse::ModifiedRule => (current - 0.1).max(0.0),
        UserResponse::DisabledRule => 0.0,
    }
}

/// Flag enforcement-change candidates (low effectiveness after real use) and
/// merge candidates (highly similar pairs).
pub fn optimize(rules: &[SessionRule]) -> Vec<OptimizationSuggestion> {
    let mut suggestions = Vec::new();

    for rule in rules {
        if rule.usage_count > MIN_USES_FOR_OPTIMIZATION
            && rule.effectiveness_or_default() < LOW_EFFECTIVENESS
        {
            suggestions.push(OptimizationSuggestion {
                kind: SuggestionKind::ReviseEnforcement,
                rule_ids: vec![rule.id.clone()],
                detail: format!(
                    "rule '{}' scores {:.2} after {} uses; its enforcement level is not working",
                    rule.rule,
                    rule.effectiveness_or_default(),
                    rule.usage_count
                ),
            });
        }
    }

    for (i, a) in rules.iter().enumerate() {
        for b in &rules[i + 1..] {
            let similarity = rule_similarity(a, b);
            if similarity > MERGE_SIMILARITY {
                suggestions.push(OptimizationSuggestion {
                    kind: SuggestionKind::MergeRules,
                    rule_ids: vec![a.id.clone(), b.id.clone()],
                    detail: format!(
                        "rules '{}' and '{}' overlap (similarity {:.2}); consider merging",
                        a.rule, b.rule, similarity
                    ),
                });
            }
        }
    }

    suggestions
}

/// Mean of rule-text word overlap and trigger-set overlap, each Jaccard.
pub fn rule_similarity(a: &SessionRule, b: &SessionRule) -> f64 {
    (word_overlap(&a.rule, &b.rule) + trigger_overlap(&a.triggers, &b.triggers)) / 2.0
}

fn word_overlap(a: &str, b: &str) -> f64 {
    let words_a: std::collections::HashSet<String> =
        a.split_whitespace().map(|w| w.to_lowercase()).collect();
    let words_b: std::collections::HashSet<String> =
        b.split_whitespace().map(|w| w.to_lowercase()).collect();
    jaccard(&words_a, &words_b)
}

fn trigger_overlap(a: &[String], b: &[String]) -> f64 {
    let set_a: std::collections::HashSet<String> = a.iter().map(|t| t.to_lowercase()).collect();
    let set_b: std::collections::HashSet<String> = b.iter().map(|t| t.to_lowercase()).collect();
    jaccard(&set_a, &set_b)
}

fn jaccard(a: &std::collections::HashSet<String>, b: &std::collections::HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

/// Draft rules from behavior patterns observed often enough. Drafts start at
/// reminder enforcement; confidence scales with frequency, capped at 0.9.
pub fn suggest_new_rules(patterns: &[BehaviorPattern]) -> Vec<RuleDraft> {
    patterns
        .iter()
        .filter(|p| p.frequency >= MIN_PATTERN_FREQUENCY)
        .map(|p| RuleDraft {
            rule: p.description.clone(),
            rule_type: infer_rule_type(&p.description),
            enforcement: EnforcementLevel::Reminder,
            triggers: p.example_actions.iter().map(|a| a.to_lowercase()).collect(),
            confidence: (f64::from(p.frequency) / 10.0).min(0.9),
        })
        .collect()
}

fn infer_rule_type(description: &str) -> RuleType {
    let lower = description.to_lowercase();
    if ["review", "approval", "approve", "permission"]
        .iter()
        .any(|k| lower.contains(k))
    {
        RuleType::Approval
    } else if ["architecture", "design", "structure"]
        .iter()
        .any(|k| lower.contains(k))
    {
        RuleType::Architecture
    } else if ["document", "artifact", "readme"].iter().any(|k| lower.contains(k)) {
        RuleType::Documentation
    } else {
        RuleType::Workflow
    }
}
