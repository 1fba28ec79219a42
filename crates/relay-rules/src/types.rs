use chrono::Utc;
use serde::{Deserialize, Serialize};

use relay_core::ids::RuleId;

/// What a rule governs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Workflow,
    Approval,
    Architecture,
    Documentation,
}

/// Where a rule applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    User,
    Project,
    Global,
}

/// How strictly a rule constrains a matching action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementLevel {
    HardBlock,
    SoftBlock,
    Reminder,
    Suggestion,
    LogOnly,
}

impl std::fmt::Display for EnforcementLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HardBlock => write!(f, "hard_block"),
            Self::SoftBlock => write!(f, "soft_block"),
            Self::Reminder => write!(f, "reminder"),
            Self::Suggestion => write!(f, "suggestion"),
            Self::LogOnly => write!(f, "log_only"),
        }
    }
}

/// Outcome of evaluating one rule against one action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementOutcome {
    Allowed,
    Warned,
    Blocked,
}

/// How the user responded to a rule firing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserResponse {
    Complied,
    Overrode,
    ModifiedRule,
    DisabledRule,
}

/// A persisted, prioritized session rule. Lower priority value means higher
/// precedence. Counters and effectiveness mutate on every enforcement pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRule {
    pub id: RuleId,
    /// The rule text itself.
    pub rule: String,
    pub rule_type: RuleType,
    pub priority: u32,
    pub active: bool,
    pub scope: RuleScope,
    pub enforcement: EnforcementLevel,
    /// Keywords matched case-insensitively against action type/description.
    /// Empty triggers fall back to per-type heuristics.
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub conditions: serde_json::Value,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default)]
    pub violation_count: u64,
    /// Learned effectiveness in [0,1]. `None` means never scored (0.5).
    pub effectiveness: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

impl SessionRule {
    pub fn new(
        rule: impl Into<String>,
        rule_type: RuleType,
        priority: u32,
        scope: RuleScope,
        enforcement: EnforcementLevel,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: RuleId::new(),
            rule: rule.into(),
            rule_type,
            priority,
            active: true,
            scope,
            enforcement,
            triggers: Vec::new(),
            conditions: serde_json::Value::Null,
            usage_count: 0,
            violation_count: 0,
            effectiveness: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn with_triggers(mut self, triggers: Vec<String>) -> Self {
        self.triggers = triggers;
        self
    }

    pub fn effectiveness_or_default(&self) -> f64 {
        self.effectiveness
            .unwrap_or(crate::effectiveness::DEFAULT_EFFECTIVENESS)
    }
}

/// Partial update applied by `update_rule`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RuleUpdate {
    pub rule: Option<String>,
    pub priority: Option<u32>,
    pub active: Option<bool>,
    pub scope: Option<RuleScope>,
    pub enforcement: Option<EnforcementLevel>,
    pub triggers: Option<Vec<String>>,
    pub conditions: Option<serde_json::Value>,
}

/// Result of one rule firing during an enforcement pass. Ephemeral: logged,
/// never stored as an entity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleEnforcementResult {
    pub rule_id: RuleId,
    pub action_type: String,
    pub outcome: EnforcementOutcome,
    pub message: Option<String>,
    /// Suggested alternatives (soft blocks only).
    #[serde(default)]
    pub alternatives: Vec<String>,
    pub timestamp: String,
}

/// A recorded violation of a rule, driving effectiveness recalculation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleViolation {
    pub rule_id: RuleId,
    pub action: String,
    pub violation_type: String,
    pub user_response: UserResponse,
    #[serde(default)]
    pub context: serde_json::Value,
    pub timestamp: String,
}

impl RuleViolation {
    pub fn new(rule_id: RuleId, action: impl Into<String>, user_response: UserResponse) -> Self {
        Self {
            rule_id,
            action: action.into(),
            violation_type: "rule_fired".into(),
            user_response,
            context: serde_json::Value::Null,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    Contradictory,
    Redundant,
}

/// Reported, never raised: conflicting enforcement is informational.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleConflict {
    pub kind: ConflictKind,
    pub rule_ids: Vec<RuleId>,
    pub detail: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    MergeRules,
    DecomposeRule,
    ReviewStrictness,
    PromoteEnforcement,
    RefineConditions,
    ReviseEnforcement,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OptimizationSuggestion {
    pub kind: SuggestionKind,
    pub rule_ids: Vec<RuleId>,
    pub detail: String,
}

/// Overall verdict from `validate_action`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionValidation {
    /// True when no rule blocked the action.
    pub valid: bool,
    pub conflicts: Vec<RuleConflict>,
    pub suggestions: Vec<OptimizationSuggestion>,
    /// Mean effectiveness of the rules that fired (0.5 when none fired).
    pub estimated_effectiveness: f64,
}

/// A machine-drafted rule synthesized from an observed behavior pattern.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleDraft {
    pub rule: String,
    pub rule_type: RuleType,
    pub enforcement: EnforcementLevel,
    pub triggers: Vec<String>,
    pub confidence: f64,
}
