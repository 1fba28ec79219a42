use serde::{Deserialize, Serialize};

/// Risk attributed to a proposed action by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown risk level: {other}")),
        }
    }
}

/// An action the host proposes to take, evaluated against session rules.
/// Input only; never persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProposedAction {
    /// Machine-readable action type, e.g. `"artifact_create_file"`.
    pub action_type: String,
    /// Human-readable description of intent.
    pub description: String,
    pub risk_level: RiskLevel,
    /// Free-form host context.
    #[serde(default)]
    pub context: serde_json::Value,
}

impl ProposedAction {
    pub fn new(action_type: impl Into<String>, description: impl Into<String>, risk_level: RiskLevel) -> Self {
        Self {
            action_type: action_type.into(),
            description: description.into(),
            risk_level,
            context: serde_json::Value::Null,
        }
    }
}

/// A behavior observed repeatedly enough to justify drafting a rule from it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BehaviorPattern {
    pub description: String,
    /// How many times the behavior was observed.
    pub frequency: u32,
    #[serde(default)]
    pub example_actions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_roundtrip() {
        for level in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High] {
            let parsed: RiskLevel = level.to_string().parse().unwrap();
            assert_eq!(level, parsed);
        }
    }

    #[test]
    fn action_defaults_null_context() {
        let action = ProposedAction::new("refactor_module", "restructure parser", RiskLevel::Medium);
        assert!(action.context.is_null());
    }

    #[test]
    fn action_serde_roundtrip() {
        let action = ProposedAction::new("artifact_create_file", "write report", RiskLevel::High);
        let json = serde_json::to_string(&action).unwrap();
        let parsed: ProposedAction = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.action_type, "artifact_create_file");
        assert_eq!(parsed.risk_level, RiskLevel::High);
    }
}
