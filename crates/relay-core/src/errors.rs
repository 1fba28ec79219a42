use crate::collaborator::Collaborator;

/// Typed error hierarchy for coordination operations.
///
/// Only two call sites treat an error as terminal: mutating an unknown rule
/// and reconstructing an unfindable handoff. Everything else degrades into
/// results carrying explicit placeholder/missing markers.
#[derive(Clone, Debug, thiserror::Error)]
pub enum CoordinationError {
    /// A rule, handoff or project entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A collaborator could not be reached. Always recoverable by degrading.
    #[error("{collaborator} unavailable: {reason}")]
    Unavailable {
        collaborator: Collaborator,
        reason: String,
    },

    /// A persisted entity failed to parse. Bulk loads skip these and warn.
    #[error("malformed entity {name}: {reason}")]
    MalformedEntity { name: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    /// A backing-store write failed partway. The message carries enough to
    /// recover by hand.
    #[error("store error: {0}")]
    Store(String),
}

impl CoordinationError {
    /// Whether the caller should degrade rather than fail.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::MalformedEntity { .. }
        )
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Unavailable { .. } => "unavailable",
            Self::MalformedEntity { .. } => "malformed_entity",
            Self::Serialization(_) => "serialization",
            Self::Store(_) => "store",
        }
    }

    pub fn unavailable(collaborator: Collaborator, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            collaborator,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for CoordinationError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        assert!(CoordinationError::unavailable(Collaborator::Memory, "down").is_recoverable());
        assert!(CoordinationError::MalformedEntity {
            name: "SessionRule_x".into(),
            reason: "bad json".into(),
        }
        .is_recoverable());
    }

    #[test]
    fn terminal_classification() {
        assert!(!CoordinationError::NotFound("rule_x".into()).is_recoverable());
        assert!(!CoordinationError::Store("delete ok, create failed".into()).is_recoverable());
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(CoordinationError::NotFound("x".into()).error_kind(), "not_found");
        assert_eq!(
            CoordinationError::unavailable(Collaborator::Analytics, "refused").error_kind(),
            "unavailable"
        );
    }

    #[test]
    fn unavailable_names_collaborator() {
        let e = CoordinationError::unavailable(Collaborator::VersionControl, "no socket");
        assert!(e.to_string().contains("version_control"));
    }
}
