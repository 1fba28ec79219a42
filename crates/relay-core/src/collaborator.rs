use serde::{Deserialize, Serialize};

/// The five backing services relay coordinates. Each is independently
/// operated and may be unavailable at any time.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collaborator {
    /// Knowledge-graph store (entities + relations).
    Memory,
    /// Code-checkpointing service.
    Checkpoint,
    /// Filesystem-access service.
    Filesystem,
    /// Version-control service.
    VersionControl,
    /// Relational-analytics stores.
    Analytics,
}

impl Collaborator {
    /// Every collaborator the system is designed around, whether configured
    /// or not. Denominator for overall-completeness and health percentages.
    pub const ALL: [Collaborator; 5] = [
        Collaborator::Memory,
        Collaborator::Checkpoint,
        Collaborator::Filesystem,
        Collaborator::VersionControl,
        Collaborator::Analytics,
    ];

    /// Fixed cross-collaborator sync order.
    pub const SYNC_ORDER: [Collaborator; 5] = [
        Collaborator::Memory,
        Collaborator::Analytics,
        Collaborator::Filesystem,
        Collaborator::VersionControl,
        Collaborator::Checkpoint,
    ];
}

impl std::fmt::Display for Collaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Checkpoint => write!(f, "checkpoint"),
            Self::Filesystem => write!(f, "filesystem"),
            Self::VersionControl => write!(f, "version_control"),
            Self::Analytics => write!(f, "analytics"),
        }
    }
}

impl std::str::FromStr for Collaborator {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "checkpoint" => Ok(Self::Checkpoint),
            "filesystem" => Ok(Self::Filesystem),
            "version_control" => Ok(Self::VersionControl),
            "analytics" => Ok(Self::Analytics),
            other => Err(format!("unknown collaborator: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_from_str_roundtrip() {
        for c in Collaborator::ALL {
            let s = c.to_string();
            let parsed: Collaborator = s.parse().unwrap();
            assert_eq!(c, parsed);
        }
    }

    #[test]
    fn sync_order_covers_all() {
        for c in Collaborator::ALL {
            assert!(Collaborator::SYNC_ORDER.contains(&c));
        }
    }

    #[test]
    fn sync_order_starts_with_memory() {
        assert_eq!(Collaborator::SYNC_ORDER[0], Collaborator::Memory);
        assert_eq!(Collaborator::SYNC_ORDER[4], Collaborator::Checkpoint);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&Collaborator::VersionControl).unwrap();
        assert_eq!(json, "\"version_control\"");
    }
}
