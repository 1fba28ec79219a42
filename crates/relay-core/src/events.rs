use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::collaborator::Collaborator;
use crate::ids::EventId;

/// What happened in the host session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SessionStart,
    SessionEnd,
    FileChanged,
    CheckpointCreated,
    CollaboratorFailure,
    RuleViolationObserved,
}

/// An event reported by the host for coordination.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrchestratorEvent {
    pub id: EventId,
    pub kind: EventKind,
    pub detail: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub occurred_at: String,
}

impl OrchestratorEvent {
    pub fn new(kind: EventKind, detail: impl Into<String>) -> Self {
        Self {
            id: EventId::new(),
            kind,
            detail: detail.into(),
            payload: serde_json::Value::Null,
            occurred_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// What the orchestrator decided in response to an event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventOutcome {
    /// Human-readable actions the orchestrator took or recommends.
    pub actions: Vec<String>,
    /// Whether cross-collaborator coordination should run soon.
    pub coordination_needed: bool,
    /// Collaborators whose state should be resynced.
    pub resync: Vec<Collaborator>,
    /// Seconds until the next ecosystem check.
    pub next_check_interval_secs: u64,
}
