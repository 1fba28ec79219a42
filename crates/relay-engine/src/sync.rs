//! Cross-collaborator state synchronization.
//!
//! Sync runs in a fixed order (memory, analytics, filesystem,
//! version-control, checkpoint) with each step individually fault-isolated:
//! one step failing is recorded in that step's result and the remaining
//! steps still run.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use relay_clients::codec;
use relay_clients::set::CollaboratorSet;
use relay_clients::traits::{Checkpoint, Relation};
use relay_core::collaborator::Collaborator;
use relay_core::errors::CoordinationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    Failed,
    Skipped,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncStepResult {
    pub collaborator: Collaborator,
    pub status: SyncStatus,
    pub operations: Vec<String>,
    pub error: Option<String>,
}

impl SyncStepResult {
    fn synced(collaborator: Collaborator, operations: Vec<String>) -> Self {
        Self {
            collaborator,
            status: SyncStatus::Synced,
            operations,
            error: None,
        }
    }

    fn failed(collaborator: Collaborator, error: String) -> Self {
        Self {
            collaborator,
            status: SyncStatus::Failed,
            operations: Vec::new(),
            error: Some(error),
        }
    }

    fn skipped(collaborator: Collaborator) -> Self {
        Self {
            collaborator,
            status: SyncStatus::Skipped,
            operations: Vec::new(),
            error: None,
        }
    }
}

/// Always contains all five steps in the fixed sync order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncReport {
    pub steps: Vec<SyncStepResult>,
    pub started_at: String,
    pub completed_at: String,
}

impl SyncReport {
    pub fn synced_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == SyncStatus::Synced)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == SyncStatus::Failed)
            .count()
    }
}

/// A conversation checkpoint plus the sync pass that accompanied it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckpointCoordination {
    pub checkpoint: Checkpoint,
    pub report: SyncReport,
}

pub struct StateSynchronizer {
    set: CollaboratorSet,
}

impl StateSynchronizer {
    pub fn new(set: CollaboratorSet) -> Self {
        Self { set }
    }

    /// Run a full sync pass. Infallible: failures land in the per-step
    /// results.
    pub async fn sync(&self) -> SyncReport {
        let started_at = Utc::now().to_rfc3339();
        let mut steps = Vec::with_capacity(Collaborator::SYNC_ORDER.len());

        for collaborator in Collaborator::SYNC_ORDER {
            let step = self.sync_step(collaborator).await;
            if step.status == SyncStatus::Failed {
                warn!(
                    collaborator = %collaborator,
                    error = step.error.as_deref().unwrap_or(""),
                    "sync step failed; continuing"
                );
            }
            steps.push(step);
        }

        let report = SyncReport {
            steps,
            started_at,
            completed_at: Utc::now().to_rfc3339(),
        };
        info!(
            synced = report.synced_count(),
            failed = report.failed_count(),
            "sync pass complete"
        );
        report
    }

    async fn sync_step(&self, collaborator: Collaborator) -> SyncStepResult {
        match collaborator {
            Collaborator::Memory => {
                let Some(client) = &self.set.memory else {
                    return SyncStepResult::skipped(collaborator);
                };
                match client.read_graph().await {
                    Ok(graph) => SyncStepResult::synced(
                        collaborator,
                        vec![format!(
                            "verified knowledge graph ({} entities)",
                            graph.entities.len()
                        )],
                    ),
                    Err(e) => SyncStepResult::failed(collaborator, e.to_string()),
                }
            }
            Collaborator::Analytics => {
                let Some(client) = &self.set.analytics else {
                    return SyncStepResult::skipped(collaborator);
                };
                match client.health_check().await {
                    Ok(()) => SyncStepResult::synced(
                        collaborator,
                        vec!["analytics stores answering".into()],
                    ),
                    Err(e) => SyncStepResult::failed(collaborator, e.to_string()),
                }
            }
            Collaborator::Filesystem => {
                let Some(client) = &self.set.filesystem else {
                    return SyncStepResult::skipped(collaborator);
                };
                match client.list_allowed_roots().await {
                    Ok(roots) => SyncStepResult::synced(
                        collaborator,
                        vec![format!("confirmed {} allowed roots", roots.len())],
                    ),
                    Err(e) => SyncStepResult::failed(collaborator, e.to_string()),
                }
            }
            Collaborator::VersionControl => {
                let Some(client) = &self.set.version_control else {
                    return SyncStepResult::skipped(collaborator);
                };
                match client.status().await {
                    Ok(status) => SyncStepResult::synced(
                        collaborator,
                        vec![format!(
                            "captured status of branch {} ({} changed files)",
                            status.branch,
                            status.changed_files.len()
                        )],
                    ),
                    Err(e) => SyncStepResult::failed(collaborator, e.to_string()),
                }
            }
            Collaborator::Checkpoint => {
                let Some(client) = &self.set.checkpoint else {
                    return SyncStepResult::skipped(collaborator);
                };
                match client.list_checkpoints().await {
                    Ok(checkpoints) => SyncStepResult::synced(
                        collaborator,
                        vec![format!("enumerated {} checkpoints", checkpoints.len())],
                    ),
                    Err(e) => SyncStepResult::failed(collaborator, e.to_string()),
                }
            }
        }
    }

    /// Create a conversation checkpoint, link it into the knowledge graph
    /// (best-effort) and run a sync pass. Fails only when the checkpointing
    /// collaborator is absent or refuses the checkpoint.
    pub async fn coordinate_conversation_checkpoint(
        &self,
        label: &str,
        description: &str,
    ) -> Result<CheckpointCoordination, CoordinationError> {
        let client = self.set.checkpoint.as_ref().ok_or_else(|| {
            CoordinationError::unavailable(Collaborator::Checkpoint, "not configured")
        })?;

        let checkpoint = client
            .create_checkpoint(label, description)
            .await
            .map_err(|e| CoordinationError::unavailable(Collaborator::Checkpoint, e.to_string()))?;

        self.link_checkpoint(&checkpoint).await;
        let report = self.sync().await;

        Ok(CheckpointCoordination { checkpoint, report })
    }

    async fn link_checkpoint(&self, checkpoint: &Checkpoint) {
        let Some(memory) = &self.set.memory else {
            return;
        };
        let entity = match codec::encode("Checkpoint", checkpoint.id.as_str(), checkpoint) {
            Ok(entity) => entity,
            Err(e) => {
                warn!(checkpoint_id = %checkpoint.id, error = %e, "checkpoint encode failed");
                return;
            }
        };
        let name = entity.name.clone();
        if let Err(e) = memory.create_entities(vec![entity]).await {
            warn!(checkpoint_id = %checkpoint.id, error = %e, "checkpoint link failed");
            return;
        }
        let relation = Relation {
            from: "Session_current".into(),
            to: name,
            relation_type: "checkpointed_as".into(),
        };
        if let Err(e) = memory.create_relations(vec![relation]).await {
            warn!(checkpoint_id = %checkpoint.id, error = %e, "checkpoint relation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use relay_clients::memory::{
        InMemoryCheckpoint, InMemoryMemory, StaticFilesystem, StaticVersionControl,
    };
    use relay_clients::sqlite::SqliteAnalytics;
    use relay_clients::traits::MemoryClient;

    fn full_set() -> (Arc<InMemoryMemory>, CollaboratorSet) {
        let memory = Arc::new(InMemoryMemory::new());
        let set = CollaboratorSet::new()
            .with_memory(memory.clone())
            .with_checkpoint(Arc::new(InMemoryCheckpoint::new()))
            .with_filesystem(Arc::new(StaticFilesystem::new(vec!["/workspace".into()])))
            .with_version_control(Arc::new(StaticVersionControl::on_branch("main")))
            .with_analytics(Arc::new(SqliteAnalytics::in_memory().unwrap()));
        (memory, set)
    }

    #[tokio::test]
    async fn report_covers_all_steps_in_fixed_order() {
        let (_, set) = full_set();
        let report = StateSynchronizer::new(set).sync().await;

        let order: Vec<Collaborator> = report.steps.iter().map(|s| s.collaborator).collect();
        assert_eq!(order, Collaborator::SYNC_ORDER.to_vec());
        assert_eq!(report.synced_count(), 5);
        assert_eq!(report.failed_count(), 0);
    }

    #[tokio::test]
    async fn early_failure_does_not_stop_later_steps() {
        let (memory, set) = full_set();
        memory.set_failing(true);

        let report = StateSynchronizer::new(set).sync().await;

        // Memory is the first step and it failed
        assert_eq!(report.steps[0].collaborator, Collaborator::Memory);
        assert_eq!(report.steps[0].status, SyncStatus::Failed);
        assert!(report.steps[0].error.is_some());
        // Every later step still ran and synced
        for step in &report.steps[1..] {
            assert_eq!(step.status, SyncStatus::Synced, "{:?}", step.collaborator);
        }
    }

    #[tokio::test]
    async fn unconfigured_collaborators_are_skipped_not_failed() {
        let set = CollaboratorSet::new().with_memory(Arc::new(InMemoryMemory::new()));
        let report = StateSynchronizer::new(set).sync().await;

        assert_eq!(report.steps[0].status, SyncStatus::Synced);
        assert!(report.steps[1..]
            .iter()
            .all(|s| s.status == SyncStatus::Skipped));
        assert_eq!(report.failed_count(), 0);
    }

    #[tokio::test]
    async fn conversation_checkpoint_links_into_graph() {
        let (memory, set) = full_set();
        let coordination = StateSynchronizer::new(set)
            .coordinate_conversation_checkpoint("end of discussion", "wrapping up")
            .await
            .unwrap();

        assert_eq!(coordination.checkpoint.label, "end of discussion");
        assert_eq!(coordination.report.synced_count(), 5);

        let name = format!("Checkpoint_{}", coordination.checkpoint.id);
        let entities = memory.search_nodes(&name).await.unwrap();
        assert_eq!(entities.len(), 1);
        let graph = memory.read_graph().await.unwrap();
        assert!(graph
            .relations
            .iter()
            .any(|r| r.to == name && r.relation_type == "checkpointed_as"));
    }

    #[tokio::test]
    async fn conversation_checkpoint_without_client_is_unavailable() {
        let synchronizer = StateSynchronizer::new(CollaboratorSet::new());
        let err = synchronizer
            .coordinate_conversation_checkpoint("x", "y")
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinationError::Unavailable { .. }));
    }
}
