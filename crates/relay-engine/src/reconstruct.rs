//! Context reconstruction from a persisted handoff.
//!
//! Reconstruction is best-effort by design: it fails only when the handoff
//! cannot be found in the memory store AND no other collaborator is around to
//! attempt partial recovery. Everything else degrades into the completeness
//! ratios.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use relay_clients::codec;
use relay_clients::set::CollaboratorSet;
use relay_core::collaborator::Collaborator;
use relay_core::errors::CoordinationError;
use relay_core::ids::{ContextId, HandoffId};

use crate::handoff::{HandoffPackage, HANDOFF_ENTITY_KIND};

/// Result of rehydrating a session from a handoff.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconstructedContext {
    pub context_id: ContextId,
    pub source_handoff_id: HandoffId,
    /// Per-collaborator recovered state; `None` for collaborators that were
    /// never configured or whose recovery failed.
    pub recovered: BTreeMap<Collaborator, Option<serde_json::Value>>,
    /// Successful recoveries over recoveries attempted.
    pub completeness: f64,
    /// Successful recoveries over all five designed collaborators.
    pub overall_completeness: f64,
    pub missing_elements: Vec<Collaborator>,
    pub reconstruction_time_ms: u64,
    pub reconstructed_at: String,
}

pub struct ContextReconstructor {
    set: CollaboratorSet,
}

impl ContextReconstructor {
    pub fn new(set: CollaboratorSet) -> Self {
        Self { set }
    }

    pub async fn reconstruct(
        &self,
        handoff_id: &HandoffId,
    ) -> Result<ReconstructedContext, CoordinationError> {
        let start = Instant::now();

        let package = self.load_package(handoff_id).await;
        if package.is_none() && self.set.available_count() == 0 {
            return Err(CoordinationError::NotFound(format!(
                "handoff {handoff_id} unfindable and no collaborator available for partial recovery"
            )));
        }
        if package.is_none() {
            warn!(handoff_id = %handoff_id, "handoff record missing; attempting partial recovery");
        }

        let attempts = join_all(
            Collaborator::ALL
                .into_iter()
                .map(|c| self.recover(c, package.as_ref())),
        )
        .await;

        let recovered: BTreeMap<Collaborator, Option<serde_json::Value>> =
            Collaborator::ALL.into_iter().zip(attempts).collect();

        let attempted = Collaborator::ALL
            .into_iter()
            .filter(|c| self.set.is_available(*c))
            .count();
        let successful = recovered.values().filter(|v| v.is_some()).count();

        let missing_elements: Vec<Collaborator> = Collaborator::ALL
            .into_iter()
            .filter(|c| recovered[c].is_none())
            .collect();

        let context = ReconstructedContext {
            context_id: ContextId::new(),
            source_handoff_id: handoff_id.clone(),
            recovered,
            completeness: ratio(successful, attempted),
            overall_completeness: ratio(successful, Collaborator::ALL.len()),
            missing_elements,
            reconstruction_time_ms: u64::try_from(start.elapsed().as_millis())
                .unwrap_or(u64::MAX),
            reconstructed_at: Utc::now().to_rfc3339(),
        };

        info!(
            handoff_id = %handoff_id,
            completeness = context.completeness,
            overall = context.overall_completeness,
            "context reconstructed"
        );
        Ok(context)
    }

    async fn load_package(&self, handoff_id: &HandoffId) -> Option<HandoffPackage> {
        let memory = self.set.memory.as_ref()?;
        let name = codec::entity_name(HANDOFF_ENTITY_KIND, handoff_id.as_str());
        let entities = match memory.search_nodes(&name).await {
            Ok(entities) => entities,
            Err(e) => {
                warn!(handoff_id = %handoff_id, error = %e, "handoff lookup failed");
                return None;
            }
        };
        let entity = entities.iter().find(|e| e.name == name)?;
        match codec::decode(entity) {
            Ok(package) => Some(package),
            Err(e) => {
                warn!(handoff_id = %handoff_id, error = %e, "handoff record malformed");
                None
            }
        }
    }

    async fn recover(
        &self,
        collaborator: Collaborator,
        package: Option<&HandoffPackage>,
    ) -> Option<serde_json::Value> {
        match collaborator {
            Collaborator::Memory => {
                let client = self.set.memory.as_ref()?;
                match client.read_graph().await {
                    Ok(graph) => Some(json!({
                        "entity_count": graph.entities.len(),
                        "relation_count": graph.relations.len(),
                    })),
                    Err(e) => {
                        warn!(collaborator = %collaborator, error = %e, "recovery failed");
                        None
                    }
                }
            }
            Collaborator::Checkpoint => {
                let client = self.set.checkpoint.as_ref()?;
                let target = package
                    .and_then(|p| p.checkpoint.captured())
                    .map(|c| c.checkpoint.id.clone());
                match client.list_checkpoints().await {
                    Ok(checkpoints) => {
                        let matched = target
                            .as_ref()
                            .map(|id| checkpoints.iter().any(|c| &c.id == id))
                            .unwrap_or(false);
                        Some(json!({
                            "checkpoint_count": checkpoints.len(),
                            "handoff_checkpoint_present": matched,
                        }))
                    }
                    Err(e) => {
                        warn!(collaborator = %collaborator, error = %e, "recovery failed");
                        None
                    }
                }
            }
            Collaborator::Filesystem => {
                let client = self.set.filesystem.as_ref()?;
                match client.list_allowed_roots().await {
                    Ok(roots) => Some(json!({ "allowed_roots": roots })),
                    Err(e) => {
                        warn!(collaborator = %collaborator, error = %e, "recovery failed");
                        None
                    }
                }
            }
            Collaborator::VersionControl => {
                let client = self.set.version_control.as_ref()?;
                match client.status().await {
                    Ok(status) => {
                        let branch_matches = package
                            .and_then(|p| p.version_control.captured())
                            .map(|captured| captured.branch == status.branch);
                        Some(json!({
                            "branch": status.branch,
                            "clean": status.clean,
                            "branch_matches_handoff": branch_matches,
                        }))
                    }
                    Err(e) => {
                        warn!(collaborator = %collaborator, error = %e, "recovery failed");
                        None
                    }
                }
            }
            Collaborator::Analytics => {
                let client = self.set.analytics.as_ref()?;
                match client.health_check().await {
                    Ok(()) => Some(json!({ "healthy": true })),
                    Err(e) => {
                        warn!(collaborator = %collaborator, error = %e, "recovery failed");
                        None
                    }
                }
            }
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
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

    use crate::handoff::HandoffBuilder;

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
    async fn full_recovery_has_both_ratios_at_one() {
        let (_, set) = full_set();
        let package = HandoffBuilder::new(set.clone()).build().await;

        let context = ContextReconstructor::new(set)
            .reconstruct(&package.handoff_id)
            .await
            .unwrap();

        assert_eq!(context.completeness, 1.0);
        assert_eq!(context.overall_completeness, 1.0);
        assert!(context.missing_elements.is_empty());
        assert_eq!(context.recovered.len(), 5);
        assert_eq!(
            context.recovered[&Collaborator::Checkpoint]
                .as_ref()
                .unwrap()["handoff_checkpoint_present"],
            true
        );
    }

    #[tokio::test]
    async fn partial_set_separates_the_two_ratios() {
        // Only memory and filesystem configured: attempted = 2, designed = 5
        let memory = Arc::new(InMemoryMemory::new());
        let set = CollaboratorSet::new()
            .with_memory(memory)
            .with_filesystem(Arc::new(StaticFilesystem::new(vec![])));

        let package = HandoffBuilder::new(set.clone()).build().await;
        let context = ContextReconstructor::new(set)
            .reconstruct(&package.handoff_id)
            .await
            .unwrap();

        assert_eq!(context.completeness, 1.0);
        assert!((context.overall_completeness - 0.4).abs() < 1e-9);
        assert_eq!(context.missing_elements.len(), 3);
    }

    #[tokio::test]
    async fn unknown_handoff_with_no_collaborators_is_not_found() {
        let reconstructor = ContextReconstructor::new(CollaboratorSet::new());
        let err = reconstructor
            .reconstruct(&HandoffId::from_raw("handoff_missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinationError::NotFound(_)));
    }

    #[tokio::test]
    async fn unknown_handoff_with_collaborators_recovers_partially() {
        let (_, set) = full_set();
        let context = ContextReconstructor::new(set)
            .reconstruct(&HandoffId::from_raw("handoff_missing"))
            .await
            .unwrap();

        // No handoff record, but live collaborators still rehydrate
        assert_eq!(context.completeness, 1.0);
        assert_eq!(
            context.recovered[&Collaborator::Checkpoint]
                .as_ref()
                .unwrap()["handoff_checkpoint_present"],
            false
        );
    }

    #[tokio::test]
    async fn failed_recovery_counts_as_missing() {
        let (memory, set) = full_set();
        let package = HandoffBuilder::new(set.clone()).build().await;
        memory.set_failing(true);

        let context = ContextReconstructor::new(set)
            .reconstruct(&package.handoff_id)
            .await
            .unwrap();

        assert!(context.missing_elements.contains(&Collaborator::Memory));
        assert!((context.completeness - 0.8).abs() < 1e-9);
        assert!((context.overall_completeness - 0.8).abs() < 1e-9);
    }
}
