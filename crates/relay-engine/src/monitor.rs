//! Ecosystem state monitoring.
//!
//! One concurrent probe per collaborator, each fault-isolated: an absent or
//! failing collaborator degrades that probe to an offline default and never
//! aborts its siblings.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use relay_clients::set::CollaboratorSet;
use relay_core::collaborator::Collaborator;

/// Fraction of the five designed collaborators that must be online for a
/// degraded (rather than unhealthy) verdict.
const DEGRADED_THRESHOLD: f64 = 0.6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Probe result for one collaborator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollaboratorState {
    pub online: bool,
    pub response_time_ms: Option<u64>,
    pub detail: String,
}

impl CollaboratorState {
    fn offline(detail: impl Into<String>) -> Self {
        Self {
            online: false,
            response_time_ms: None,
            detail: detail.into(),
        }
    }
}

/// Snapshot of the whole ecosystem at one instant.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EcosystemState {
    pub collaborators: BTreeMap<Collaborator, CollaboratorState>,
    pub health: CoordinationHealth,
    /// Mean over collaborators that reported a response time.
    pub average_response_ms: Option<u64>,
    pub checked_at: String,
}

impl EcosystemState {
    pub fn online_count(&self) -> usize {
        self.collaborators.values().filter(|s| s.online).count()
    }
}

pub struct EcosystemMonitor {
    set: CollaboratorSet,
}

impl EcosystemMonitor {
    pub fn new(set: CollaboratorSet) -> Self {
        Self { set }
    }

    /// Probe all five collaborators concurrently and classify overall health.
    pub async fn check(&self) -> EcosystemState {
        let (memory, checkpoint, filesystem, version_control, analytics) = tokio::join!(
            self.probe_memory(),
            self.probe_checkpoint(),
            self.probe_filesystem(),
            self.probe_version_control(),
            self.probe_analytics(),
        );
        let probes = [memory, checkpoint, filesystem, version_control, analytics];

        let collaborators: BTreeMap<Collaborator, CollaboratorState> =
            Collaborator::ALL.into_iter().zip(probes).collect();

        let online = collaborators.values().filter(|s| s.online).count();
        let health = classify(online, Collaborator::ALL.len());

        let times: Vec<u64> = collaborators
            .values()
            .filter_map(|s| s.response_time_ms)
            .collect();
        let average_response_ms = if times.is_empty() {
            None
        } else {
            Some(times.iter().sum::<u64>() / times.len() as u64)
        };

        debug!(online, ?health, "ecosystem checked");

        EcosystemState {
            collaborators,
            health,
            average_response_ms,
            checked_at: Utc::now().to_rfc3339(),
        }
    }

    async fn probe_memory(&self) -> CollaboratorState {
        let Some(client) = &self.set.memory else {
            return CollaboratorState::offline("not configured");
        };
        let start = Instant::now();
        match client.read_graph().await {
            Ok(graph) => CollaboratorState {
                online: true,
                response_time_ms: Some(elapsed_ms(start)),
                detail: format!(
                    "{} entities, {} relations",
                    graph.entities.len(),
                    graph.relations.len()
                ),
            },
            Err(e) => CollaboratorState::offline(e.to_string()),
        }
    }

    async fn probe_checkpoint(&self) -> CollaboratorState {
        let Some(client) = &self.set.checkpoint else {
            return CollaboratorState::offline("not configured");
        };
        let start = Instant::now();
        match client.list_checkpoints().await {
            Ok(checkpoints) => CollaboratorState {
                online: true,
                response_time_ms: Some(elapsed_ms(start)),
                detail: format!("{} checkpoints", checkpoints.len()),
            },
            Err(e) => CollaboratorState::offline(e.to_string()),
        }
    }

    async fn probe_filesystem(&self) -> CollaboratorState {
        let Some(client) = &self.set.filesystem else {
            return CollaboratorState::offline("not configured");
        };
        let start = Instant::now();
        match client.list_allowed_roots().await {
            Ok(roots) => CollaboratorState {
                online: true,
                response_time_ms: Some(elapsed_ms(start)),
                detail: format!("{} allowed roots", roots.len()),
            },
            Err(e) => CollaboratorState::offline(e.to_string()),
        }
    }

    async fn probe_version_control(&self) -> CollaboratorState {
        let Some(client) = &self.set.version_control else {
            return CollaboratorState::offline("not configured");
        };
        let start = Instant::now();
        match client.status().await {
            Ok(status) => CollaboratorState {
                online: true,
                response_time_ms: Some(elapsed_ms(start)),
                detail: format!(
                    "branch {}, {}",
                    status.branch,
                    if status.clean { "clean" } else { "dirty" }
                ),
            },
            Err(e) => CollaboratorState::offline(e.to_string()),
        }
    }

    async fn probe_analytics(&self) -> CollaboratorState {
        let Some(client) = &self.set.analytics else {
            return CollaboratorState::offline("not configured");
        };
        let start = Instant::now();
        match client.health_check().await {
            Ok(()) => CollaboratorState {
                online: true,
                response_time_ms: Some(elapsed_ms(start)),
                detail: "healthy".into(),
            },
            Err(e) => CollaboratorState::offline(e.to_string()),
        }
    }
}

fn classify(online: usize, total: usize) -> CoordinationHealth {
    if online == total {
        CoordinationHealth::Healthy
    } else if online as f64 >= total as f64 * DEGRADED_THRESHOLD {
        CoordinationHealth::Degraded
    } else {
        CoordinationHealth::Unhealthy
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use relay_clients::memory::{
        InMemoryCheckpoint, InMemoryMemory, StaticFilesystem, StaticVersionControl,
    };
    use relay_clients::sqlite::SqliteAnalytics;

    fn full_set() -> CollaboratorSet {
        CollaboratorSet::new()
            .with_memory(Arc::new(InMemoryMemory::new()))
            .with_checkpoint(Arc::new(InMemoryCheckpoint::new()))
            .with_filesystem(Arc::new(StaticFilesystem::new(vec!["/workspace".into()])))
            .with_version_control(Arc::new(StaticVersionControl::on_branch("main")))
            .with_analytics(Arc::new(SqliteAnalytics::in_memory().unwrap()))
    }

    #[tokio::test]
    async fn all_online_is_healthy() {
        let state = EcosystemMonitor::new(full_set()).check().await;
        assert_eq!(state.health, CoordinationHealth::Healthy);
        assert_eq!(state.online_count(), 5);
        assert_eq!(state.collaborators.len(), 5);
        assert!(state.average_response_ms.is_some());
    }

    #[tokio::test]
    async fn empty_set_is_unhealthy_with_all_probes_reported() {
        let state = EcosystemMonitor::new(CollaboratorSet::new()).check().await;
        assert_eq!(state.health, CoordinationHealth::Unhealthy);
        assert_eq!(state.online_count(), 0);
        // Every designed collaborator gets an entry even when unconfigured
        assert_eq!(state.collaborators.len(), 5);
        assert!(state.average_response_ms.is_none());
        assert_eq!(
            state.collaborators[&Collaborator::Memory].detail,
            "not configured"
        );
    }

    #[tokio::test]
    async fn four_of_five_is_degraded() {
        let set = CollaboratorSet::new()
            .with_memory(Arc::new(InMemoryMemory::new()))
            .with_checkpoint(Arc::new(InMemoryCheckpoint::new()))
            .with_filesystem(Arc::new(StaticFilesystem::new(vec![])))
            .with_version_control(Arc::new(StaticVersionControl::on_branch("main")));

        let state = EcosystemMonitor::new(set).check().await;
        assert_eq!(state.health, CoordinationHealth::Degraded);
        assert_eq!(state.online_count(), 4);
    }

    #[tokio::test]
    async fn failing_collaborator_degrades_without_aborting_siblings() {
        let memory = Arc::new(InMemoryMemory::new());
        memory.set_failing(true);
        let set = CollaboratorSet::new()
            .with_memory(memory)
            .with_checkpoint(Arc::new(InMemoryCheckpoint::new()))
            .with_filesystem(Arc::new(StaticFilesystem::new(vec![])))
            .with_version_control(Arc::new(StaticVersionControl::on_branch("main")))
            .with_analytics(Arc::new(SqliteAnalytics::in_memory().unwrap()));

        let state = EcosystemMonitor::new(set).check().await;
        assert!(!state.collaborators[&Collaborator::Memory].online);
        assert!(state.collaborators[&Collaborator::Checkpoint].online);
        assert_eq!(state.online_count(), 4);
        assert_eq!(state.health, CoordinationHealth::Degraded);
    }

    #[test]
    fn health_thresholds() {
        assert_eq!(classify(5, 5), CoordinationHealth::Healthy);
        assert_eq!(classify(4, 5), CoordinationHealth::Degraded);
        assert_eq!(classify(3, 5), CoordinationHealth::Degraded);
        assert_eq!(classify(2, 5), CoordinationHealth::Unhealthy);
        assert_eq!(classify(0, 5), CoordinationHealth::Unhealthy);
    }
}
