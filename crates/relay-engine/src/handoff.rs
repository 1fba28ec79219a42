//! Unified handoff packages.
//!
//! A handoff captures everything the next session needs to resume: one
//! sub-package per collaborator, cross-references between them, a
//! coordination map, and ordered reconstruction steps. Creation never fails;
//! an absent or failing collaborator yields an explicit `Unavailable`
//! sub-package instead.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use relay_clients::codec;
use relay_clients::set::CollaboratorSet;
use relay_clients::traits::{Checkpoint, VcsStatus};
use relay_core::collaborator::Collaborator;
use relay_core::ids::{CheckpointId, HandoffId};

/// Entity kind under which handoffs persist (`Handoff_<id>`).
pub const HANDOFF_ENTITY_KIND: &str = "Handoff";

/// One collaborator's contribution to a handoff.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum SubPackage<T> {
    Captured(T),
    Unavailable { reason: String },
}

impl<T> SubPackage<T> {
    pub fn is_captured(&self) -> bool {
        matches!(self, Self::Captured(_))
    }

    pub fn captured(&self) -> Option<&T> {
        match self {
            Self::Captured(value) => Some(value),
            Self::Unavailable { .. } => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub entity_count: usize,
    pub relation_count: usize,
    pub entity_names: Vec<String>,
}

/// Checkpoint reference. When the checkpoint collaborator is absent or
/// failing a placeholder is synthesized so downstream consumers always see
/// the same shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckpointCapture {
    pub checkpoint: Checkpoint,
    pub placeholder: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilesystemSnapshot {
    pub allowed_roots: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub healthy: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrossReference {
    pub from: String,
    pub to: String,
    pub relation_type: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoordinationMap {
    /// Where the authoritative context lives: memory when present, else the
    /// filesystem.
    pub primary_context: Collaborator,
    pub dependencies: Vec<String>,
    /// Collaborators actually present at build time, in designed order.
    pub sync_priority: Vec<Collaborator>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconstructionStep {
    pub order: usize,
    pub collaborator: Collaborator,
    pub instruction: String,
    pub depends_on: Vec<Collaborator>,
}

/// Immutable once built.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HandoffPackage {
    pub handoff_id: HandoffId,
    pub created_at: String,
    pub memory: SubPackage<MemorySnapshot>,
    pub checkpoint: SubPackage<CheckpointCapture>,
    pub filesystem: SubPackage<FilesystemSnapshot>,
    pub version_control: SubPackage<VcsStatus>,
    pub analytics: SubPackage<AnalyticsSnapshot>,
    pub cross_references: Vec<CrossReference>,
    pub coordination: CoordinationMap,
    pub reconstruction_steps: Vec<ReconstructionStep>,
}

impl HandoffPackage {
    pub fn entity_name(&self) -> String {
        codec::entity_name(HANDOFF_ENTITY_KIND, self.handoff_id.as_str())
    }

    pub fn captured_count(&self) -> usize {
        [
            self.memory.is_captured(),
            self.checkpoint.is_captured(),
            self.filesystem.is_captured(),
            self.version_control.is_captured(),
            self.analytics.is_captured(),
        ]
        .into_iter()
        .filter(|c| *c)
        .count()
    }
}

pub struct HandoffBuilder {
    set: CollaboratorSet,
}

impl HandoffBuilder {
    pub fn new(set: CollaboratorSet) -> Self {
        Self { set }
    }

    /// Build a handoff package. Infallible: every collaborator failure
    /// degrades to an `Unavailable` sub-package and persistence is
    /// best-effort.
    pub async fn build(&self) -> HandoffPackage {
        let handoff_id = HandoffId::new();

        let (memory, checkpoint, filesystem, version_control, analytics) = tokio::join!(
            self.capture_memory(),
            self.capture_checkpoint(&handoff_id),
            self.capture_filesystem(),
            self.capture_version_control(),
            self.capture_analytics(),
        );

        let cross_references = cross_references(&handoff_id, &checkpoint, &version_control);
        let coordination = CoordinationMap {
            primary_context: if self.set.is_available(Collaborator::Memory) {
                Collaborator::Memory
            } else {
                Collaborator::Filesystem
            },
            dependencies: dependencies(&self.set),
            sync_priority: self.set.available(),
        };
        let reconstruction_steps = reconstruction_steps(&self.set);

        let package = HandoffPackage {
            handoff_id,
            created_at: Utc::now().to_rfc3339(),
            memory,
            checkpoint,
            filesystem,
            version_control,
            analytics,
            cross_references,
            coordination,
            reconstruction_steps,
        };

        self.persist(&package).await;
        info!(
            handoff_id = %package.handoff_id,
            captured = package.captured_count(),
            "handoff package built"
        );
        package
    }

    async fn capture_memory(&self) -> SubPackage<MemorySnapshot> {
        let Some(client) = &self.set.memory else {
            return SubPackage::Unavailable { reason: "not configured".into() };
        };
        match client.read_graph().await {
            Ok(graph) => SubPackage::Captured(MemorySnapshot {
                entity_count: graph.entities.len(),
                relation_count: graph.relations.len(),
                entity_names: graph.entities.into_iter().map(|e| e.name).collect(),
            }),
            Err(e) => SubPackage::Unavailable { reason: e.to_string() },
        }
    }

    async fn capture_checkpoint(&self, handoff_id: &HandoffId) -> SubPackage<CheckpointCapture> {
        let label = format!("handoff {handoff_id}");
        if let Some(client) = &self.set.checkpoint {
            match client
                .create_checkpoint(&label, "session handoff snapshot")
                .await
            {
                Ok(checkpoint) => {
                    return SubPackage::Captured(CheckpointCapture {
                        checkpoint,
                        placeholder: false,
                    });
                }
                Err(e) => {
                    warn!(error = %e, "checkpoint capture failed; synthesizing placeholder");
                }
            }
        }
        // Stable downstream shape: absence still yields a checkpoint record
        SubPackage::Captured(CheckpointCapture {
            checkpoint: Checkpoint {
                id: CheckpointId::new(),
                label,
                description: "placeholder; checkpointing collaborator unavailable".into(),
                created_at: Utc::now().to_rfc3339(),
            },
            placeholder: true,
        })
    }

    async fn capture_filesystem(&self) -> SubPackage<FilesystemSnapshot> {
        let Some(client) = &self.set.filesystem else {
            return SubPackage::Unavailable { reason: "not configured".into() };
        };
        match client.list_allowed_roots().await {
            Ok(allowed_roots) => SubPackage::Captured(FilesystemSnapshot { allowed_roots }),
            Err(e) => SubPackage::Unavailable { reason: e.to_string() },
        }
    }

    async fn capture_version_control(&self) -> SubPackage<VcsStatus> {
        let Some(client) = &self.set.version_control else {
            return SubPackage::Unavailable { reason: "not configured".into() };
        };
        match client.status().await {
            Ok(status) => SubPackage::Captured(status),
            Err(e) => SubPackage::Unavailable { reason: e.to_string() },
        }
    }

    async fn capture_analytics(&self) -> SubPackage<AnalyticsSnapshot> {
        let Some(client) = &self.set.analytics else {
            return SubPackage::Unavailable { reason: "not configured".into() };
        };
        match client.health_check().await {
            Ok(()) => SubPackage::Captured(AnalyticsSnapshot { healthy: true }),
            Err(e) => SubPackage::Unavailable { reason: e.to_string() },
        }
    }

    /// Best-effort persistence as `Handoff_<id>` plus graph relations for the
    /// cross-references. Failure warns and leaves the package in-memory only.
    async fn persist(&self, package: &HandoffPackage) {
        let Some(memory) = &self.set.memory else {
            return;
        };
        let entity = match codec::encode(
            HANDOFF_ENTITY_KIND,
            package.handoff_id.as_str(),
            package,
        ) {
            Ok(entity) => entity,
            Err(e) => {
                warn!(handoff_id = %package.handoff_id, error = %e, "handoff encode failed");
                return;
            }
        };
        if let Err(e) = memory.create_entities(vec![entity]).await {
            warn!(handoff_id = %package.handoff_id, error = %e, "handoff persist failed");
            return;
        }

        let relations = package
            .cross_references
            .iter()
            .map(|r| relay_clients::traits::Relation {
                from: r.from.clone(),
                to: r.to.clone(),
                relation_type: r.relation_type.clone(),
            })
            .collect::<Vec<_>>();
        if !relations.is_empty() {
            if let Err(e) = memory.create_relations(relations).await {
                warn!(handoff_id = %package.handoff_id, error = %e, "handoff relation persist failed");
            }
        }
    }
}

/// References are rooted at the persisted `Handoff_<id>` entity. Sub-packages
/// have no entity names of their own, so the handoff entity stands in for its
/// memory sub-package when linking to the checkpoint and the captured commit.
fn cross_references(
    handoff_id: &HandoffId,
    checkpoint: &SubPackage<CheckpointCapture>,
    version_control: &SubPackage<VcsStatus>,
) -> Vec<CrossReference> {
    let from = codec::entity_name(HANDOFF_ENTITY_KIND, handoff_id.as_str());
    let mut refs = Vec::new();

    if let Some(capture) = checkpoint.captured() {
        refs.push(CrossReference {
            from: from.clone(),
            to: format!("Checkpoint_{}", capture.checkpoint.id),
            relation_type: "includes_checkpoint".into(),
        });
    }
    if let Some(status) = version_control.captured() {
        if let Some(commit) = &status.last_commit {
            refs.push(CrossReference {
                from,
                to: format!("Commit_{commit}"),
                relation_type: "captures_commit".into(),
            });
        }
    }
    refs
}

fn dependencies(set: &CollaboratorSet) -> Vec<String> {
    let mut deps = Vec::new();
    if set.is_available(Collaborator::Checkpoint) && set.is_available(Collaborator::VersionControl)
    {
        deps.push("checkpoint restore expects the captured version-control branch".into());
    }
    if set.is_available(Collaborator::Memory) {
        deps.push("reconstruction starts from the memory knowledge graph".into());
    }
    deps
}

fn reconstruction_steps(set: &CollaboratorSet) -> Vec<ReconstructionStep> {
    let mut steps = Vec::new();
    for collaborator in Collaborator::SYNC_ORDER {
        if !set.is_available(collaborator) {
            continue;
        }
        let depends_on = if collaborator == Collaborator::Memory {
            Vec::new()
        } else if set.is_available(Collaborator::Memory) {
            vec![Collaborator::Memory]
        } else {
            Vec::new()
        };
        let instruction = match collaborator {
            Collaborator::Memory => "reload the knowledge graph and locate the handoff entity",
            Collaborator::Analytics => "verify analytics stores answer queries",
            Collaborator::Filesystem => "re-establish allowed filesystem roots",
            Collaborator::VersionControl => "confirm branch and working-tree state",
            Collaborator::Checkpoint => "restore from the captured checkpoint if needed",
        };
        steps.push(ReconstructionStep {
            order: steps.len() + 1,
            collaborator,
            instruction: instruction.into(),
            depends_on,
        });
    }
    steps
}
