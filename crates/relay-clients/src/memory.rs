//! In-memory collaborator implementations.
//!
//! Deterministic stand-ins for the real services, used as test fixtures and
//! for local single-process hosts. Each carries a failure toggle so tests
//! can exercise degraded paths without real outages.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use relay_core::ids::CheckpointId;

use crate::traits::{
    Checkpoint, CheckpointClient, ClientError, Entity, FilesystemClient, KnowledgeGraph,
    MemoryClient, Relation, VcsStatus, VersionControlClient,
};

fn check(failing: &AtomicBool, what: &str) -> Result<(), ClientError> {
    if failing.load(Ordering::Relaxed) {
        Err(ClientError::Unavailable(format!("{what}: injected failure")))
    } else {
        Ok(())
    }
}

/// In-memory knowledge-graph store.
#[derive(Default)]
pub struct InMemoryMemory {
    graph: RwLock<KnowledgeGraph>,
    failing: AtomicBool,
}

impl InMemoryMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub fn entity_count(&self) -> usize {
        self.graph.read().entities.len()
    }
}

#[async_trait]
impl MemoryClient for InMemoryMemory {
    async fn create_entities(&self, entities: Vec<Entity>) -> Result<(), ClientError> {
        check(&self.failing, "memory")?;
        let mut graph = self.graph.write();
        for entity in entities {
            // Recreating an existing name replaces it
            graph.entities.retain(|e| e.name != entity.name);
            graph.entities.push(entity);
        }
        Ok(())
    }

    async fn create_relations(&self, relations: Vec<Relation>) -> Result<(), ClientError> {
        check(&self.failing, "memory")?;
        self.graph.write().relations.extend(relations);
        Ok(())
    }

    async fn delete_entities(&self, names: Vec<String>) -> Result<(), ClientError> {
        check(&self.failing, "memory")?;
        let mut graph = self.graph.write();
        graph.entities.retain(|e| !names.contains(&e.name));
        graph
            .relations
            .retain(|r| !names.contains(&r.from) && !names.contains(&r.to));
        Ok(())
    }

    async fn search_nodes(&self, query: &str) -> Result<Vec<Entity>, ClientError> {
        check(&self.failing, "memory")?;
        let query = query.to_lowercase();
        Ok(self
            .graph
            .read()
            .entities
            .iter()
            .filter(|e| {
                e.name.to_lowercase().contains(&query)
                    || e.entity_type.to_lowercase().contains(&query)
            })
            .cloned()
            .collect())
    }

    async fn read_graph(&self) -> Result<KnowledgeGraph, ClientError> {
        check(&self.failing, "memory")?;
        Ok(self.graph.read().clone())
    }
}

/// In-memory checkpointing service.
#[derive(Default)]
pub struct InMemoryCheckpoint {
    checkpoints: RwLock<Vec<Checkpoint>>,
    failing: AtomicBool,
}

impl InMemoryCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

#[async_trait]
impl CheckpointClient for InMemoryCheckpoint {
    async fn create_checkpoint(
        &self,
        label: &str,
        description: &str,
    ) -> Result<Checkpoint, ClientError> {
        check(&self.failing, "checkpoint")?;
        let checkpoint = Checkpoint {
            id: CheckpointId::new(),
            label: label.to_string(),
            description: description.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };
        self.checkpoints.write().push(checkpoint.clone());
        Ok(checkpoint)
    }

    async fn list_checkpoints(&self) -> Result<Vec<Checkpoint>, ClientError> {
        check(&self.failing, "checkpoint")?;
        Ok(self.checkpoints.read().clone())
    }

    async fn restore_checkpoint(&self, id: &CheckpointId) -> Result<Checkpoint, ClientError> {
        check(&self.failing, "checkpoint")?;
        self.checkpoints
            .read()
            .iter()
            .find(|c| &c.id == id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("checkpoint {id}")))
    }
}

/// Filesystem collaborator with a fixed set of allowed roots.
pub struct StaticFilesystem {
    roots: Vec<String>,
    failing: AtomicBool,
}

impl StaticFilesystem {
    pub fn new(roots: Vec<String>) -> Self {
        Self {
            roots,
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

#[async_trait]
impl FilesystemClient for StaticFilesystem {
    async fn list_allowed_roots(&self) -> Result<Vec<String>, ClientError> {
        check(&self.failing, "filesystem")?;
        Ok(self.roots.clone())
    }
}

/// Version-control collaborator reporting a fixed status.
pub struct StaticVersionControl {
    status: RwLock<VcsStatus>,
    failing: AtomicBool,
}

impl StaticVersionControl {
    pub fn new(status: VcsStatus) -> Self {
        Self {
            status: RwLock::new(status),
            failing: AtomicBool::new(false),
        }
    }

    pub fn on_branch(branch: &str) -> Self {
        Self::new(VcsStatus {
            branch: branch.to_string(),
            clean: true,
            changed_files: Vec::new(),
            last_commit: Some("0000000".into()),
        })
    }

    pub fn set_status(&self, status: VcsStatus) {
        *self.status.write() = status;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

#[async_trait]
impl VersionControlClient for StaticVersionControl {
    async fn status(&self) -> Result<VcsStatus, ClientError> {
        check(&self.failing, "version_control")?;
        Ok(self.status.read().clone())
    }
}
