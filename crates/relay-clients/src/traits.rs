//! Client interfaces consumed from the five collaborators.
//!
//! Each trait is deliberately narrow: relay only depends on the handful of
//! operations the coordination layer actually uses. Concrete transports
//! (RPC, HTTP, local) live in the host; relay receives trait objects.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use relay_core::ids::CheckpointId;

/// Error surface shared by all collaborator clients.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ClientError {
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("query error: {0}")]
    Query(String),
}

/// A knowledge-graph entity. Observations carry the payload; relay encodes
/// structured state as a single JSON observation (see [`crate::codec`]).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Deterministic name, `<Kind>_<id>`.
    pub name: String,
    pub entity_type: String,
    pub observations: Vec<String>,
}

/// A directed relation between two entities.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub from: String,
    pub to: String,
    pub relation_type: String,
}

/// Full knowledge-graph read.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
}

/// A checkpoint created by the checkpointing collaborator. Placeholder
/// checkpoints are synthesized locally when the collaborator is absent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub label: String,
    pub description: String,
    pub created_at: String,
}

/// Working-tree status from the version-control collaborator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VcsStatus {
    pub branch: String,
    pub clean: bool,
    pub changed_files: Vec<String>,
    pub last_commit: Option<String>,
}

/// Knowledge-graph store.
#[async_trait]
pub trait MemoryClient: Send + Sync {
    async fn create_entities(&self, entities: Vec<Entity>) -> Result<(), ClientError>;
    async fn create_relations(&self, relations: Vec<Relation>) -> Result<(), ClientError>;
    async fn delete_entities(&self, names: Vec<String>) -> Result<(), ClientError>;
    /// Substring search over entity names and types.
    async fn search_nodes(&self, query: &str) -> Result<Vec<Entity>, ClientError>;
    async fn read_graph(&self) -> Result<KnowledgeGraph, ClientError>;
}

/// Code-checkpointing service.
#[async_trait]
pub trait CheckpointClient: Send + Sync {
    async fn create_checkpoint(&self, label: &str, description: &str)
        -> Result<Checkpoint, ClientError>;
    async fn list_checkpoints(&self) -> Result<Vec<Checkpoint>, ClientError>;
    async fn restore_checkpoint(&self, id: &CheckpointId) -> Result<Checkpoint, ClientError>;
}

/// Filesystem-access service.
#[async_trait]
pub trait FilesystemClient: Send + Sync {
    async fn list_allowed_roots(&self) -> Result<Vec<String>, ClientError>;

    /// Activity tracking is a documented stub: the filesystem collaborator
    /// exposes no change feed, so this always returns empty.
    async fn recent_activity(&self) -> Result<Vec<String>, ClientError> {
        Ok(Vec::new())
    }
}

/// Version-control service.
#[async_trait]
pub trait VersionControlClient: Send + Sync {
    async fn status(&self) -> Result<VcsStatus, ClientError>;
}

/// Relational-analytics stores.
#[async_trait]
pub trait AnalyticsClient: Send + Sync {
    /// Run a parameterized query; rows come back as JSON objects keyed by
    /// column name.
    async fn query(
        &self,
        sql: &str,
        params: &[serde_json::Value],
    ) -> Result<Vec<serde_json::Value>, ClientError>;

    async fn health_check(&self) -> Result<(), ClientError>;
}
