//! # relay-clients
//!
//! Narrow typed client interfaces to the five collaborators, the
//! optional-capability [`CollaboratorSet`], the structured entity codec used
//! for knowledge-store persistence, in-memory client implementations for
//! tests, and a SQLite-backed analytics client.

#![deny(unsafe_code)]

pub mod codec;
pub mod memory;
pub mod set;
pub mod sqlite;
pub mod traits;

pub use set::CollaboratorSet;
pub use traits::{
    AnalyticsClient, Checkpoint, CheckpointClient, ClientError, Entity, FilesystemClient,
    KnowledgeGraph, MemoryClient, Relation, VcsStatus, VersionControlClient,
};
