//! # relay-engine
//!
//! Cross-collaborator coordination: ecosystem monitoring, handoff packages,
//! context reconstruction, state synchronization, the project intelligence
//! cache, and the [`SessionOrchestrator`] facade hosts talk to.

#![deny(unsafe_code)]

pub mod handoff;
pub mod intelligence;
pub mod monitor;
pub mod orchestrator;
pub mod reconstruct;
pub mod sync;

pub use handoff::{HandoffBuilder, HandoffPackage};
pub use intelligence::{IntelligenceCache, ProjectIntelligence};
pub use monitor::{CoordinationHealth, EcosystemMonitor, EcosystemState};
pub use orchestrator::SessionOrchestrator;
pub use reconstruct::{ContextReconstructor, ReconstructedContext};
pub use sync::{StateSynchronizer, SyncReport, SyncStatus};
