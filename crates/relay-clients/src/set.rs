//! Optional capability handles for the five collaborators.
//!
//! Availability is resolved in one capability-query stage ([`CollaboratorSet::available`])
//! rather than scattered null checks at call sites.

use std::sync::Arc;

use relay_core::collaborator::Collaborator;

use crate::traits::{
    AnalyticsClient, CheckpointClient, FilesystemClient, MemoryClient, VersionControlClient,
};

/// Independently-nullable handles to the five collaborators.
#[derive(Clone, Default)]
pub struct CollaboratorSet {
    pub memory: Option<Arc<dyn MemoryClient>>,
    pub checkpoint: Option<Arc<dyn CheckpointClient>>,
    pub filesystem: Option<Arc<dyn FilesystemClient>>,
    pub version_control: Option<Arc<dyn VersionControlClient>>,
    pub analytics: Option<Arc<dyn AnalyticsClient>>,
}

impl CollaboratorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory(mut self, client: Arc<dyn MemoryClient>) -> Self {
        self.memory = Some(client);
        self
    }

    pub fn with_checkpoint(mut self, client: Arc<dyn CheckpointClient>) -> Self {
        self.checkpoint = Some(client);
        self
    }

    pub fn with_filesystem(mut self, client: Arc<dyn FilesystemClient>) -> Self {
        self.filesystem = Some(client);
        self
    }

    pub fn with_version_control(mut self, client: Arc<dyn VersionControlClient>) -> Self {
        self.version_control = Some(client);
        self
    }

    pub fn with_analytics(mut self, client: Arc<dyn AnalyticsClient>) -> Self {
        self.analytics = Some(client);
        self
    }

    pub fn is_available(&self, collaborator: Collaborator) -> bool {
        match collaborator {
            Collaborator::Memory => self.memory.is_some(),
            Collaborator::Checkpoint => self.checkpoint.is_some(),
            Collaborator::Filesystem => self.filesystem.is_some(),
            Collaborator::VersionControl => self.version_control.is_some(),
            Collaborator::Analytics => self.analytics.is_some(),
        }
    }

    /// Collaborators with a configured client, in designed order.
    pub fn available(&self) -> Vec<Collaborator> {
        Collaborator::ALL
            .into_iter()
            .filter(|c| self.is_available(*c))
            .collect()
    }

    pub fn available_count(&self) -> usize {
        self.available().len()
    }
}

impl std::fmt::Debug for CollaboratorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollaboratorSet")
            .field("available", &self.available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryCheckpoint, InMemoryMemory};

    #[test]
    fn empty_set_has_nothing_available() {
        let set = CollaboratorSet::new();
        assert!(set.available().is_empty());
        assert_eq!(set.available_count(), 0);
        assert!(!set.is_available(Collaborator::Memory));
    }

    #[test]
    fn builder_registers_capabilities() {
        let set = CollaboratorSet::new()
            .with_memory(Arc::new(InMemoryMemory::new()))
            .with_checkpoint(Arc::new(InMemoryCheckpoint::new()));

        assert!(set.is_available(Collaborator::Memory));
        assert!(set.is_available(Collaborator::Checkpoint));
        assert!(!set.is_available(Collaborator::Analytics));
        assert_eq!(
            set.available(),
            vec![Collaborator::Memory, Collaborator::Checkpoint]
        );
    }
}
