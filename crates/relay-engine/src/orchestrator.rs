//! The session orchestrator facade.
//!
//! One coordinator-held context object: the collaborator set, the rule store
//! and enforcement engine, the monitor, handoff builder, reconstructor,
//! synchronizer and intelligence cache, plus the session record, event
//! history and last-sync timestamp. Hosts call this; nothing here is global.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use relay_clients::set::CollaboratorSet;
use relay_core::action::{BehaviorPattern, ProposedAction};
use relay_core::collaborator::Collaborator;
use relay_core::errors::CoordinationError;
use relay_core::events::{EventKind, EventOutcome, OrchestratorEvent};
use relay_core::ids::{HandoffId, RuleId};
use relay_rules::store::RuleStore;
use relay_rules::types::{
    ActionValidation, OptimizationSuggestion, RuleDraft, RuleEnforcementResult, RuleScope,
    RuleUpdate, RuleViolation, SessionRule,
};
use relay_rules::RuleEnforcementEngine;

use crate::handoff::{HandoffBuilder, HandoffPackage};
use crate::intelligence::{
    FreshnessVerdict, IntelligenceCache, IntelligenceOptions, IntelligenceUpdate,
    ProjectIntelligence,
};
use crate::monitor::{EcosystemMonitor, EcosystemState};
use crate::reconstruct::{ContextReconstructor, ReconstructedContext};
use crate::sync::{CheckpointCoordination, StateSynchronizer, SyncReport};

/// Regular ecosystem check cadence, in seconds.
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;
/// Shortened cadence after a collaborator failure.
pub const FAILURE_CHECK_INTERVAL_SECS: u64 = 30;

const EVENT_HISTORY_CAP: usize = 500;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRecord {
    pub started_at: String,
    pub last_handoff: Option<HandoffId>,
}

pub struct SessionOrchestrator {
    set: CollaboratorSet,
    engine: RuleEnforcementEngine,
    monitor: EcosystemMonitor,
    builder: HandoffBuilder,
    reconstructor: ContextReconstructor,
    synchronizer: StateSynchronizer,
    intelligence: IntelligenceCache,
    session: RwLock<SessionRecord>,
    events: RwLock<Vec<OrchestratorEvent>>,
    last_sync: RwLock<Option<String>>,
}

impl SessionOrchestrator {
    pub fn new(set: CollaboratorSet) -> Self {
        let store = Arc::new(RuleStore::new(set.memory.clone()));
        Self {
            engine: RuleEnforcementEngine::new(store),
            monitor: EcosystemMonitor::new(set.clone()),
            builder: HandoffBuilder::new(set.clone()),
            reconstructor: ContextReconstructor::new(set.clone()),
            synchronizer: StateSynchronizer::new(set.clone()),
            intelligence: IntelligenceCache::new(set.clone()),
            set,
            session: RwLock::new(SessionRecord {
                started_at: Utc::now().to_rfc3339(),
                last_handoff: None,
            }),
            events: RwLock::new(Vec::new()),
            last_sync: RwLock::new(None),
        }
    }

    pub fn collaborators(&self) -> &CollaboratorSet {
        &self.set
    }

    pub fn session(&self) -> SessionRecord {
        self.session.read().clone()
    }

    pub fn event_history(&self) -> Vec<OrchestratorEvent> {
        self.events.read().clone()
    }

    pub fn last_sync(&self) -> Option<String> {
        self.last_sync.read().clone()
    }

    // Rule management

    pub async fn create_rule(&self, rule: SessionRule) -> Result<SessionRule, CoordinationError> {
        self.engine.store().create_rule(rule).await
    }

    pub async fn get_rules(&self, scope: Option<RuleScope>) -> Vec<SessionRule> {
        self.engine.store().get_rules(scope).await
    }

    pub async fn get_rule(&self, id: &RuleId) -> Result<SessionRule, CoordinationError> {
        self.engine.store().get_rule(id).await
    }

    pub async fn update_rule(
        &self,
        id: &RuleId,
        update: RuleUpdate,
    ) -> Result<SessionRule, CoordinationError> {
        self.engine.store().update_rule(id, update).await
    }

    pub async fn delete_rule(&self, id: &RuleId) -> Result<(), CoordinationError> {
        self.engine.store().delete_rule(id).await
    }

    pub async fn enforce_rules(&self, action: &ProposedAction) -> Vec<RuleEnforcementResult> {
        self.engine.enforce(action).await
    }

    pub async fn validate_action(&self, action: &ProposedAction) -> ActionValidation {
        self.engine.validate_action(action).await
    }

    pub async fn record_violation(
        &self,
        violation: &RuleViolation,
    ) -> Result<SessionRule, CoordinationError> {
        self.engine.store().apply_violation(violation).await
    }

    /// Cross-rule optimization over the whole rule set.
    pub async fn optimize_rules(&self) -> Vec<OptimizationSuggestion> {
        let rules = self.engine.store().get_rules(None).await;
        relay_rules::effectiveness::optimize(&rules)
    }

    /// Draft rules from observed behavior patterns.
    pub fn suggest_new_rules(&self, patterns: &[BehaviorPattern]) -> Vec<RuleDraft> {
        relay_rules::effectiveness::suggest_new_rules(patterns)
    }

    // Coordination

    pub async fn monitor_ecosystem_state(&self) -> EcosystemState {
        self.monitor.check().await
    }

    pub async fn create_unified_handoff_package(&self) -> HandoffPackage {
        let package = self.builder.build().await;
        self.session.write().last_handoff = Some(package.handoff_id.clone());
        package
    }

    pub async fn reconstruct_unified_context(
        &self,
        handoff_id: &HandoffId,
    ) -> Result<ReconstructedContext, CoordinationError> {
        self.reconstructor.reconstruct(handoff_id).await
    }

    pub async fn sync_state_across_collaborators(&self) -> SyncReport {
        let report = self.synchronizer.sync().await;
        *self.last_sync.write() = Some(report.completed_at.clone());
        report
    }

    pub async fn coordinate_conversation_checkpoint(
        &self,
        label: &str,
        description: &str,
    ) -> Result<CheckpointCoordination, CoordinationError> {
        let coordination = self
            .synchronizer
            .coordinate_conversation_checkpoint(label, description)
            .await?;
        *self.last_sync.write() = Some(coordination.report.completed_at.clone());
        Ok(coordination)
    }

    // Project intelligence

    pub async fn create_project_intelligence(
        &self,
        project: &str,
        options: IntelligenceOptions,
    ) -> Result<ProjectIntelligence, CoordinationError> {
        self.intelligence.create(project, options).await
    }

    pub async fn load_project_intelligence(
        &self,
        project: &str,
    ) -> Result<ProjectIntelligence, CoordinationError> {
        self.intelligence.load(project).await
    }

    pub async fn validate_project_intelligence(
        &self,
        project: &str,
    ) -> Result<FreshnessVerdict, CoordinationError> {
        self.intelligence.validate(project).await
    }

    pub async fn refresh_project_intelligence(
        &self,
        project: &str,
        updates: IntelligenceUpdate,
    ) -> Result<ProjectIntelligence, CoordinationError> {
        self.intelligence.refresh(project, updates).await
    }

    pub async fn invalidate_project_intelligence(
        &self,
        project: &str,
        reason: &str,
    ) -> Result<ProjectIntelligence, CoordinationError> {
        self.intelligence.invalidate(project, reason).await
    }

    // Events

    /// Decide how to react to a host event. Rule-violation events are applied
    /// directly; everything else yields a coordination decision for the host.
    pub async fn handle_event(&self, event: OrchestratorEvent) -> EventOutcome {
        info!(kind = ?event.kind, detail = %event.detail, "handling event");

        let outcome = match event.kind {
            EventKind::SessionStart | EventKind::SessionEnd => EventOutcome {
                actions: vec![format!(
                    "run full coordination across {} available collaborators",
                    self.set.available_count()
                )],
                coordination_needed: true,
                resync: Collaborator::SYNC_ORDER.to_vec(),
                next_check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            },
            EventKind::FileChanged => EventOutcome {
                actions: vec!["resync filesystem and version-control views".into()],
                coordination_needed: false,
                resync: vec![Collaborator::Filesystem, Collaborator::VersionControl],
                next_check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            },
            EventKind::CheckpointCreated => EventOutcome {
                actions: vec!["link checkpoint into the knowledge graph".into()],
                coordination_needed: false,
                resync: vec![Collaborator::Memory, Collaborator::Checkpoint],
                next_check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            },
            EventKind::CollaboratorFailure => {
                let failed = event.payload["collaborator"]
                    .as_str()
                    .and_then(|s| s.parse::<Collaborator>().ok());
                EventOutcome {
                    actions: vec![match failed {
                        Some(c) => format!("degrade around {c} and re-probe shortly"),
                        None => "re-probe the ecosystem shortly".into(),
                    }],
                    coordination_needed: true,
                    resync: failed.into_iter().collect(),
                    next_check_interval_secs: FAILURE_CHECK_INTERVAL_SECS,
                }
            }
            EventKind::RuleViolationObserved => self.apply_violation_event(&event).await,
        };

        let mut events = self.events.write();
        if events.len() == EVENT_HISTORY_CAP {
            events.remove(0);
        }
        events.push(event);

        outcome
    }

    async fn apply_violation_event(&self, event: &OrchestratorEvent) -> EventOutcome {
        let actions = match serde_json::from_value::<RuleViolation>(event.payload.clone()) {
            Ok(violation) => match self.record_violation(&violation).await {
                Ok(rule) => vec![format!(
                    "recorded violation of rule {}; effectiveness now {:.2}",
                    rule.id,
                    rule.effectiveness_or_default()
                )],
                Err(e) => {
                    warn!(error = %e, "violation event could not be applied");
                    vec![format!("violation not applied: {e}")]
                }
            },
            Err(e) => {
                warn!(error = %e, "violation event payload malformed");
                vec!["violation payload malformed; ignored".into()]
            }
        };

        EventOutcome {
            actions,
            coordination_needed: false,
            resync: vec![Collaborator::Memory],
            next_check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
        }
    }
}
