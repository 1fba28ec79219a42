//! Project intelligence cache.
//!
//! One versioned entity per project (`ProjectIntelligence_<name>`) holding
//! structured sub-records, invalidation triggers, and a freshness record.
//! Validation scores confidence from age and from version-control changes
//! matching the invalidation triggers.

use chrono::{DateTime, Duration, Utc};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use relay_clients::codec;
use relay_clients::set::CollaboratorSet;
use relay_core::collaborator::Collaborator;
use relay_core::errors::CoordinationError;

pub const INTELLIGENCE_ENTITY_KIND: &str = "ProjectIntelligence";

const FRESH_WINDOW_HOURS: i64 = 24;
const AGING_WINDOW_DAYS: i64 = 7;

const FRESH_CONFIDENCE: f64 = 0.9;
const AGING_CONFIDENCE: f64 = 0.6;
const STALE_CONFIDENCE: f64 = 0.3;

const USE_THRESHOLD: f64 = 0.7;
const REFRESH_THRESHOLD: f64 = 0.4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessStatus {
    Fresh,
    Aging,
    Stale,
    Invalid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Use,
    Refresh,
    Discard,
}

/// A glob pattern whose match in the working tree degrades confidence by
/// `importance`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InvalidationTrigger {
    pub pattern: String,
    pub importance: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FreshnessRecord {
    pub status: FreshnessStatus,
    pub confidence: f64,
    pub checked_at: String,
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FreshnessVerdict {
    pub status: FreshnessStatus,
    pub confidence: f64,
    pub recommended: RecommendedAction,
    /// Changed files that matched an invalidation trigger.
    pub matched_files: Vec<String>,
    pub checked_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectIntelligence {
    pub project_name: String,
    pub structure: serde_json::Value,
    pub architecture: serde_json::Value,
    pub development: serde_json::Value,
    pub context: serde_json::Value,
    pub invalidation_triggers: Vec<InvalidationTrigger>,
    pub freshness: FreshnessRecord,
    pub cache_version: u64,
    pub created_at: String,
    pub updated_at: String,
}

/// Sub-records supplied at creation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IntelligenceOptions {
    pub structure: serde_json::Value,
    pub architecture: serde_json::Value,
    pub development: serde_json::Value,
    pub context: serde_json::Value,
    pub invalidation_triggers: Vec<InvalidationTrigger>,
}

/// Partial update applied by `refresh`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IntelligenceUpdate {
    pub structure: Option<serde_json::Value>,
    pub architecture: Option<serde_json::Value>,
    pub development: Option<serde_json::Value>,
    pub context: Option<serde_json::Value>,
    pub invalidation_triggers: Option<Vec<InvalidationTrigger>>,
}

pub struct IntelligenceCache {
    set: CollaboratorSet,
}

impl IntelligenceCache {
    pub fn new(set: CollaboratorSet) -> Self {
        Self { set }
    }

    pub async fn create(
        &self,
        project: &str,
        options: IntelligenceOptions,
    ) -> Result<ProjectIntelligence, CoordinationError> {
        let now = Utc::now().to_rfc3339();
        let intelligence = ProjectIntelligence {
            project_name: project.to_string(),
            structure: options.structure,
            architecture: options.architecture,
            development: options.development,
            context: options.context,
            invalidation_triggers: options.invalidation_triggers,
            freshness: FreshnessRecord {
                status: FreshnessStatus::Fresh,
                confidence: FRESH_CONFIDENCE,
                checked_at: now.clone(),
                reason: None,
            },
            cache_version: 1,
            created_at: now.clone(),
            updated_at: now,
        };

        self.persist(&intelligence).await?;
        info!(project, "project intelligence created");
        Ok(intelligence)
    }

    pub async fn load(&self, project: &str) -> Result<ProjectIntelligence, CoordinationError> {
        let memory = self.set.memory.as_ref().ok_or_else(|| {
            CoordinationError::unavailable(Collaborator::Memory, "not configured")
        })?;

        let name = codec::entity_name(INTELLIGENCE_ENTITY_KIND, project);
        let entities = memory
            .search_nodes(&name)
            .await
            .map_err(|e| CoordinationError::unavailable(Collaborator::Memory, e.to_string()))?;

        let entity = entities
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| CoordinationError::NotFound(format!("project intelligence {project}")))?;
        codec::decode(entity)
    }

    /// Score the cached intelligence. Version-control changed files matching
    /// an invalidation trigger each lower confidence by that trigger's
    /// importance.
    pub async fn validate(&self, project: &str) -> Result<FreshnessVerdict, CoordinationError> {
        let intelligence = self.load(project).await?;
        let changed_files = self.changed_files().await;
        Ok(evaluate_freshness(&intelligence, &changed_files, Utc::now()))
    }

    /// Apply partial updates and bump the cache version.
    pub async fn refresh(
        &self,
        project: &str,
        updates: IntelligenceUpdate,
    ) -> Result<ProjectIntelligence, CoordinationError> {
        let mut intelligence = self.load(project).await?;

        if let Some(structure) = updates.structure {
            intelligence.structure = structure;
        }
        if let Some(architecture) = updates.architecture {
            intelligence.architecture = architecture;
        }
        if let Some(development) = updates.development {
            intelligence.development = development;
        }
        if let Some(context) = updates.context {
            intelligence.context = context;
        }
        if let Some(triggers) = updates.invalidation_triggers {
            intelligence.invalidation_triggers = triggers;
        }

        let now = Utc::now().to_rfc3339();
        intelligence.cache_version += 1;
        intelligence.freshness = FreshnessRecord {
            status: FreshnessStatus::Fresh,
            confidence: FRESH_CONFIDENCE,
            checked_at: now.clone(),
            reason: None,
        };
        intelligence.updated_at = now;

        self.persist(&intelligence).await?;
        info!(project, version = intelligence.cache_version, "project intelligence refreshed");
        Ok(intelligence)
    }

    /// Mark the cached intelligence invalid with a reason.
    pub async fn invalidate(
        &self,
        project: &str,
        reason: &str,
    ) -> Result<ProjectIntelligence, CoordinationError> {
        let mut intelligence = self.load(project).await?;

        let now = Utc::now().to_rfc3339();
        intelligence.freshness = FreshnessRecord {
            status: FreshnessStatus::Invalid,
            confidence: 0.0,
            checked_at: now.clone(),
            reason: Some(reason.to_string()),
        };
        intelligence.updated_at = now;

        self.persist(&intelligence).await?;
        info!(project, reason, "project intelligence invalidated");
        Ok(intelligence)
    }

    /// The knowledge store has no in-place update, so persistence is
    /// delete-then-recreate like the rule store. The recreate is retried once;
    /// a second failure surfaces the payload for manual recovery.
    async fn persist(&self, intelligence: &ProjectIntelligence) -> Result<(), CoordinationError> {
        let memory = self.set.memory.as_ref().ok_or_else(|| {
            CoordinationError::unavailable(Collaborator::Memory, "not configured")
        })?;
        let entity = codec::encode(
            INTELLIGENCE_ENTITY_KIND,
            &intelligence.project_name,
            intelligence,
        )?;
        let name = entity.name.clone();

        memory
            .delete_entities(vec![name])
            .await
            .map_err(|e| CoordinationError::unavailable(Collaborator::Memory, e.to_string()))?;

        if let Err(first) = memory.create_entities(vec![entity.clone()]).await {
            warn!(
                project = %intelligence.project_name,
                error = %first,
                "recreate failed after delete; retrying"
            );
            memory.create_entities(vec![entity]).await.map_err(|second| {
                CoordinationError::Store(format!(
                    "persist {}: delete succeeded but recreate failed twice ({first}; then {second}); payload: {}",
                    intelligence.project_name,
                    serde_json::to_string(intelligence).unwrap_or_default()
                ))
            })?;
        }
        Ok(())
    }

    async fn changed_files(&self) -> Vec<String> {
        let Some(vcs) = &self.set.version_control else {
            return Vec::new();
        };
        match vcs.status().await {
            Ok(status) => status.changed_files,
            Err(e) => {
                warn!(collaborator = %Collaborator::VersionControl, error = %e, "status unavailable during validation");
                Vec::new()
            }
        }
    }
}

fn evaluate_freshness(
    intelligence: &ProjectIntelligence,
    changed_files: &[String],
    now: DateTime<Utc>,
) -> FreshnessVerdict {
    let checked_at = now.to_rfc3339();

    if intelligence.freshness.status == FreshnessStatus::Invalid {
        return FreshnessVerdict {
            status: FreshnessStatus::Invalid,
            confidence: 0.0,
            recommended: RecommendedAction::Discard,
            matched_files: Vec::new(),
            checked_at,
        };
    }

    let age = DateTime::parse_from_rfc3339(&intelligence.updated_at)
        .map(|updated| now.signed_duration_since(updated.with_timezone(&Utc)))
        .unwrap_or_else(|_| Duration::days(AGING_WINDOW_DAYS + 1));

    let (status, mut confidence) = if age < Duration::hours(FRESH_WINDOW_HOURS) {
        (FreshnessStatus::Fresh, FRESH_CONFIDENCE)
    } else if age < Duration::days(AGING_WINDOW_DAYS) {
        (FreshnessStatus::Aging, AGING_CONFIDENCE)
    } else {
        (FreshnessStatus::Stale, STALE_CONFIDENCE)
    };

    let mut matched_files = Vec::new();
    for trigger in &intelligence.invalidation_triggers {
        let Ok(pattern) = Pattern::new(&trigger.pattern) else {
            warn!(pattern = %trigger.pattern, "invalid invalidation pattern skipped");
            continue;
        };
        for file in changed_files {
            if pattern.matches(file) {
                confidence -= trigger.importance;
                matched_files.push(file.clone());
            }
        }
    }
    confidence = confidence.max(0.0);

    let recommended = if confidence >= USE_THRESHOLD {
        RecommendedAction::Use
    } else if confidence >= REFRESH_THRESHOLD {
        RecommendedAction::Refresh
    } else {
        RecommendedAction::Discard
    };

    FreshnessVerdict {
        status,
        confidence,
        recommended,
        matched_files,
        checked_at,
    }
}
