//! TTL-cached rule store over the knowledge-graph collaborator.
//!
//! Reads serve from an in-memory cache refreshed in full when it goes stale
//! (fixed TTL from the last successful load). Mutations write the backing
//! store first, then the cache: a failed store write never leaves the cache
//! ahead of the store.
//!
//! The store offers no in-place update, so `update_rule` is
//! delete-then-recreate. Between the delete and the recreate the rule exists
//! only in cache; a crash there loses the rule. The recreate is retried once
//! on failure and the error message carries the full payload — a known
//! data-loss window, documented rather than hidden.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, warn};

use relay_clients::codec;
use relay_clients::traits::MemoryClient;
use relay_core::collaborator::Collaborator;
use relay_core::errors::CoordinationError;
use relay_core::ids::RuleId;

use crate::effectiveness;
use crate::types::{RuleScope, RuleUpdate, RuleViolation, SessionRule, UserResponse};

/// Entity kind under which rules persist (`SessionRule_<id>`).
pub const RULE_ENTITY_KIND: &str = "SessionRule";

/// Cache validity window from the last successful load.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Default)]
struct RuleCache {
    rules: Vec<SessionRule>,
    loaded_at: Option<Instant>,
}

pub struct RuleStore {
    memory: Option<Arc<dyn MemoryClient>>,
    cache: RwLock<RuleCache>,
    ttl: Duration,
}

impl RuleStore {
    pub fn new(memory: Option<Arc<dyn MemoryClient>>) -> Self {
        Self::with_ttl(memory, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(memory: Option<Arc<dyn MemoryClient>>, ttl: Duration) -> Self {
        Self {
            memory,
            cache: RwLock::new(RuleCache::default()),
            ttl,
        }
    }

    /// Reload the cache from the store if stale. A failed reload keeps the
    /// previous cache and warns; the next read is a fresh attempt.
    async fn ensure_fresh(&self) {
        let stale = {
            let cache = self.cache.read();
            match cache.loaded_at {
                None => true,
                Some(at) => at.elapsed() >= self.ttl,
            }
        };
        if !stale {
            return;
        }

        let Some(memory) = &self.memory else {
            // Cache-only mode: nothing to reload from.
            let mut cache = self.cache.write();
            if cache.loaded_at.is_none() {
                cache.loaded_at = Some(Instant::now());
            }
            return;
        };

        match memory.search_nodes(RULE_ENTITY_KIND).await {
            Ok(entities) => {
                let rules: Vec<SessionRule> = codec::decode_lossy(&entities);
                debug!(count = rules.len(), "rule cache reloaded");
                let mut cache = self.cache.write();
                cache.rules = rules;
                cache.loaded_at = Some(Instant::now());
            }
            Err(e) => {
                warn!(collaborator = %Collaborator::Memory, error = %e, "rule reload failed; serving previous cache");
            }
        }
    }

    /// Rules ascending by priority, optionally filtered by scope.
    pub async fn get_rules(&self, scope: Option<RuleScope>) -> Vec<SessionRule> {
        self.ensure_fresh().await;
        let cache = self.cache.read();
        let mut rules: Vec<SessionRule> = cache
            .rules
            .iter()
            .filter(|r| scope.map_or(true, |s| r.scope == s))
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.priority);
        rules
    }

    pub async fn get_rule(&self, id: &RuleId) -> Result<SessionRule, CoordinationError> {
        self.ensure_fresh().await;
        self.cache
            .read()
            .rules
            .iter()
            .find(|r| &r.id == id)
            .cloned()
            .ok_or_else(|| CoordinationError::NotFound(format!("rule {id}")))
    }

    pub async fn create_rule(&self, rule: SessionRule) -> Result<SessionRule, CoordinationError> {
        self.ensure_fresh().await;

        if let Some(memory) = &self.memory {
            let entity = codec::encode(RULE_ENTITY_KIND, rule.id.as_str(), &rule)?;
            memory
                .create_entities(vec![entity])
                .await
                .map_err(|e| CoordinationError::unavailable(Collaborator::Memory, e.to_string()))?;
        } else {
            warn!(rule_id = %rule.id, "no knowledge store configured; rule kept cache-only");
        }

        let mut cache = self.cache.write();
        cache.rules.retain(|r| r.id != rule.id);
        cache.rules.push(rule.clone());
        Ok(rule)
    }

    /// Update an existing rule. Unknown id fails with `NotFound` and leaves
    /// cache and store unchanged.
    pub async fn update_rule(
        &self,
        id: &RuleId,
        update: RuleUpdate,
    ) -> Result<SessionRule, CoordinationError> {
        let current = self.get_rule(id).await?;

        let mut updated = current;
        if let Some(rule) = update.rule {
            updated.rule = rule;
        }
        if let Some(priority) = update.priority {
            updated.priority = priority;
        }
        if let Some(active) = update.active {
            updated.active = active;
        }
        if let Some(scope) = update.scope {
            updated.scope = scope;
        }
        if let Some(enforcement) = update.enforcement {
            updated.enforcement = enforcement;
        }
        if let Some(triggers) = update.triggers {
            updated.triggers = triggers;
        }
        if let Some(conditions) = update.conditions {
            updated.conditions = conditions;
        }
        updated.updated_at = Utc::now().to_rfc3339();

        if let Some(memory) = &self.memory {
            let name = codec::entity_name(RULE_ENTITY_KIND, id.as_str());
            let entity = codec::encode(RULE_ENTITY_KIND, id.as_str(), &updated)?;

            memory
                .delete_entities(vec![name])
                .await
                .map_err(|e| CoordinationError::unavailable(Collaborator::Memory, e.to_string()))?;

            // Crash window: the rule now exists only in memory here. Retry the
            // recreate once; on a second failure surface the payload so the
            // host can recover the rule by hand.
            if let Err(first) = memory.create_entities(vec![entity.clone()]).await {
                warn!(rule_id = %id, error = %first, "recreate failed after delete; retrying");
                memory.create_entities(vec![entity]).await.map_err(|second| {
                    CoordinationError::Store(format!(
                        "update {id}: delete succeeded but recreate failed twice ({first}; then {second}); payload: {}",
                        serde_json::to_string(&updated).unwrap_or_default()
                    ))
                })?;
            }
        }

        let mut cache = self.cache.write();
        cache.rules.retain(|r| &r.id != id);
        cache.rules.push(updated.clone());
        Ok(updated)
    }

    /// Delete immediately from both store and cache. No soft-delete.
    pub async fn delete_rule(&self, id: &RuleId) -> Result<(), CoordinationError> {
        // Existence check doubles as freshness check
        self.get_rule(id).await?;

        if let Some(memory) = &self.memory {
            let name = codec::entity_name(RULE_ENTITY_KIND, id.as_str());
            memory
                .delete_entities(vec![name])
                .await
                .map_err(|e| CoordinationError::unavailable(Collaborator::Memory, e.to_string()))?;
        }

        self.cache.write().rules.retain(|r| &r.id != id);
        Ok(())
    }

    /// Bump the usage counter for a matched rule. Counters are advisory
    /// metadata: the cache updates immediately and the store flush is
    /// best-effort.
    pub async fn record_usage(&self, id: &RuleId) {
        let updated = {
            let mut cache = self.cache.write();
            match cache.rules.iter_mut().find(|r| &r.id == id) {
                Some(rule) => {
                    rule.usage_count += 1;
                    rule.updated_at = Utc::now().to_rfc3339();
                    Some(rule.clone())
                }
                None => None,
            }
        };
        if let Some(rule) = updated {
            self.flush_counters(&rule).await;
        }
    }

    /// Apply a violation: bump the violation counter and recalculate
    /// effectiveness from the user's response. `disabled_rule` also
    /// deactivates the rule.
    pub async fn apply_violation(
        &self,
        violation: &RuleViolation,
    ) -> Result<SessionRule, CoordinationError> {
        self.ensure_fresh().await;

        let updated = {
            let mut cache = self.cache.write();
            let rule = cache
                .rules
                .iter_mut()
                .find(|r| r.id == violation.rule_id)
                .ok_or_else(|| CoordinationError::NotFound(format!("rule {}", violation.rule_id)))?;

            rule.violation_count += 1;
            rule.effectiveness = Some(effectiveness::apply_response(
                rule.effectiveness,
                violation.user_response,
            ));
            if violation.user_response == UserResponse::DisabledRule {
                rule.active = false;
            }
            rule.updated_at = Utc::now().to_rfc3339();
            rule.clone()
        };

        self.flush_counters(&updated).await;
        Ok(updated)
    }

    /// Best-effort counter flush. A failure warns and leaves the counters
    /// cache-ahead until the next full mutation.
    async fn flush_counters(&self, rule: &SessionRule) {
        let Some(memory) = &self.memory else {
            return;
        };
        let entity = match codec::encode(RULE_ENTITY_KIND, rule.id.as_str(), rule) {
            Ok(entity) => entity,
            Err(e) => {
                warn!(rule_id = %rule.id, error = %e, "counter flush encode failed");
                return;
            }
        };
        let name = codec::entity_name(RULE_ENTITY_KIND, rule.id.as_str());
        if let Err(e) = memory.delete_entities(vec![name]).await {
            warn!(rule_id = %rule.id, error = %e, "counter flush delete failed");
            return;
        }
        if let Err(e) = memory.create_entities(vec![entity]).await {
            warn!(rule_id = %rule.id, error = %e, "counter flush failed; cache ahead of store");
        }
    }
}
