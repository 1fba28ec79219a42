//! # relay-rules
//!
//! Persisted, prioritized session rules and the enforcement engine that
//! evaluates proposed actions against them.
//!
//! - [`store::RuleStore`]: TTL-cached view of rules persisted in the
//!   knowledge store
//! - [`engine::RuleEnforcementEngine`]: priority-ordered, fail-fast
//!   evaluation with conflict detection and optimization suggestions
//! - [`effectiveness`]: violation-driven effectiveness learning and
//!   new-rule drafting

#![deny(unsafe_code)]

pub mod audit;
pub mod conflicts;
pub mod effectiveness;
pub mod engine;
pub mod store;
pub mod types;

pub use engine::RuleEnforcementEngine;
pub use store::RuleStore;
pub use types::{
    ActionValidation, ConflictKind, EnforcementLevel, EnforcementOutcome, OptimizationSuggestion,
    RuleConflict, RuleDraft, RuleEnforcementResult, RuleScope, RuleType, RuleUpdate, RuleViolation,
    SessionRule, SuggestionKind, UserResponse,
};
