//! # relay-core
//!
//! Shared domain types for the relay coordination layer: branded ids,
//! the error taxonomy, the closed collaborator vocabulary, proposed
//! actions, and orchestrator events.

#![deny(unsafe_code)]

pub mod action;
pub mod collaborator;
pub mod errors;
pub mod events;
pub mod ids;
