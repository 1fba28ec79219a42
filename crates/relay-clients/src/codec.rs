//! Structured entity encoding for knowledge-store persistence.
//!
//! Entities are named `<Kind>_<id>` and carry their state as a single JSON
//! document observation, so a store/reload round-trip yields an equivalent
//! object with no field loss.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use relay_core::errors::CoordinationError;

use crate::traits::Entity;

/// Deterministic entity name for a kind + id pair.
pub fn entity_name(kind: &str, id: &str) -> String {
    format!("{kind}_{id}")
}

/// Encode a value as a knowledge-store entity.
pub fn encode<T: Serialize>(kind: &str, id: &str, value: &T) -> Result<Entity, CoordinationError> {
    let body = serde_json::to_string(value)?;
    Ok(Entity {
        name: entity_name(kind, id),
        entity_type: kind.to_string(),
        observations: vec![body],
    })
}

/// Decode an entity back into a value. The payload is the first observation;
/// anything else is `MalformedEntity`.
pub fn decode<T: DeserializeOwned>(entity: &Entity) -> Result<T, CoordinationError> {
    let body = entity
        .observations
        .first()
        .ok_or_else(|| CoordinationError::MalformedEntity {
            name: entity.name.clone(),
            reason: "no observations".into(),
        })?;

    serde_json::from_str(body).map_err(|e| CoordinationError::MalformedEntity {
        name: entity.name.clone(),
        reason: e.to_string(),
    })
}

/// Decode a batch, skipping entities that fail to parse. Each skip warns;
/// a malformed entity never aborts a bulk load.
pub fn decode_lossy<T: DeserializeOwned>(entities: &[Entity]) -> Vec<T> {
    entities
        .iter()
        .filter_map(|entity| match decode::<T>(entity) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(entity = %entity.name, error = %e, "skipping malformed entity");
                None
            }
        })
        .collect()
}
