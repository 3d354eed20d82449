//! # Storage Projection
//!
//! Two-way mapping between the stored hierarchical document and the
//! normalized [`DomainState`](crate::model::DomainState).
//!
//! ```text
//!            to_domain(storage, ctx)
//!   storage ─────────────────────────▶ domain
//!      ▲                                 │
//!      └──────── to_storage(domain, prior)
//! ```
//!
//! `to_domain` is lenient and total: anything it cannot read is treated as
//! absent. `to_storage` writes onto the prior document so unmodelled
//! fields survive, and [`check_round_trip`] verifies that nothing the
//! domain understands drifts on the way through.

mod round_trip;
pub(crate) mod stored;
mod to_domain;
mod to_storage;

pub use round_trip::check_round_trip;
pub use to_domain::to_domain;
pub use to_storage::to_storage;

use serde_json::{json, Map, Value};

use crate::constants::{MODEL_VERSION, RESOURCE_TYPES};
use crate::error::DomainError;
use crate::model::Timestamp;

/// Inputs `to_domain` needs beyond the document itself
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionContext {
    /// Used when the document carries no project id
    pub project_id: String,
    /// Stamped onto entities that have no timestamps
    pub now: Timestamp,
}

impl ProjectionContext {
    pub fn new(project_id: &str, now: Timestamp) -> Self {
        Self {
            project_id: project_id.to_string(),
            now,
        }
    }
}

fn empty_collection() -> Value {
    json!({"items": {}, "order": []})
}

/// Storage document for a brand-new project
pub fn initial_storage_state(project_id: &str) -> Value {
    let mut root = Map::new();
    root.insert("model_version".into(), json!(MODEL_VERSION));
    root.insert(
        "project".into(),
        json!({"id": project_id, "name": "", "description": ""}),
    );
    root.insert("story".into(), json!({"initialSceneId": null}));
    for kind in RESOURCE_TYPES {
        root.insert(kind.to_string(), empty_collection());
    }
    root.insert("variables".into(), empty_collection());
    root.insert("layouts".into(), empty_collection());
    root.insert("scenes".into(), empty_collection());
    Value::Object(root)
}

/// Reject documents written for another model version
pub fn assert_supported_version(storage: &Value) -> Result<(), DomainError> {
    let found = storage.get("model_version");
    if found.and_then(Value::as_u64) == Some(MODEL_VERSION) {
        return Ok(());
    }
    Err(DomainError::UnsupportedModelVersion {
        expected: MODEL_VERSION,
        found: found.map_or_else(|| "none".to_string(), Value::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_shape() {
        let state = initial_storage_state("p1");
        assert_eq!(state["model_version"], json!(2));
        assert_eq!(state["project"]["id"], json!("p1"));
        assert_eq!(state["story"]["initialSceneId"], Value::Null);
        for kind in RESOURCE_TYPES {
            assert_eq!(state[kind], empty_collection(), "{}", kind);
        }
        assert_eq!(state["scenes"], empty_collection());
        assert!(assert_supported_version(&state).is_ok());
    }

    #[test]
    fn test_version_mismatch_reports_found_value() {
        let err = assert_supported_version(&json!({"model_version": 1})).unwrap_err();
        assert_eq!(
            err,
            DomainError::UnsupportedModelVersion {
                expected: 2,
                found: "1".into()
            }
        );
        let err = assert_supported_version(&json!({})).unwrap_err();
        assert_eq!(err.code(), "unsupported_model_version");
    }

    #[test]
    fn test_initial_state_survives_round_trip() {
        let state = initial_storage_state("p1");
        let ctx = ProjectionContext::new("p1", 7);
        assert!(check_round_trip(&state, &ctx).is_ok());
    }
}
