//! Error types for the domain layer

use tessera_hierarchy::HierarchyError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Command validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Unsupported model version: expected {expected}, got {found}")]
    UnsupportedModelVersion { expected: u64, found: String },

    #[error("No typed projection handler for command type '{0}'")]
    NoProjectionHandler(String),

    #[error("Unknown domain event type: {0}")]
    UnknownEvent(String),

    #[error("Malformed {kind} payload: {message}")]
    MalformedPayload { kind: String, message: String },

    #[error("{kind} not found: {id}")]
    MissingEntity { kind: &'static str, id: String },

    #[error("Projection drift at {0}")]
    ProjectionDrift(String),

    #[error("Hierarchy error: {0}")]
    Hierarchy(#[from] HierarchyError),
}

impl DomainError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_)
            | DomainError::Precondition(_)
            | DomainError::Invariant(_)
            | DomainError::MalformedPayload { .. } => "validation_failed",
            DomainError::UnsupportedModelVersion { .. } => "unsupported_model_version",
            DomainError::NoProjectionHandler(_) | DomainError::UnknownEvent(_) => "unsupported_command",
            DomainError::MissingEntity { .. } => "not_found",
            DomainError::ProjectionDrift(_) => "projection_drift",
            DomainError::Hierarchy(_) => "malformed_state",
        }
    }

    pub(crate) fn missing(kind: &'static str, id: &str) -> Self {
        DomainError::MissingEntity {
            kind,
            id: id.to_string(),
        }
    }
}
