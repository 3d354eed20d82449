//! Error types for the journal

use tessera_hierarchy::HierarchyError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    #[error("Path is empty")]
    Empty,

    #[error("Path '{0}' has an empty segment")]
    EmptySegment(String),

    #[error("Path '{path}' is missing segment '{segment}'")]
    Missing { path: String, segment: String },

    #[error("Path '{path}' passes through a non-object at '{segment}'")]
    NotAnObject { path: String, segment: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum JournalError {
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    #[error("Hierarchy error: {0}")]
    Hierarchy(#[from] HierarchyError),

    #[error("set with replace=false needs an object or scalar value at '{0}', got an array")]
    InvalidSetValue(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("State root is not an object")]
    StateNotAnObject,
}
