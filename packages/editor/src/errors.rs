//! Error types for the editor

use tessera_domain::DomainError;
use tessera_hierarchy::HierarchyError;
use tessera_journal::{JournalError, PathError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Hierarchy error: {0}")]
    Hierarchy(#[from] HierarchyError),

    #[error("No typed projection handler for command type '{0}'")]
    NoProjectionHandler(String),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),
}

impl From<PathError> for EditorError {
    fn from(e: PathError) -> Self {
        EditorError::Journal(JournalError::Path(e))
    }
}

impl EditorError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            EditorError::Journal(_) => "journal_error",
            EditorError::Domain(e) => e.code(),
            EditorError::Store(_) => "store_error",
            EditorError::Hierarchy(_) => "malformed_state",
            EditorError::NoProjectionHandler(_) => "unsupported_command",
            EditorError::UnknownCollection(_) => "not_found",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Corrupt event at line {line}: {message}")]
    Corrupt { line: usize, message: String },

    #[error("Failed to encode event: {0}")]
    Encode(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}
