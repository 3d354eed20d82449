//! Error types for hierarchy collections

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HierarchyError {
    #[error("Duplicate requires a non-empty seed")]
    MissingSeed,

    #[error("Order references unknown item: {0}")]
    DanglingNode(String),

    #[error("Item appears more than once in order: {0}")]
    DuplicateNode(String),

    #[error("Item stores its own id field: {0}")]
    StoredId(String),

    #[error("Reserved id used as an item: {0}")]
    ReservedId(String),

    #[error("Item is not an object: {0}")]
    NotAnObject(String),

    #[error("Malformed collection: {0}")]
    Malformed(String),
}
