//! Domain error types.

/// Errors raised by tree validation and quiz composition.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CoreError {
    /// Two nodes share the same id
    #[error("Duplicate knowledge node id: {0}")]
    DuplicateId(String),

    /// Following parent pointers from this node loops back on itself
    #[error("Knowledge node {0} is part of a parent cycle")]
    Cycle(String),

    /// Composition was requested but no question is stored at all
    #[error("The question pool is empty")]
    EmptyQuestionPool,

    /// Composition was requested without any knowledge point
    #[error("At least one knowledge point must be selected")]
    NoKnowledgeSelected,
}

/// Result type alias for domain operations
pub type CoreResult<T> = Result<T, CoreError>;
