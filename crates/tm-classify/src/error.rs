//! Classification error types.

use thiserror::Error;

/// Errors raised while building patterns and parsers from configuration.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("invalid pattern {pattern:?}: {message}")]
    Pattern { pattern: String, message: String },

    #[error("placeholder does not exist: {0}")]
    UnknownPlaceholder(String),

    #[error("placeholder cycle: {0}")]
    PlaceholderCycle(String),

    #[error("regex could not be compiled: {name} ({message})")]
    Regex { name: String, message: String },

    #[error("regex {name} must define the named groups 'source' and 'message'")]
    MissingGroups { name: String },
}

/// Convenience alias for classification results.
pub type ClassifyResult<T> = Result<T, ClassifyError>;
