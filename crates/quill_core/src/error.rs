//! Core error types for QUILL.

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Invalid ID format
    #[error("Invalid ID: {reason}")]
    InvalidId {
        /// What went wrong
        reason: String,
    },

    /// Unknown role name
    #[error("Unknown role: {name}")]
    UnknownRole {
        /// The rejected name
        name: String,
    },
}
