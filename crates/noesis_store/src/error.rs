//! Store errors.

use noesis_kernel::TypeError;
use std::fmt;

/// Failures raised by knowledge-store operations.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// The named context does not exist (or has been deleted).
    UnknownContext(String),

    /// The statement failed type checking on `add`.
    Type(TypeError),

    /// A statement contradicts a consistent-only context.
    Contradiction { context: String },

    /// An operation broke a store invariant, e.g. appending to a frozen
    /// context. Indicates a caller bug; never swallowed.
    InvariantViolation(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::UnknownContext(name) => write!(f, "unknown context '{}'", name),
            StoreError::Type(e) => write!(f, "{}", e),
            StoreError::Contradiction { context } => {
                write!(f, "statement contradicts consistent-only context '{}'", context)
            }
            StoreError::InvariantViolation(msg) => {
                write!(f, "store invariant violated: {}", msg)
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<TypeError> for StoreError {
    fn from(e: TypeError) -> Self {
        StoreError::Type(e)
    }
}
