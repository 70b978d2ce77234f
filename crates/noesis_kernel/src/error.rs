//! Error types for the kernel.
//!
//! Two disjoint families live here. [`TypeError`] covers user-level typing
//! failures: unknown symbols, arity clashes, mismatched types. They are
//! recoverable and propagate as ordinary `Err` values. [`KernelError`] adds
//! the invariant-violation family on top; those indicate a bug in a caller
//! (or in the kernel itself) and are surfaced with full context, never
//! swallowed.

use crate::types::Type;
use std::fmt;

/// Typing failures raised by signature lookup, checking, and inference.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeError {
    /// A symbol has no entry in the signature table.
    UndefinedSymbol(String),

    /// An operator was applied to the wrong number of arguments.
    Arity { symbol: String, expected: usize, actual: usize },

    /// Checking found one type where another was required.
    TypeMismatch { expected: Type, actual: Type },

    /// A type variable occurs inside the type it would be bound to.
    OccursCheck { var: String },

    /// Inserting a subtype edge would close a cycle in the DAG.
    CyclicSubtype { name: String },
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::UndefinedSymbol(name) => write!(f, "undefined symbol '{}'", name),
            TypeError::Arity { symbol, expected, actual } => {
                write!(f, "'{}' expects {} arguments, got {}", symbol, expected, actual)
            }
            TypeError::TypeMismatch { expected, actual } => {
                write!(f, "type mismatch: expected {}, found {}", expected, actual)
            }
            TypeError::OccursCheck { var } => {
                write!(f, "type variable '{}' occurs in its own binding", var)
            }
            TypeError::CyclicSubtype { name } => {
                write!(f, "subtype edge through '{}' would create a cycle", name)
            }
        }
    }
}

impl std::error::Error for TypeError {}

/// Unification failures.
///
/// These are outcomes, not bugs: a failed unification simply means the two
/// terms have no common instance under the requested mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnifyError {
    /// A variable would be bound to a term containing itself.
    OccursCheck,

    /// Two applications of the same operator with different argument counts.
    ArityMismatch,

    /// Two distinct rigid heads.
    SymbolClash,

    /// A flex term whose arguments are not distinct bound variables, in a
    /// position where pattern unification was required.
    NotAPattern,

    /// The bounded imitation/projection search ran out of depth.
    DepthExceeded,
}

impl fmt::Display for UnifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnifyError::OccursCheck => write!(f, "occurs check failed"),
            UnifyError::ArityMismatch => write!(f, "arity mismatch"),
            UnifyError::SymbolClash => write!(f, "rigid symbol clash"),
            UnifyError::NotAPattern => write!(f, "term is outside the pattern fragment"),
            UnifyError::DepthExceeded => write!(f, "higher-order search depth exceeded"),
        }
    }
}

impl std::error::Error for UnifyError {}

/// Kernel-level failure: a typing error or a broken invariant.
#[derive(Debug, Clone)]
pub enum KernelError {
    /// Recoverable typing failure.
    Type(TypeError),

    /// A kernel invariant did not hold. Indicates a bug; callers should
    /// propagate this to the API boundary rather than handle it.
    InvariantViolation(String),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::Type(e) => write!(f, "{}", e),
            KernelError::InvariantViolation(msg) => {
                write!(f, "kernel invariant violated: {}", msg)
            }
        }
    }
}

impl std::error::Error for KernelError {}

impl From<TypeError> for KernelError {
    fn from(e: TypeError) -> Self {
        KernelError::Type(e)
    }
}

/// Alias for kernel results.
pub type KernelResult<T> = std::result::Result<T, KernelError>;
