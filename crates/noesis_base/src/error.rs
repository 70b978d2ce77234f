//! User-facing errors with source locations.
//!
//! Failures triggered by user input (syntax errors, unknown symbols) carry
//! the [`Span`] of the offending text so the CLI can point at it. Errors
//! raised on synthesized terms use [`Span::dummy`].

use crate::span::Span;
use std::fmt;

/// An error annotated with where in the source it occurred.
///
/// Displays as `{message} at {start}..{end}`.
#[derive(Debug, Clone)]
pub struct SpannedError {
    /// Human-readable description.
    pub message: String,
    /// Location in the source text.
    pub span: Span,
}

impl SpannedError {
    /// Creates an error at the given location.
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        SpannedError {
            message: message.into(),
            span,
        }
    }

    /// Creates an error with no useful location.
    pub fn unspanned(message: impl Into<String>) -> Self {
        SpannedError::new(message, Span::dummy())
    }
}

impl fmt::Display for SpannedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.span)
    }
}

impl std::error::Error for SpannedError {}

/// Alias for `std::result::Result<T, SpannedError>`.
pub type Result<T> = std::result::Result<T, SpannedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message_and_span() {
        let err = SpannedError::new("unexpected token", Span::new(2, 6));
        let shown = err.to_string();
        assert!(shown.contains("unexpected token"));
        assert!(shown.contains("2..6"));
    }
}
