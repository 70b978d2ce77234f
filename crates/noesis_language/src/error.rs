//! Parser and lowering errors with source locations.

use noesis_base::Span;
use noesis_kernel::TypeError;
use std::fmt;

/// What went wrong in a parse or lowering step.
#[derive(Debug, Clone)]
pub enum ParseErrorKind {
    /// Malformed syntax; `expected` names what the parser was looking for.
    Syntax { expected: String },

    /// A name with no declaration, in strict mode.
    UnknownSymbol { name: String },

    /// A typing failure discovered while lowering.
    Type(TypeError),
}

/// A parse error anchored to a source span.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
}

impl ParseError {
    pub fn syntax(expected: impl Into<String>, span: Span) -> Self {
        ParseError { kind: ParseErrorKind::Syntax { expected: expected.into() }, span }
    }

    pub fn unknown(name: impl Into<String>, span: Span) -> Self {
        ParseError { kind: ParseErrorKind::UnknownSymbol { name: name.into() }, span }
    }

    pub fn typing(err: TypeError, span: Span) -> Self {
        ParseError { kind: ParseErrorKind::Type(err), span }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ParseErrorKind::Syntax { expected } => {
                write!(f, "syntax error at {}: expected {}", self.span, expected)
            }
            ParseErrorKind::UnknownSymbol { name } => {
                write!(f, "unknown symbol '{}' at {}", name, self.span)
            }
            ParseErrorKind::Type(e) => write!(f, "{} at {}", e, self.span),
        }
    }
}

impl std::error::Error for ParseError {}
