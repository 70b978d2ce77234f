//! Structural atoms shared by every noesis crate.
//!
//! This crate holds the pieces with no logical content of their own:
//! source [`Span`]s, the seeded string [`Interner`], and [`SpannedError`]
//! for user-facing failures. Nothing here knows about terms, types, or
//! proofs.

mod error;
mod intern;
mod span;

pub use error::{Result, SpannedError};
pub use intern::{Interner, Symbol};
pub use span::Span;
