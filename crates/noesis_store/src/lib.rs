//! Context-partitioned knowledge store.
//!
//! A [`KnowledgeStore`] maps opaque context ids to partitions of facts and
//! rules, each with retrieval indices. Contexts form a tree (see the
//! `context` module); a child sees a snapshot of its parent at creation
//! and shadows entries by local retraction. Reserved names like
//! `"TRUTHS"`, `"BELIEFS/*"`, and `"HYPOTHETICAL/*"` are conventions, not
//! enforced.
//!
//! `query` does indexed structural matching plus rule-head lookup of depth
//! one; the inference engine owns everything deeper.

mod context;
mod error;
mod index;
mod matching;
mod store;

pub use context::{ContextKind, CtxId};
pub use error::StoreError;
pub use index::PredicateIndex;
pub use matching::{match_terms, resolve_bindings, Binding};
pub use store::{negate, KnowledgeStore, QueryIter};
