//! The noesis kernel: typed higher-order terms and the operations every
//! other crate builds on.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      TermStore                          │
//! │  hash-consed nodes, alpha-canonical identity, metadata  │
//! └─────────────────────────────────────────────────────────┘
//!                │                          │
//!                ▼                          ▼
//! ┌──────────────────────────┐   ┌─────────────────────────┐
//! │        TypeTable         │   │   subst / normalize     │
//! │  subtype DAG, signatures │   │  capture-avoiding ops   │
//! └──────────────────────────┘   └─────────────────────────┘
//!                │                          │
//!                └──────────┬───────────────┘
//!                           ▼
//!              ┌─────────────────────────┐
//!              │         unify           │
//!              │  Martelli–Montanari +   │
//!              │  Miller patterns        │
//!              └─────────────────────────┘
//! ```
//!
//! # Public API
//!
//! - [`TermStore`], [`TermData`], [`TermId`] — the hash-consed AST
//! - [`TypeTable`], [`Type`] — declarations, subtyping, type unification
//! - [`infer`], [`check`] — bidirectional validation of interned terms
//! - [`substitute`], [`free_variables`], [`normalize`] — term surgery
//! - [`unify`], [`unify_ho`] — first-order and pattern unification
//! - [`prelude::install`] — the base ontology every instance starts from

mod error;
mod normalize;
pub mod prelude;
mod subst;
mod term;
mod typecheck;
mod types;
mod unify;

pub use error::{KernelError, KernelResult, TypeError, UnifyError};
pub use normalize::{normalize, normalize_unchecked, NormalForm};
pub use prelude::CoreTypes;
pub use subst::{fold, free_variable_terms, free_variables, map, substitute, Subst};
pub use term::{
    ConnectiveKind, Literal, Metadata, ModalOp, Node, QuantKind, TermData, TermId, TermStore,
    VarId,
};
pub use typecheck::{check, infer, TypeEnv};
pub use types::{apply_type_subst, Type, TypeSubst, TypeTable};
pub use unify::{apply_and_reduce, unify, unify_ho, HoOptions, HoSolution};
