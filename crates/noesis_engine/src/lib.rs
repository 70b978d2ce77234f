//! The inference engine: a coordinator dispatching between resolution,
//! modal tableau, argumentation, and external theory bridges, all replying
//! with the same [`ProofObject`] type.
//!
//! # Architecture
//!
//! ```text
//!                    ┌──────────────────────────┐
//!                    │       Coordinator        │
//!                    │ goal analysis, fallback, │
//!                    │   resource governance    │
//!                    └──────────────────────────┘
//!                       │       │       │     │
//!          ┌────────────┘       │       │     └───────────┐
//!          ▼                    ▼       ▼                 ▼
//! ┌────────────────┐ ┌──────────────┐ ┌───────────────┐ ┌─────────────┐
//! │   Resolution   │ │ ModalTableau │ │ Argumentation │ │ TheoryBridge│
//! │ CNF + set-of-  │ │ K/T/B/S4/S5  │ │ grounded /    │ │ (interface) │
//! │ support + subs │ │ + blocking   │ │ preferred     │ │             │
//! └────────────────┘ └──────────────┘ └───────────────┘ └─────────────┘
//! ```
//!
//! Every prover runs to completion or budget exhaustion and returns; the
//! only suspension points are the budget check every
//! [`limits::CHECK_GRANULARITY`] steps and bridge delegation. Logical
//! failure is data, not an error.

pub mod agm;
pub mod argumentation;
mod bridge;
mod cnf;
mod coordinator;
pub mod limits;
mod proof;
pub mod resolution;
pub mod tableau;

pub use argumentation::{justified_beliefs, DefeasibleRule, Semantics};
pub use bridge::{BridgeOptions, TheoryBridge, TheoryVerdict};
pub use cnf::{clausify, subsumes, Clause, Literal, SkolemState};
pub use coordinator::{contains_modal, Coordinator, EngineError, Hints, Strategy};
pub use limits::{Budget, CancelFlag, ResourceLimits, CHECK_GRANULARITY};
pub use proof::{
    EngineKind, ProofBindings, ProofObject, ProofStatus, ProofStep, ResourceDimension,
};
pub use tableau::{prove_valid, ModalSystem};
