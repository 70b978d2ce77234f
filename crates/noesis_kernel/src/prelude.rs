//! The base ontology installed into every fresh KR instance.
//!
//! Declares the atomic types the rest of the kernel relies on:
//!
//! - `Proposition` — the type of formulas.
//! - `Boolean` — truth-valued terms; a subtype of `Proposition`, so an
//!   atomic predicate application can stand anywhere a formula is expected.
//! - `Entity` — individuals.
//! - `Integer`, `Real` (`Integer <: Real`), `String` — literal carriers.
//! - `World`, `Agent` — indices for modal operators.
//!
//! The names themselves are seeded into every [`Interner`] at construction
//! (see `noesis_base::Symbol`'s constants), so installing the ontology is
//! pure declaration: no string is formatted or looked up here, and a name
//! parsed from source text meets the same `Symbol` the constants carry.
//!
//! [`Interner`]: noesis_base::Interner

use noesis_base::Symbol;

use crate::error::TypeError;
use crate::term::TermStore;
use crate::types::{Type, TypeTable};

/// Symbols of the well-known types.
#[derive(Debug, Clone, Copy)]
pub struct CoreTypes {
    pub proposition: Symbol,
    pub boolean: Symbol,
    pub entity: Symbol,
    pub integer: Symbol,
    pub real: Symbol,
    pub string: Symbol,
    pub world: Symbol,
    pub agent: Symbol,
}

impl CoreTypes {
    /// The type of formulas.
    pub fn prop(&self) -> Type {
        Type::Atomic(self.proposition)
    }

    /// The type of truth-valued atoms.
    pub fn bool_(&self) -> Type {
        Type::Atomic(self.boolean)
    }

    /// The type of individuals.
    pub fn entity_ty(&self) -> Type {
        Type::Atomic(self.entity)
    }
}

/// Declares the base ontology, returning the well-known symbols.
///
/// Idempotent: re-running against a table that already holds the
/// declarations only re-adds existing edges.
pub fn install(types: &mut TypeTable, store: &mut TermStore) -> Result<CoreTypes, TypeError> {
    let core = CoreTypes {
        proposition: Symbol::PROPOSITION,
        boolean: Symbol::BOOLEAN,
        entity: Symbol::ENTITY,
        integer: Symbol::INTEGER,
        real: Symbol::REAL,
        string: Symbol::STRING,
        world: Symbol::WORLD,
        agent: Symbol::AGENT,
    };

    let interner = store.interner();
    types.define_atomic(core.proposition, &[], interner)?;
    types.define_atomic(core.boolean, &[core.proposition], interner)?;
    types.define_atomic(core.entity, &[], interner)?;
    types.define_atomic(core.real, &[], interner)?;
    types.define_atomic(core.integer, &[core.real], interner)?;
    types.define_atomic(core.string, &[], interner)?;
    types.define_atomic(core.world, &[], interner)?;
    types.define_atomic(core.agent, &[], interner)?;

    Ok(core)
}
