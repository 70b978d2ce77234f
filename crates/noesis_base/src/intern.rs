//! Symbol interning, seeded with the kernel's well-known names.
//!
//! Predicate, type, and variable names are compared constantly during
//! unification and retrieval; a [`Symbol`] is an integer handle so those
//! comparisons never touch string data. Two noesis-specific twists on the
//! usual interner:
//!
//! - The base ontology's type names (`Proposition`, `Boolean`, `Entity`,
//!   ...) are interned at construction, in a fixed order, so they are
//!   available as [`Symbol`] constants. The prelude declares them and the
//!   lexer recognizes them without ever formatting or looking up a string,
//!   and a name arriving from parsed text resolves to the same handle as
//!   the constant.
//! - [`Interner::numbered`] builds `prefix` + counter names in one place.
//!   The alpha-canonicalizer (`v0, v1, ...`) and the skolemizer
//!   (`sk0, sk1, ...`) both mint such families, and routing them through
//!   the interner keeps the formatting out of their inner loops.
//!
//! ## Example
//!
//! ```
//! use noesis_base::{Interner, Symbol};
//!
//! let mut interner = Interner::new();
//! // Core names are pre-seeded.
//! assert_eq!(interner.lookup("Entity"), Some(Symbol::ENTITY));
//! // User names intern once.
//! let mortal = interner.intern("Mortal");
//! assert_eq!(mortal, interner.intern("Mortal"));
//! assert_eq!(interner.resolve(mortal), "Mortal");
//! ```

use rustc_hash::FxHashMap;
use std::fmt::Write;

/// Names interned by [`Interner::new`], in order. Index = symbol id.
const SEEDED: [&str; 9] = [
    "",
    "Proposition",
    "Boolean",
    "Entity",
    "Integer",
    "Real",
    "String",
    "World",
    "Agent",
];

/// A lightweight handle to an interned string.
///
/// Symbols are `Copy` and compare in O(1). Use [`Interner::resolve`] to
/// get the original string back. The constants below are valid in every
/// interner because the names are seeded at construction.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Symbol(u32);

impl Symbol {
    /// The empty string, always at index 0.
    pub const EMPTY: Symbol = Symbol(0);
    /// The type of formulas.
    pub const PROPOSITION: Symbol = Symbol(1);
    /// The type of truth-valued atoms.
    pub const BOOLEAN: Symbol = Symbol(2);
    /// The type of individuals.
    pub const ENTITY: Symbol = Symbol(3);
    pub const INTEGER: Symbol = Symbol(4);
    pub const REAL: Symbol = Symbol(5);
    pub const STRING: Symbol = Symbol(6);
    /// Index type of alethic modal operators.
    pub const WORLD: Symbol = Symbol(7);
    /// Index type of epistemic and doxastic operators.
    pub const AGENT: Symbol = Symbol(8);

    /// Internal index, usable for dense side tables.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Default for Symbol {
    fn default() -> Self {
        Symbol::EMPTY
    }
}

/// Stores each distinct string once and maps it to a [`Symbol`].
pub struct Interner {
    map: FxHashMap<Box<str>, Symbol>,
    strings: Vec<Box<str>>,
}

impl Interner {
    /// Creates an interner holding the seeded well-known names.
    pub fn new() -> Self {
        let mut interner = Interner {
            map: FxHashMap::default(),
            strings: Vec::with_capacity(SEEDED.len()),
        };
        for name in SEEDED {
            interner.insert_new(name.to_string());
        }
        interner
    }

    /// Interns `s`, returning the existing symbol if it is already known.
    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&sym) = self.map.get(s) {
            return sym;
        }
        self.insert_new(s.to_string())
    }

    /// Interns the name `{prefix}{n}`, e.g. `v0` or `sk3`.
    pub fn numbered(&mut self, prefix: &str, n: u32) -> Symbol {
        let mut name = String::with_capacity(prefix.len() + 4);
        name.push_str(prefix);
        let _ = write!(name, "{}", n);
        if let Some(&sym) = self.map.get(name.as_str()) {
            return sym;
        }
        self.insert_new(name)
    }

    fn insert_new(&mut self, owned: String) -> Symbol {
        let sym = Symbol(self.strings.len() as u32);
        let boxed: Box<str> = owned.into_boxed_str();
        self.strings.push(boxed.clone());
        self.map.insert(boxed, sym);
        sym
    }

    /// Returns the string behind `sym`.
    ///
    /// # Panics
    ///
    /// Panics if `sym` came from a different interner.
    pub fn resolve(&self, sym: Symbol) -> &str {
        &self.strings[sym.0 as usize]
    }

    /// Looks a string up without interning it.
    pub fn lookup(&self, s: &str) -> Option<Symbol> {
        self.map.get(s).copied()
    }

    /// Number of interned strings, counting the seeded names.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// `true` when nothing beyond the seeded names has been interned.
    pub fn is_empty(&self) -> bool {
        self.strings.len() <= SEEDED.len()
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_constants_resolve_to_their_names() {
        let interner = Interner::new();
        assert_eq!(interner.resolve(Symbol::EMPTY), "");
        assert_eq!(interner.resolve(Symbol::PROPOSITION), "Proposition");
        assert_eq!(interner.resolve(Symbol::BOOLEAN), "Boolean");
        assert_eq!(interner.resolve(Symbol::ENTITY), "Entity");
        assert_eq!(interner.resolve(Symbol::AGENT), "Agent");
    }

    #[test]
    fn parsed_core_name_meets_its_constant() {
        let mut interner = Interner::new();
        // A name arriving from source text resolves to the seeded handle.
        assert_eq!(interner.intern("Boolean"), Symbol::BOOLEAN);
        assert_eq!(interner.lookup("World"), Some(Symbol::WORLD));
    }

    #[test]
    fn same_string_same_symbol() {
        let mut interner = Interner::new();
        assert_eq!(interner.intern("Flies"), interner.intern("Flies"));
    }

    #[test]
    fn different_strings_different_symbols() {
        let mut interner = Interner::new();
        assert_ne!(interner.intern("Bird"), interner.intern("Penguin"));
    }

    #[test]
    fn numbered_matches_the_formatted_name() {
        let mut interner = Interner::new();
        let via_numbered = interner.numbered("v", 3);
        let via_intern = interner.intern("v3");
        assert_eq!(via_numbered, via_intern);
        assert_eq!(interner.resolve(via_numbered), "v3");
    }

    #[test]
    fn numbered_families_do_not_collide() {
        let mut interner = Interner::new();
        assert_ne!(interner.numbered("v", 0), interner.numbered("sk", 0));
        assert_ne!(interner.numbered("sk", 0), interner.numbered("sk", 1));
    }

    #[test]
    fn lookup_does_not_intern() {
        let mut interner = Interner::new();
        let before = interner.len();
        assert!(interner.lookup("ghost").is_none());
        assert_eq!(interner.len(), before);
        interner.intern("ghost");
        assert!(interner.lookup("ghost").is_some());
    }

    #[test]
    fn is_empty_means_only_seeds() {
        let mut interner = Interner::new();
        assert!(interner.is_empty());
        interner.intern("something");
        assert!(!interner.is_empty());
    }
}
