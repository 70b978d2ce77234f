//! Per-partition retrieval indices.
//!
//! Three indices per partition, per the retrieval paths the engine needs:
//!
//! - primary: `(predicate symbol, arity)` -> facts;
//! - per-argument-position: `(symbol, arity, position, canonical hash of the
//!   ground argument)` -> facts, for selective lookup when a query pattern
//!   has ground arguments;
//! - type index: ground argument term -> its narrowest atomic type.

use noesis_base::Symbol;
use noesis_kernel::{free_variables, TermData, TermId, TermStore, Type, TypeTable};
use rustc_hash::FxHashMap;

/// Retrieval indices over one partition's facts.
#[derive(Default)]
pub struct PredicateIndex {
    by_symbol: FxHashMap<(Symbol, usize), Vec<TermId>>,
    by_arg: FxHashMap<(Symbol, usize, usize, u64), Vec<TermId>>,
    by_type: FxHashMap<TermId, Symbol>,
}

impl PredicateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes one fact. Non-applications (negations, quantified
    /// statements) are not indexed here; they are found by scan.
    pub fn insert(&mut self, store: &mut TermStore, types: &TypeTable, fact: TermId) {
        let (head, args) = match store.data(fact) {
            TermData::Application { operator, arguments } => (*operator, arguments.clone()),
            _ => return,
        };
        let symbol = match store.data(head) {
            TermData::Constant { name, .. } => *name,
            _ => return,
        };
        let arity = args.len();
        self.by_symbol.entry((symbol, arity)).or_default().push(fact);

        for (pos, arg) in args.iter().enumerate() {
            if free_variables(store, *arg).is_empty() {
                let hash = store.content_hash(*arg);
                self.by_arg
                    .entry((symbol, arity, pos, hash))
                    .or_default()
                    .push(fact);
                self.record_type(store, types, *arg);
            }
        }
    }

    /// Remembers the narrowest atomic type of a ground term.
    fn record_type(&mut self, store: &TermStore, types: &TypeTable, term: TermId) {
        let atomic = match store.ty(term) {
            Type::Atomic(sym) => *sym,
            _ => return,
        };
        match self.by_type.get(&term) {
            // Keep the narrower of the two candidates.
            Some(existing)
                if types.is_subtype(&Type::Atomic(*existing), &Type::Atomic(atomic)) => {}
            _ => {
                self.by_type.insert(term, atomic);
            }
        }
    }

    /// Candidate facts for a pattern, using the most selective index that
    /// applies. `None` means the pattern is not an indexed shape and the
    /// caller should scan.
    pub fn candidates(&self, store: &mut TermStore, pattern: TermId) -> Option<Vec<TermId>> {
        let (head, args) = match store.data(pattern) {
            TermData::Application { operator, arguments } => (*operator, arguments.clone()),
            _ => return None,
        };
        let symbol = match store.data(head) {
            TermData::Constant { name, .. } => *name,
            _ => return None,
        };
        let arity = args.len();

        // Prefer a ground argument position: its bucket is no larger than
        // the symbol bucket.
        for (pos, arg) in args.iter().enumerate() {
            if free_variables(store, *arg).is_empty() {
                let hash = store.content_hash(*arg);
                return Some(
                    self.by_arg
                        .get(&(symbol, arity, pos, hash))
                        .cloned()
                        .unwrap_or_default(),
                );
            }
        }
        Some(self.by_symbol.get(&(symbol, arity)).cloned().unwrap_or_default())
    }

    /// The narrowest atomic type recorded for a ground term.
    pub fn type_of(&self, term: TermId) -> Option<Symbol> {
        self.by_type.get(&term).copied()
    }
}
