//! Context partitions and the tree they form.
//!
//! Contexts live in an arena owned by the store: a [`Partition`] holds its
//! parent's index, the ids of its children, and its own contents. A child
//! copies its parent's *visible* statement list at creation — a consistent
//! snapshot; later changes in the parent, additions or retractions, are
//! invisible to the child. Retraction never rewrites another context: it
//! records tombstones locally.
//!
//! Statements are kept under their original ids with the alpha-canonical
//! id alongside: membership and deduplication go through the canonical id,
//! while matching and rule lookup see the user's variable names.

use noesis_kernel::{ConnectiveKind, QuantKind, TermData, TermId, TermStore};
use rustc_hash::FxHashSet;

use crate::index::PredicateIndex;

/// Handle to a context in the store's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CtxId(pub u32);

impl CtxId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a context treats incoming statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// Accepts anything.
    Standard,
    /// Rejects a statement whose negation is already visible.
    ConsistentOnly,
    /// Accepts nothing; appending is an invariant violation.
    Frozen,
}

/// One stored statement: original id plus its canonical representative.
#[derive(Clone, Copy)]
pub(crate) struct Entry {
    pub(crate) term: TermId,
    pub(crate) canon: TermId,
}

/// A universally-quantified implication split for rule-head lookup.
pub(crate) struct RuleEntry {
    pub(crate) head: TermId,
    pub(crate) body: Vec<TermId>,
}

impl RuleEntry {
    /// Splits `forall xs. body => head` (or a bare implication) into a
    /// rule entry; conjunctions in the body become separate literals.
    pub(crate) fn split(terms: &TermStore, stmt: TermId) -> Option<RuleEntry> {
        let implication = match terms.data(stmt) {
            TermData::Quantifier { kind: QuantKind::Forall, body, .. } => *body,
            TermData::Connective { kind: ConnectiveKind::Implies, .. } => stmt,
            _ => return None,
        };
        match terms.data(implication) {
            TermData::Connective { kind: ConnectiveKind::Implies, operands }
                if operands.len() == 2 =>
            {
                let body = match terms.data(operands[0]) {
                    TermData::Connective { kind: ConnectiveKind::And, operands: conj } => {
                        conj.clone()
                    }
                    _ => vec![operands[0]],
                };
                Some(RuleEntry { head: operands[1], body })
            }
            _ => None,
        }
    }
}

/// One context's contents: inherited snapshot, own statements, tombstones,
/// rules, and retrieval indices.
pub(crate) struct Partition {
    pub(crate) name: String,
    pub(crate) kind: ContextKind,
    pub(crate) parent: Option<CtxId>,
    pub(crate) children: Vec<CtxId>,
    /// Statements inherited from the parent snapshot at creation.
    pub(crate) inherited: Vec<Entry>,
    /// Locally added statements, in insertion order.
    pub(crate) statements: Vec<Entry>,
    /// Canonical ids of everything visible, for O(1) membership.
    pub(crate) members: FxHashSet<TermId>,
    /// Canonical ids retracted locally (own or inherited).
    pub(crate) tombstones: FxHashSet<TermId>,
    pub(crate) rules: Vec<RuleEntry>,
    pub(crate) index: PredicateIndex,
    pub(crate) alive: bool,
}

impl Partition {
    /// A fresh partition over an inherited snapshot.
    pub(crate) fn new(
        name: String,
        kind: ContextKind,
        parent: Option<CtxId>,
        inherited: Vec<Entry>,
    ) -> Partition {
        let members = inherited.iter().map(|e| e.canon).collect();
        Partition {
            name,
            kind,
            parent,
            children: Vec::new(),
            inherited,
            statements: Vec::new(),
            members,
            tombstones: FxHashSet::default(),
            rules: Vec::new(),
            index: PredicateIndex::new(),
            alive: true,
        }
    }

    /// Everything visible: the inherited snapshot plus own statements,
    /// minus local tombstones.
    pub(crate) fn visible(&self) -> impl Iterator<Item = Entry> + '_ {
        self.inherited
            .iter()
            .chain(self.statements.iter())
            .copied()
            .filter(move |e| !self.tombstones.contains(&e.canon))
    }
}
