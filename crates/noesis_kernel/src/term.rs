//! Hash-consed term representation.
//!
//! Every AST node lives in a [`TermStore`]: payloads are held in a vector,
//! [`TermId`] handles point into it, and a map from payload to id guarantees
//! that structurally identical constructions share one identity. Equality of
//! interned terms is an integer compare.
//!
//! # Alpha-canonical identity
//!
//! Structural sharing alone would distinguish `forall ?x. P(?x)` from
//! `forall ?y. P(?y)`, because bound variables carry distinct ids. The store
//! therefore computes, per term, a *canonical representative* in which bound
//! variables are renamed `v0, v1, ...` in introduction order. Two terms are
//! alpha-equivalent exactly when their canonical representatives are the
//! same id, and the content hash of a term is derived from that
//! representative. This gives both directions of the hashing invariant:
//! alpha-equal terms hash equal, and equal hashes mean alpha-equal terms.
//!
//! # Metadata
//!
//! Source spans, confidence, and probability annotations live in a side
//! table keyed by id. Identity is purely structural; re-annotating a term
//! overwrites the previous metadata, last writer wins.

use noesis_base::{Interner, Span, Symbol};
use rustc_hash::FxHashMap;
use std::hash::{Hash, Hasher};

use crate::types::Type;

/// Handle to an interned term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(pub u32);

impl TermId {
    /// Internal index, usable for dense side tables.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a variable binding occurrence.
///
/// Ids at or above [`VarId::CANONICAL_BASE`] are reserved for the canonical
/// representatives the store synthesizes; user-facing variables count up
/// from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

impl VarId {
    /// First id in the canonical namespace.
    pub const CANONICAL_BASE: u32 = 0x8000_0000;

    /// The n-th canonical variable id.
    pub fn canonical(n: u32) -> VarId {
        VarId(Self::CANONICAL_BASE + n)
    }

    /// `true` for ids synthesized during alpha-canonicalization.
    pub fn is_canonical(self) -> bool {
        self.0 >= Self::CANONICAL_BASE
    }
}

/// Primitive constant values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float. Compared and hashed by bit pattern.
    Real(f64),
    /// UTF-8 string.
    Text(String),
}

impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Literal::Int(n) => {
                0u8.hash(state);
                n.hash(state);
            }
            Literal::Real(x) => {
                1u8.hash(state);
                x.to_bits().hash(state);
            }
            Literal::Text(s) => {
                2u8.hash(state);
                s.hash(state);
            }
        }
    }
}

/// Quantifier kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantKind {
    Forall,
    Exists,
}

/// Logical connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectiveKind {
    Not,
    And,
    Or,
    Implies,
    Equiv,
}

/// Modal operators.
///
/// `Knows` and `Believes` take an agent term; `Necessity` and `Possibility`
/// may carry an explicit world term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModalOp {
    /// Box.
    Necessity,
    /// Diamond.
    Possibility,
    /// Epistemic K_a.
    Knows,
    /// Doxastic B_a.
    Believes,
}

/// An interned node payload. Children are ids into the same store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermData {
    /// A named constant, optionally carrying a literal value.
    Constant { name: Symbol, value: Option<Literal> },

    /// A variable occurrence. `var` is unique per binding occurrence.
    Variable { name: Symbol, var: VarId },

    /// Application of an operator term to argument terms.
    Application { operator: TermId, arguments: Vec<TermId> },

    /// `forall`/`exists` over one or more bound variables.
    Quantifier { kind: QuantKind, bound: Vec<TermId>, body: TermId },

    /// A logical connective over its operands.
    Connective { kind: ConnectiveKind, operands: Vec<TermId> },

    /// A modal operator applied to a proposition.
    Modal { op: ModalOp, index: Option<TermId>, body: TermId },

    /// Lambda abstraction over one or more bound variables.
    Lambda { bound: Vec<TermId>, body: TermId },

    /// A named definition with a declared type.
    Definition { symbol: Symbol, declared_type: Type, body: TermId },
}

/// One stored node: payload plus its type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    pub data: TermData,
    pub ty: Type,
}

/// Optional per-term annotations, kept outside the structural identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    /// Where the term came from in source text.
    pub span: Option<Span>,
    /// Degree of belief attached by the caller, in `[0, 1]`.
    pub confidence: Option<f64>,
    /// Probability weight for weighted-formula bridges, in `[0, 1]`.
    pub probability: Option<f64>,
}

/// The hash-consing arena for terms.
///
/// Owns the string [`Interner`] as well, since canonicalization has to mint
/// `v0, v1, ...` names.
pub struct TermStore {
    nodes: Vec<Node>,
    cons: FxHashMap<Node, TermId>,
    canon: Vec<Option<TermId>>,
    meta: FxHashMap<TermId, Metadata>,
    vars: FxHashMap<VarId, TermId>,
    interner: Interner,
    next_var: u32,
}

impl TermStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        TermStore {
            nodes: Vec::new(),
            cons: FxHashMap::default(),
            canon: Vec::new(),
            meta: FxHashMap::default(),
            vars: FxHashMap::default(),
            interner: Interner::new(),
            next_var: 0,
        }
    }

    /// Shared access to the interner.
    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Mutable access to the interner (lexing, symbol creation).
    pub fn interner_mut(&mut self) -> &mut Interner {
        &mut self.interner
    }

    /// Number of interned nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` when nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Interns a payload/type pair, returning the existing id when the same
    /// construction was seen before.
    pub fn intern(&mut self, data: TermData, ty: Type) -> TermId {
        let node = Node { data, ty };
        if let Some(&id) = self.cons.get(&node) {
            return id;
        }
        let id = TermId(self.nodes.len() as u32);
        self.nodes.push(node.clone());
        self.canon.push(None);
        if let TermData::Variable { var, .. } = &node.data {
            self.vars.entry(*var).or_insert(id);
        }
        self.cons.insert(node, id);
        id
    }

    /// The variable node first interned for a given id, for rendering
    /// bindings back to names.
    pub fn var_term(&self, var: VarId) -> Option<TermId> {
        self.vars.get(&var).copied()
    }

    /// Payload of a node.
    pub fn data(&self, id: TermId) -> &TermData {
        &self.nodes[id.index()].data
    }

    /// Type of a node.
    pub fn ty(&self, id: TermId) -> &Type {
        &self.nodes[id.index()].ty
    }

    /// Mints a fresh variable id.
    pub fn fresh_var_id(&mut self) -> VarId {
        let id = VarId(self.next_var);
        self.next_var += 1;
        id
    }

    // ------------------------------------------------------------------
    // Typed constructors
    // ------------------------------------------------------------------

    /// Interns a constant with the given type.
    pub fn constant(&mut self, name: Symbol, value: Option<Literal>, ty: Type) -> TermId {
        self.intern(TermData::Constant { name, value }, ty)
    }

    /// Interns a fresh variable: a new `var_id` is assigned.
    pub fn fresh_variable(&mut self, name: Symbol, ty: Type) -> TermId {
        let var = self.fresh_var_id();
        self.intern(TermData::Variable { name, var }, ty)
    }

    /// Interns a variable occurrence with a known id (for rebuilding terms).
    pub fn variable(&mut self, name: Symbol, var: VarId, ty: Type) -> TermId {
        self.intern(TermData::Variable { name, var }, ty)
    }

    /// Interns an application node.
    pub fn application(&mut self, operator: TermId, arguments: Vec<TermId>, ty: Type) -> TermId {
        self.intern(TermData::Application { operator, arguments }, ty)
    }

    /// Interns a quantifier node. `bound` must be Variable ids.
    pub fn quantifier(&mut self, kind: QuantKind, bound: Vec<TermId>, body: TermId, ty: Type) -> TermId {
        self.intern(TermData::Quantifier { kind, bound, body }, ty)
    }

    /// Interns a connective node.
    pub fn connective(&mut self, kind: ConnectiveKind, operands: Vec<TermId>, ty: Type) -> TermId {
        self.intern(TermData::Connective { kind, operands }, ty)
    }

    /// Interns a modal node.
    pub fn modal(&mut self, op: ModalOp, index: Option<TermId>, body: TermId, ty: Type) -> TermId {
        self.intern(TermData::Modal { op, index, body }, ty)
    }

    /// Interns a lambda node. `bound` must be Variable ids.
    pub fn lambda(&mut self, bound: Vec<TermId>, body: TermId, ty: Type) -> TermId {
        self.intern(TermData::Lambda { bound, body }, ty)
    }

    /// Interns a definition node.
    pub fn definition(&mut self, symbol: Symbol, declared_type: Type, body: TermId) -> TermId {
        let ty = declared_type.clone();
        self.intern(TermData::Definition { symbol, declared_type, body }, ty)
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    /// Attaches metadata to a term, replacing any previous annotation.
    pub fn set_metadata(&mut self, id: TermId, meta: Metadata) {
        self.meta.insert(id, meta);
    }

    /// Metadata previously attached to a term.
    pub fn metadata(&self, id: TermId) -> Option<&Metadata> {
        self.meta.get(&id)
    }

    // ------------------------------------------------------------------
    // Alpha-canonical identity
    // ------------------------------------------------------------------

    /// Canonical representative of a term: bound variables renamed to
    /// `v0, v1, ...` in introduction order. Cached per id.
    pub fn canon(&mut self, id: TermId) -> TermId {
        if let Some(c) = self.canon[id.index()] {
            return c;
        }
        let mut counter = 0u32;
        let mut map: FxHashMap<VarId, TermId> = FxHashMap::default();
        let c = self.canon_rec(id, &mut map, &mut counter);
        self.canon[id.index()] = Some(c);
        // A canonical term is its own representative.
        self.canon[c.index()] = Some(c);
        c
    }

    fn canon_rec(
        &mut self,
        id: TermId,
        map: &mut FxHashMap<VarId, TermId>,
        counter: &mut u32,
    ) -> TermId {
        let node = self.nodes[id.index()].clone();
        match node.data {
            TermData::Constant { .. } => id,
            TermData::Variable { var, .. } => map.get(&var).copied().unwrap_or(id),
            TermData::Application { operator, arguments } => {
                let op = self.canon_rec(operator, map, counter);
                let args: Vec<TermId> = arguments
                    .iter()
                    .map(|a| self.canon_rec(*a, map, counter))
                    .collect();
                if op == operator && args == arguments {
                    id
                } else {
                    self.intern(TermData::Application { operator: op, arguments: args }, node.ty)
                }
            }
            TermData::Connective { kind, operands } => {
                let ops: Vec<TermId> = operands
                    .iter()
                    .map(|o| self.canon_rec(*o, map, counter))
                    .collect();
                if ops == operands {
                    id
                } else {
                    self.intern(TermData::Connective { kind, operands: ops }, node.ty)
                }
            }
            TermData::Modal { op, index, body } => {
                let idx = index.map(|i| self.canon_rec(i, map, counter));
                let b = self.canon_rec(body, map, counter);
                if idx == index && b == body {
                    id
                } else {
                    self.intern(TermData::Modal { op, index: idx, body: b }, node.ty)
                }
            }
            TermData::Quantifier { kind, bound, body } => {
                let fresh = self.canon_binders(&bound, map, counter);
                let b = self.canon_rec(body, map, counter);
                self.intern(TermData::Quantifier { kind, bound: fresh, body: b }, node.ty)
            }
            TermData::Lambda { bound, body } => {
                let fresh = self.canon_binders(&bound, map, counter);
                let b = self.canon_rec(body, map, counter);
                self.intern(TermData::Lambda { bound: fresh, body: b }, node.ty)
            }
            TermData::Definition { symbol, declared_type, body } => {
                let b = self.canon_rec(body, map, counter);
                if b == body {
                    id
                } else {
                    self.intern(
                        TermData::Definition { symbol, declared_type, body: b },
                        node.ty,
                    )
                }
            }
        }
    }

    /// Replaces binder variables with canonical `v{n}` variables, recording
    /// the renaming in `map`.
    fn canon_binders(
        &mut self,
        bound: &[TermId],
        map: &mut FxHashMap<VarId, TermId>,
        counter: &mut u32,
    ) -> Vec<TermId> {
        let mut fresh = Vec::with_capacity(bound.len());
        for b in bound {
            let (old_var, ty) = match &self.nodes[b.index()].data {
                TermData::Variable { var, .. } => (*var, self.nodes[b.index()].ty.clone()),
                // Binder lists only ever hold Variable nodes; constructors
                // and the parser both enforce this.
                _ => unreachable!("binder list holds a non-variable node"),
            };
            let n = *counter;
            *counter += 1;
            let name = self.interner.numbered("v", n);
            let canonical = self.intern(
                TermData::Variable { name, var: VarId::canonical(n) },
                ty,
            );
            map.insert(old_var, canonical);
            fresh.push(canonical);
        }
        fresh
    }

    /// Structural equality modulo alpha-renaming. O(1) after the canonical
    /// representatives are cached.
    pub fn equal_mod_alpha(&mut self, a: TermId, b: TermId) -> bool {
        a == b || self.canon(a) == self.canon(b)
    }

    /// Content hash of a term: the identity of its canonical representative.
    ///
    /// Hash-consing makes the canonical id a perfect hash: equal hashes
    /// imply alpha-equal terms and vice versa.
    pub fn content_hash(&mut self, id: TermId) -> u64 {
        self.canon(id).0 as u64
    }

    /// Direct children of a node (operator before arguments, binders before
    /// body), for generic traversals.
    pub fn children(&self, id: TermId) -> Vec<TermId> {
        match self.data(id) {
            TermData::Constant { .. } | TermData::Variable { .. } => Vec::new(),
            TermData::Application { operator, arguments } => {
                let mut out = vec![*operator];
                out.extend(arguments.iter().copied());
                out
            }
            TermData::Quantifier { bound, body, .. } | TermData::Lambda { bound, body } => {
                let mut out = bound.clone();
                out.push(*body);
                out
            }
            TermData::Connective { operands, .. } => operands.clone(),
            TermData::Modal { index, body, .. } => {
                let mut out = Vec::new();
                if let Some(i) = index {
                    out.push(*i);
                }
                out.push(*body);
                out
            }
            TermData::Definition { body, .. } => vec![*body],
        }
    }
}

impl Default for TermStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boolean(store: &mut TermStore) -> Type {
        let sym = store.interner_mut().intern("Boolean");
        Type::Atomic(sym)
    }

    fn entity(store: &mut TermStore) -> Type {
        let sym = store.interner_mut().intern("Entity");
        Type::Atomic(sym)
    }

    #[test]
    fn identical_constructions_share_identity() {
        let mut store = TermStore::new();
        let ent = entity(&mut store);
        let sym = store.interner_mut().intern("Socrates");
        let a = store.constant(sym, None, ent.clone());
        let b = store.constant(sym, None, ent);
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn fresh_variables_are_distinct() {
        let mut store = TermStore::new();
        let ent = entity(&mut store);
        let x = store.interner_mut().intern("x");
        let a = store.fresh_variable(x, ent.clone());
        let b = store.fresh_variable(x, ent);
        assert_ne!(a, b);
    }

    #[test]
    fn alpha_variants_share_canonical_representative() {
        let mut store = TermStore::new();
        let ent = entity(&mut store);
        let bool_ = boolean(&mut store);
        let p = store.interner_mut().intern("P");
        let pred_ty = Type::function(vec![ent.clone()], bool_.clone());
        let p_const = store.constant(p, None, pred_ty);

        let mut quantified = |store: &mut TermStore, var_name: &str| {
            let sym = store.interner_mut().intern(var_name);
            let v = store.fresh_variable(sym, ent.clone());
            let app = store.application(p_const, vec![v], bool_.clone());
            store.quantifier(QuantKind::Forall, vec![v], app, bool_.clone())
        };

        let forall_x = quantified(&mut store, "x");
        let forall_y = quantified(&mut store, "y");
        assert_ne!(forall_x, forall_y);
        assert!(store.equal_mod_alpha(forall_x, forall_y));
        assert_eq!(store.content_hash(forall_x), store.content_hash(forall_y));
    }

    #[test]
    fn different_structure_has_different_hash() {
        let mut store = TermStore::new();
        let bool_ = boolean(&mut store);
        let p = store.interner_mut().intern("P");
        let q = store.interner_mut().intern("Q");
        let a = store.constant(p, None, bool_.clone());
        let b = store.constant(q, None, bool_);
        assert_ne!(store.content_hash(a), store.content_hash(b));
    }

    #[test]
    fn metadata_does_not_affect_identity() {
        let mut store = TermStore::new();
        let ent = entity(&mut store);
        let sym = store.interner_mut().intern("c");
        let a = store.constant(sym, None, ent.clone());
        store.set_metadata(a, Metadata { confidence: Some(0.9), ..Default::default() });
        let b = store.constant(sym, None, ent);
        assert_eq!(a, b);
        assert_eq!(store.metadata(b).unwrap().confidence, Some(0.9));
    }

    #[test]
    fn nested_binders_number_in_introduction_order() {
        let mut store = TermStore::new();
        let ent = entity(&mut store);
        let bool_ = boolean(&mut store);
        let r = store.interner_mut().intern("R");
        let rel_ty = Type::function(vec![ent.clone(), ent.clone()], bool_.clone());
        let r_const = store.constant(r, None, rel_ty);

        let build = |store: &mut TermStore, n1: &str, n2: &str| {
            let s1 = store.interner_mut().intern(n1);
            let s2 = store.interner_mut().intern(n2);
            let v1 = store.fresh_variable(s1, ent.clone());
            let v2 = store.fresh_variable(s2, ent.clone());
            let app = store.application(r_const, vec![v1, v2], bool_.clone());
            let inner = store.quantifier(QuantKind::Exists, vec![v2], app, bool_.clone());
            store.quantifier(QuantKind::Forall, vec![v1], inner, bool_.clone())
        };

        let t1 = build(&mut store, "a", "b");
        let t2 = build(&mut store, "p", "q");
        assert!(store.equal_mod_alpha(t1, t2));
    }
}
