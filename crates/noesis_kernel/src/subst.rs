//! Free-variable analysis, capture-avoiding substitution, and traversal.
//!
//! Substitution is the one place alpha-renaming happens outside the
//! canonicalizer: when a substitutend would be captured by a binder, the
//! binder's variables are renamed to fresh ids before descending. The
//! testable contract is the usual one:
//!
//! ```text
//! free(subst(a, s))  ⊆  (free(a) \ dom(s))  ∪  ⋃ free(s(v))
//! ```

use rustc_hash::{FxHashMap, FxHashSet};

use crate::term::{TermData, TermId, TermStore, VarId};

/// A term substitution: variable id to replacement term.
pub type Subst = FxHashMap<VarId, TermId>;

/// Ids of all variables occurring free in `t`.
pub fn free_variables(store: &TermStore, t: TermId) -> FxHashSet<VarId> {
    let mut out = FxHashSet::default();
    let mut bound = FxHashSet::default();
    collect_free(store, t, &mut bound, &mut out);
    out
}

/// Free variables of `t` as id -> variable-node pairs, for binding output.
pub fn free_variable_terms(store: &TermStore, t: TermId) -> FxHashMap<VarId, TermId> {
    let mut out = FxHashMap::default();
    let mut bound = FxHashSet::default();
    collect_free_terms(store, t, &mut bound, &mut out);
    out
}

fn collect_free(
    store: &TermStore,
    t: TermId,
    bound: &mut FxHashSet<VarId>,
    out: &mut FxHashSet<VarId>,
) {
    match store.data(t) {
        TermData::Constant { .. } => {}
        TermData::Variable { var, .. } => {
            if !bound.contains(var) {
                out.insert(*var);
            }
        }
        TermData::Application { operator, arguments } => {
            let operator = *operator;
            let arguments = arguments.clone();
            collect_free(store, operator, bound, out);
            for a in arguments {
                collect_free(store, a, bound, out);
            }
        }
        TermData::Connective { operands, .. } => {
            for o in operands.clone() {
                collect_free(store, o, bound, out);
            }
        }
        TermData::Modal { index, body, .. } => {
            let index = *index;
            let body = *body;
            if let Some(i) = index {
                collect_free(store, i, bound, out);
            }
            collect_free(store, body, bound, out);
        }
        TermData::Quantifier { bound: binders, body, .. }
        | TermData::Lambda { bound: binders, body } => {
            let body = *body;
            let vars: Vec<VarId> = binders
                .iter()
                .map(|b| match store.data(*b) {
                    TermData::Variable { var, .. } => *var,
                    _ => unreachable!("binder list holds a non-variable node"),
                })
                .collect();
            let newly: Vec<VarId> = vars.iter().copied().filter(|v| bound.insert(*v)).collect();
            collect_free(store, body, bound, out);
            for v in newly {
                bound.remove(&v);
            }
        }
        TermData::Definition { body, .. } => {
            let body = *body;
            collect_free(store, body, bound, out);
        }
    }
}

fn collect_free_terms(
    store: &TermStore,
    t: TermId,
    bound: &mut FxHashSet<VarId>,
    out: &mut FxHashMap<VarId, TermId>,
) {
    if let TermData::Variable { var, .. } = store.data(t) {
        if !bound.contains(var) {
            out.insert(*var, t);
        }
        return;
    }
    match store.data(t) {
        TermData::Quantifier { bound: binders, body, .. }
        | TermData::Lambda { bound: binders, body } => {
            let body = *body;
            let vars: Vec<VarId> = binders
                .iter()
                .map(|b| match store.data(*b) {
                    TermData::Variable { var, .. } => *var,
                    _ => unreachable!("binder list holds a non-variable node"),
                })
                .collect();
            let newly: Vec<VarId> = vars.iter().copied().filter(|v| bound.insert(*v)).collect();
            collect_free_terms(store, body, bound, out);
            for v in newly {
                bound.remove(&v);
            }
        }
        _ => {
            for c in store.children(t) {
                collect_free_terms(store, c, bound, out);
            }
        }
    }
}

/// Applies a substitution to `t`, renaming binders where a replacement would
/// otherwise be captured.
pub fn substitute(store: &mut TermStore, t: TermId, subst: &Subst) -> TermId {
    if subst.is_empty() {
        return t;
    }
    subst_rec(store, t, subst)
}

fn subst_rec(store: &mut TermStore, t: TermId, subst: &Subst) -> TermId {
    let node_ty = store.ty(t).clone();
    match store.data(t).clone() {
        TermData::Constant { .. } => t,
        TermData::Variable { var, .. } => subst.get(&var).copied().unwrap_or(t),
        TermData::Application { operator, arguments } => {
            let op = subst_rec(store, operator, subst);
            let args: Vec<TermId> = arguments.iter().map(|a| subst_rec(store, *a, subst)).collect();
            if op == operator && args == arguments {
                t
            } else {
                store.intern(TermData::Application { operator: op, arguments: args }, node_ty)
            }
        }
        TermData::Connective { kind, operands } => {
            let ops: Vec<TermId> = operands.iter().map(|o| subst_rec(store, *o, subst)).collect();
            if ops == operands {
                t
            } else {
                store.intern(TermData::Connective { kind, operands: ops }, node_ty)
            }
        }
        TermData::Modal { op, index, body } => {
            let idx = index.map(|i| subst_rec(store, i, subst));
            let b = subst_rec(store, body, subst);
            if idx == index && b == body {
                t
            } else {
                store.intern(TermData::Modal { op, index: idx, body: b }, node_ty)
            }
        }
        TermData::Quantifier { kind, bound, body } => {
            let (bound, body) = subst_under_binders(store, &bound, body, subst);
            store.intern(TermData::Quantifier { kind, bound, body }, node_ty)
        }
        TermData::Lambda { bound, body } => {
            let (bound, body) = subst_under_binders(store, &bound, body, subst);
            store.intern(TermData::Lambda { bound, body }, node_ty)
        }
        TermData::Definition { symbol, declared_type, body } => {
            let b = subst_rec(store, body, subst);
            if b == body {
                t
            } else {
                store.intern(TermData::Definition { symbol, declared_type, body: b }, node_ty)
            }
        }
    }
}

/// Substitutes inside a binder, alpha-renaming bound variables that would
/// capture a free variable of some replacement.
fn subst_under_binders(
    store: &mut TermStore,
    bound: &[TermId],
    body: TermId,
    subst: &Subst,
) -> (Vec<TermId>, TermId) {
    let bound_vars: Vec<VarId> = bound
        .iter()
        .map(|b| match store.data(*b) {
            TermData::Variable { var, .. } => *var,
            _ => unreachable!("binder list holds a non-variable node"),
        })
        .collect();

    // Bound ids are never substitution targets (free and bound ids are
    // disjoint by construction), but guard anyway: a shadowed entry is
    // simply dropped inside the binder.
    let mut inner: Subst = subst
        .iter()
        .filter(|(v, _)| !bound_vars.contains(v))
        .map(|(v, r)| (*v, *r))
        .collect();

    if inner.is_empty() {
        return (bound.to_vec(), body);
    }

    // Restrict to entries whose variable actually occurs free in the body,
    // then collect the bound ids captured by any replacement.
    let body_free = free_variables(store, body);
    inner.retain(|v, _| body_free.contains(v));
    if inner.is_empty() {
        return (bound.to_vec(), body);
    }

    let mut captured: Vec<usize> = Vec::new();
    for r in inner.values() {
        let r_free = free_variables(store, *r);
        for (i, bv) in bound_vars.iter().enumerate() {
            if r_free.contains(bv) && !captured.contains(&i) {
                captured.push(i);
            }
        }
    }

    let (bound, body) = if captured.is_empty() {
        (bound.to_vec(), body)
    } else {
        // Rename the captured binders to fresh ids before substituting.
        let mut rename = Subst::default();
        let mut new_bound = bound.to_vec();
        for i in captured {
            let (name, ty) = match store.data(bound[i]) {
                TermData::Variable { name, .. } => (*name, store.ty(bound[i]).clone()),
                _ => unreachable!(),
            };
            let fresh = store.fresh_variable(name, ty);
            rename.insert(bound_vars[i], fresh);
            new_bound[i] = fresh;
        }
        let renamed_body = subst_rec(store, body, &rename);
        (new_bound, renamed_body)
    };

    let new_body = subst_rec(store, body, &inner);
    (bound, new_body)
}

/// Bottom-up fold over a term: `f` sees each node id after its children.
pub fn fold<A>(store: &TermStore, t: TermId, init: A, f: &mut impl FnMut(A, TermId) -> A) -> A {
    let mut acc = init;
    for c in store.children(t) {
        acc = fold(store, c, acc, f);
    }
    f(acc, t)
}

/// Bottom-up rebuilding map: children are mapped first, the node is
/// re-interned with the mapped children, and `f` transforms the result.
/// Binder lists are left untouched (they hold variable nodes).
pub fn map(
    store: &mut TermStore,
    t: TermId,
    f: &mut impl FnMut(&mut TermStore, TermId) -> TermId,
) -> TermId {
    let ty = store.ty(t).clone();
    let rebuilt = match store.data(t).clone() {
        TermData::Constant { .. } | TermData::Variable { .. } => t,
        TermData::Application { operator, arguments } => {
            let op = map(store, operator, f);
            let args: Vec<TermId> = arguments.iter().map(|a| map(store, *a, f)).collect();
            store.intern(TermData::Application { operator: op, arguments: args }, ty)
        }
        TermData::Connective { kind, operands } => {
            let ops: Vec<TermId> = operands.iter().map(|o| map(store, *o, f)).collect();
            store.intern(TermData::Connective { kind, operands: ops }, ty)
        }
        TermData::Modal { op, index, body } => {
            let idx = index.map(|i| map(store, i, f));
            let b = map(store, body, f);
            store.intern(TermData::Modal { op, index: idx, body: b }, ty)
        }
        TermData::Quantifier { kind, bound, body } => {
            let b = map(store, body, f);
            store.intern(TermData::Quantifier { kind, bound, body: b }, ty)
        }
        TermData::Lambda { bound, body } => {
            let b = map(store, body, f);
            store.intern(TermData::Lambda { bound, body: b }, ty)
        }
        TermData::Definition { symbol, declared_type, body } => {
            let b = map(store, body, f);
            store.intern(TermData::Definition { symbol, declared_type, body: b }, ty)
        }
    };
    f(store, rebuilt)
}
