//! Structural pattern matching without term construction.
//!
//! Query patterns unify against stored facts using a binding map and walk
//! resolution instead of building substituted terms, so matching needs only
//! shared access to the term store. Variables on either side bind; this
//! covers both `P(?x)` against `P(a)` and `Mortal(Socrates)` against a rule
//! head `Mortal(?x)`.

use noesis_kernel::{TermData, TermId, TermStore, VarId};
use rustc_hash::FxHashMap;

/// A query result: variable id to matched term.
pub type Binding = FxHashMap<VarId, TermId>;

/// Follows variable bindings to a representative term.
fn walk(store: &TermStore, bindings: &Binding, mut t: TermId) -> TermId {
    loop {
        match store.data(t) {
            TermData::Variable { var, .. } => match bindings.get(var) {
                Some(next) => t = *next,
                None => return t,
            },
            _ => return t,
        }
    }
}

/// Attempts to match `a` against `b`, extending `bindings`.
///
/// Returns `false` (with `bindings` possibly extended; callers discard the
/// map on failure) when the two terms cannot be made equal.
pub fn match_terms(store: &TermStore, bindings: &mut Binding, a: TermId, b: TermId) -> bool {
    let a = walk(store, bindings, a);
    let b = walk(store, bindings, b);
    if a == b {
        return true;
    }

    match (store.data(a), store.data(b)) {
        (TermData::Variable { var, .. }, _) => {
            bindings.insert(*var, b);
            true
        }
        (_, TermData::Variable { var, .. }) => {
            bindings.insert(*var, a);
            true
        }
        (
            TermData::Application { operator: ao, arguments: aa },
            TermData::Application { operator: bo, arguments: ba },
        ) => {
            if aa.len() != ba.len() {
                return false;
            }
            let (ao, bo) = (*ao, *bo);
            let pairs: Vec<(TermId, TermId)> =
                aa.iter().copied().zip(ba.iter().copied()).collect();
            if !match_terms(store, bindings, ao, bo) {
                return false;
            }
            pairs.into_iter().all(|(x, y)| match_terms(store, bindings, x, y))
        }
        (
            TermData::Connective { kind: ak, operands: ao },
            TermData::Connective { kind: bk, operands: bo },
        ) => {
            if ak != bk || ao.len() != bo.len() {
                return false;
            }
            let pairs: Vec<(TermId, TermId)> =
                ao.iter().copied().zip(bo.iter().copied()).collect();
            pairs.into_iter().all(|(x, y)| match_terms(store, bindings, x, y))
        }
        (
            TermData::Modal { op: aop, index: ai, body: ab },
            TermData::Modal { op: bop, index: bi, body: bb },
        ) => {
            if aop != bop {
                return false;
            }
            let (ab, bb) = (*ab, *bb);
            match (ai, bi) {
                (None, None) => {}
                (Some(x), Some(y)) => {
                    let (x, y) = (*x, *y);
                    if !match_terms(store, bindings, x, y) {
                        return false;
                    }
                }
                _ => return false,
            }
            match_terms(store, bindings, ab, bb)
        }
        // Binders and everything else: only exact identity matches, which
        // was handled above. Quantified statements are compared through
        // their canonical representatives by the store, not matched into.
        _ => false,
    }
}

/// Resolves a binding map so every entry points at a non-variable term
/// where possible, and restricts it to the given variables.
pub fn resolve_bindings(store: &TermStore, bindings: &Binding, keep: &[VarId]) -> Binding {
    let mut out = Binding::default();
    for v in keep {
        if bindings.contains_key(v) {
            let t = walk(store, bindings, bindings[v]);
            out.insert(*v, t);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use noesis_kernel::{prelude, Type, TypeTable};

    #[test]
    fn pattern_variable_binds_fact_argument() {
        let mut store = TermStore::new();
        let mut types = TypeTable::new();
        let core = prelude::install(&mut types, &mut store).unwrap();
        let p = store.interner_mut().intern("P");
        let pred = store.constant(p, None, Type::function(vec![core.entity_ty()], core.bool_()));
        let a_sym = store.interner_mut().intern("a");
        let a = store.constant(a_sym, None, core.entity_ty());
        let x_sym = store.interner_mut().intern("x");
        let x = store.fresh_variable(x_sym, core.entity_ty());

        let pattern = store.application(pred, vec![x], core.bool_());
        let fact = store.application(pred, vec![a], core.bool_());

        let mut b = Binding::default();
        assert!(match_terms(&store, &mut b, pattern, fact));
        let xv = match store.data(x) {
            TermData::Variable { var, .. } => *var,
            _ => unreachable!(),
        };
        assert_eq!(b.get(&xv), Some(&a));
    }

    #[test]
    fn mismatched_heads_fail() {
        let mut store = TermStore::new();
        let mut types = TypeTable::new();
        let core = prelude::install(&mut types, &mut store).unwrap();
        let p = store.interner_mut().intern("P");
        let q = store.interner_mut().intern("Q");
        let ty = Type::function(vec![core.entity_ty()], core.bool_());
        let pred_p = store.constant(p, None, ty.clone());
        let pred_q = store.constant(q, None, ty);
        let a_sym = store.interner_mut().intern("a");
        let a = store.constant(a_sym, None, core.entity_ty());

        let pa = store.application(pred_p, vec![a], core.bool_());
        let qa = store.application(pred_q, vec![a], core.bool_());
        let mut b = Binding::default();
        assert!(!match_terms(&store, &mut b, pa, qa));
    }

    #[test]
    fn shared_variable_must_match_consistently() {
        let mut store = TermStore::new();
        let mut types = TypeTable::new();
        let core = prelude::install(&mut types, &mut store).unwrap();
        let r = store.interner_mut().intern("R");
        let rel = store.constant(
            r,
            None,
            Type::function(vec![core.entity_ty(), core.entity_ty()], core.bool_()),
        );
        let a_sym = store.interner_mut().intern("a");
        let b_sym = store.interner_mut().intern("b");
        let a = store.constant(a_sym, None, core.entity_ty());
        let bb = store.constant(b_sym, None, core.entity_ty());
        let x_sym = store.interner_mut().intern("x");
        let x = store.fresh_variable(x_sym, core.entity_ty());

        // R(?x, ?x) cannot match R(a, b).
        let pattern = store.application(rel, vec![x, x], core.bool_());
        let fact = store.application(rel, vec![a, bb], core.bool_());
        let mut bind = Binding::default();
        assert!(!match_terms(&store, &mut bind, pattern, fact));
    }
}
