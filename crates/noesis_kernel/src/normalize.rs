//! Lambda-term normalization.
//!
//! # Reduction rules
//!
//! ## Beta
//! `(λx1..xn. body)(a1..an) → body[xi := ai]`, capture-avoiding.
//!
//! ## Eta
//! `λx1..xn. f(x1..xn) → f` when no `xi` occurs free in `f`.
//!
//! Reduction applies outermost-first and then recurses into subterms, so
//! the result is a full normal form. A fuel counter bounds the loop; when
//! fuel runs out the current term is returned as-is. Terms are validated
//! against the type system before normalization; ill-typed input is
//! rejected rather than reduced.

use crate::error::{KernelError, KernelResult};
use crate::prelude::CoreTypes;
use crate::subst::{free_variables, substitute, Subst};
use crate::term::{TermData, TermId, TermStore, VarId};
use crate::typecheck::{infer, TypeEnv};
use crate::types::TypeTable;

/// Which normal form to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalForm {
    /// Beta reductions only.
    BetaNF,
    /// Eta contractions only.
    EtaNF,
    /// Both, to beta-eta normal form.
    BetaEtaNF,
}

/// Default number of single-step reductions before giving up.
const DEFAULT_FUEL: u32 = 10_000;

/// Normalizes a well-typed term to the requested normal form.
pub fn normalize(
    store: &mut TermStore,
    types: &TypeTable,
    core: &CoreTypes,
    t: TermId,
    mode: NormalForm,
) -> KernelResult<TermId> {
    let mut env = TypeEnv::new();
    infer(store, types, core, &mut env, t).map_err(KernelError::Type)?;
    Ok(normalize_unchecked(store, t, mode, DEFAULT_FUEL))
}

/// Normalization without the up-front type validation, for callers that
/// construct terms internally and already know they are well-typed.
pub fn normalize_unchecked(
    store: &mut TermStore,
    t: TermId,
    mode: NormalForm,
    mut fuel: u32,
) -> TermId {
    let mut current = t;
    loop {
        if fuel == 0 {
            return current;
        }
        fuel -= 1;
        let next = reduce_step(store, current, mode);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// One reduction step: outermost redex first, then subterms.
fn reduce_step(store: &mut TermStore, t: TermId, mode: NormalForm) -> TermId {
    let ty = store.ty(t).clone();
    match store.data(t).clone() {
        TermData::Constant { .. } | TermData::Variable { .. } => t,

        TermData::Application { operator, arguments } => {
            // Beta: (λxs. body)(as) → body[xs := as]
            if mode != NormalForm::EtaNF {
                if let TermData::Lambda { bound, body } = store.data(operator).clone() {
                    if bound.len() == arguments.len() {
                        let mut s = Subst::default();
                        for (b, a) in bound.iter().zip(arguments.iter()) {
                            if let TermData::Variable { var, .. } = store.data(*b) {
                                s.insert(*var, *a);
                            }
                        }
                        return substitute(store, body, &s);
                    }
                }
            }
            let op = reduce_step(store, operator, mode);
            if op != operator {
                return store.intern(TermData::Application { operator: op, arguments }, ty);
            }
            let mut args = arguments.clone();
            for a in args.iter_mut() {
                let r = reduce_step(store, *a, mode);
                if r != *a {
                    *a = r;
                    return store.intern(
                        TermData::Application { operator, arguments: args },
                        ty,
                    );
                }
            }
            t
        }

        TermData::Lambda { bound, body } => {
            // Eta: λxs. f(xs) → f when no x is free in f.
            if mode != NormalForm::BetaNF {
                if let TermData::Application { operator, arguments } = store.data(body).clone() {
                    if arguments == bound {
                        let bound_ids: Vec<VarId> = bound
                            .iter()
                            .filter_map(|b| match store.data(*b) {
                                TermData::Variable { var, .. } => Some(*var),
                                _ => None,
                            })
                            .collect();
                        let op_free = free_variables(store, operator);
                        if bound_ids.iter().all(|v| !op_free.contains(v)) {
                            return operator;
                        }
                    }
                }
            }
            let b = reduce_step(store, body, mode);
            if b != body {
                store.intern(TermData::Lambda { bound, body: b }, ty)
            } else {
                t
            }
        }

        TermData::Quantifier { kind, bound, body } => {
            let b = reduce_step(store, body, mode);
            if b != body {
                store.intern(TermData::Quantifier { kind, bound, body: b }, ty)
            } else {
                t
            }
        }

        TermData::Connective { kind, operands } => {
            let mut ops = operands.clone();
            for o in ops.iter_mut() {
                let r = reduce_step(store, *o, mode);
                if r != *o {
                    *o = r;
                    return store.intern(TermData::Connective { kind, operands: ops }, ty);
                }
            }
            t
        }

        TermData::Modal { op, index, body } => {
            let b = reduce_step(store, body, mode);
            if b != body {
                store.intern(TermData::Modal { op, index, body: b }, ty)
            } else {
                t
            }
        }

        TermData::Definition { symbol, declared_type, body } => {
            let b = reduce_step(store, body, mode);
            if b != body {
                store.intern(TermData::Definition { symbol, declared_type, body: b }, ty)
            } else {
                t
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude;
    use crate::types::Type;

    struct Fixture {
        store: TermStore,
        types: TypeTable,
        core: CoreTypes,
    }

    fn fixture() -> Fixture {
        let mut store = TermStore::new();
        let mut types = TypeTable::new();
        let core = prelude::install(&mut types, &mut store).unwrap();
        Fixture { store, types, core }
    }

    #[test]
    fn beta_reduces_application_of_lambda() {
        let mut fx = fixture();
        let ent = fx.core.entity_ty();
        let x_sym = fx.store.interner_mut().intern("x");
        let x = fx.store.fresh_variable(x_sym, ent.clone());
        let id_ty = Type::function(vec![ent.clone()], ent.clone());
        let id = fx.store.lambda(vec![x], x, id_ty);
        let c_sym = fx.store.interner_mut().intern("c");
        let c = fx.store.constant(c_sym, None, ent.clone());
        let app = fx.store.application(id, vec![c], ent);

        let nf = normalize(&mut fx.store, &fx.types, &fx.core, app, NormalForm::BetaNF).unwrap();
        assert_eq!(nf, c);
    }

    #[test]
    fn eta_contracts_trivial_wrapper() {
        let mut fx = fixture();
        let ent = fx.core.entity_ty();
        let bool_ = fx.core.bool_();
        let f_sym = fx.store.interner_mut().intern("f");
        let f_ty = Type::function(vec![ent.clone()], bool_.clone());
        let f = fx.store.constant(f_sym, None, f_ty.clone());
        let x_sym = fx.store.interner_mut().intern("x");
        let x = fx.store.fresh_variable(x_sym, ent.clone());
        let fx_app = fx.store.application(f, vec![x], bool_);
        let wrapper = fx.store.lambda(vec![x], fx_app, f_ty);

        let nf =
            normalize(&mut fx.store, &fx.types, &fx.core, wrapper, NormalForm::BetaEtaNF).unwrap();
        assert_eq!(nf, f);
    }

    #[test]
    fn normalization_is_idempotent() {
        let mut fx = fixture();
        let ent = fx.core.entity_ty();
        let x_sym = fx.store.interner_mut().intern("x");
        let x = fx.store.fresh_variable(x_sym, ent.clone());
        let id_ty = Type::function(vec![ent.clone()], ent.clone());
        let id = fx.store.lambda(vec![x], x, id_ty);
        let c_sym = fx.store.interner_mut().intern("c");
        let c = fx.store.constant(c_sym, None, ent.clone());
        let app = fx.store.application(id, vec![c], ent);

        let once =
            normalize(&mut fx.store, &fx.types, &fx.core, app, NormalForm::BetaEtaNF).unwrap();
        let twice =
            normalize(&mut fx.store, &fx.types, &fx.core, once, NormalForm::BetaEtaNF).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn ill_typed_terms_are_rejected_before_reduction() {
        let mut fx = fixture();
        let ent = fx.core.entity_ty();
        let c_sym = fx.store.interner_mut().intern("c");
        let c = fx.store.constant(c_sym, None, ent.clone());
        // Applying a non-function.
        let bogus = fx.store.application(c, vec![c], ent);
        assert!(normalize(&mut fx.store, &fx.types, &fx.core, bogus, NormalForm::BetaNF).is_err());
    }

    #[test]
    fn reduction_happens_under_binders() {
        let mut fx = fixture();
        let ent = fx.core.entity_ty();
        let bool_ = fx.core.bool_();
        let p_sym = fx.store.interner_mut().intern("P");
        let p = fx
            .store
            .constant(p_sym, None, Type::function(vec![ent.clone()], bool_.clone()));
        let y_sym = fx.store.interner_mut().intern("y");
        let y = fx.store.fresh_variable(y_sym, ent.clone());
        let id_ty = Type::function(vec![ent.clone()], ent.clone());
        let x_sym = fx.store.interner_mut().intern("x");
        let x = fx.store.fresh_variable(x_sym, ent.clone());
        let id = fx.store.lambda(vec![x], x, id_ty);
        // forall y. P((λx. x)(y))
        let redex = fx.store.application(id, vec![y], ent);
        let py = fx.store.application(p, vec![redex], bool_.clone());
        let forall = fx
            .store
            .quantifier(crate::term::QuantKind::Forall, vec![y], py, fx.core.prop());

        let nf =
            normalize(&mut fx.store, &fx.types, &fx.core, forall, NormalForm::BetaNF).unwrap();
        // The inner redex is gone.
        let direct_py = fx.store.application(p, vec![y], bool_);
        let expected = fx.store.quantifier(
            crate::term::QuantKind::Forall,
            vec![y],
            direct_py,
            fx.core.prop(),
        );
        assert_eq!(nf, expected);
    }
}
