//! Bidirectional type checking and inference over interned terms.
//!
//! Every node already carries the type it was constructed with; these
//! functions validate that the carried types are consistent with the
//! signature table and with each other, and compute the type of compound
//! nodes from their parts:
//!
//! - `Application` checks its operator against a `Function` type, unifying
//!   argument types (this is where parametric polymorphism is discharged);
//! - `Quantifier` and `Lambda` extend the environment with their binders;
//! - `Connective` requires formula-typed operands;
//! - `Modal` requires a formula body and a correctly-typed index.

use rustc_hash::FxHashMap;

use crate::error::TypeError;
use crate::prelude::CoreTypes;
use crate::term::{ConnectiveKind, Literal, ModalOp, TermData, TermId, TermStore, VarId};
use crate::types::{apply_type_subst, Type, TypeSubst, TypeTable};

/// Typing environment for bound variables.
#[derive(Debug, Default, Clone)]
pub struct TypeEnv {
    vars: FxHashMap<VarId, Type>,
}

impl TypeEnv {
    pub fn new() -> Self {
        TypeEnv { vars: FxHashMap::default() }
    }

    pub fn bind(&mut self, var: VarId, ty: Type) {
        self.vars.insert(var, ty);
    }

    pub fn lookup(&self, var: VarId) -> Option<&Type> {
        self.vars.get(&var)
    }
}

/// Infers the type of `t`, validating the whole subtree.
pub fn infer(
    store: &TermStore,
    types: &TypeTable,
    core: &CoreTypes,
    env: &mut TypeEnv,
    t: TermId,
) -> Result<Type, TypeError> {
    match store.data(t) {
        TermData::Constant { name, value } => {
            // Literal-carrying constants type themselves; named constants
            // defer to the signature when one exists.
            if let Some(lit) = value {
                return Ok(literal_type(core, lit));
            }
            let carried = store.ty(t).clone();
            if let Some(declared) = types.get_type(*name) {
                if !types.is_subtype(&carried, declared) && carried != *declared {
                    return Err(TypeError::TypeMismatch {
                        expected: declared.clone(),
                        actual: carried,
                    });
                }
            }
            Ok(carried)
        }
        TermData::Variable { var, .. } => match env.lookup(*var) {
            Some(ty) => Ok(ty.clone()),
            None => Ok(store.ty(t).clone()),
        },
        TermData::Application { operator, arguments } => {
            let op_ty = infer(store, types, core, env, *operator)?;
            let (params, ret) = match op_ty {
                Type::Function { args, ret } => (args, *ret),
                other => {
                    return Err(TypeError::TypeMismatch {
                        expected: Type::function(Vec::new(), store.ty(t).clone()),
                        actual: other,
                    })
                }
            };
            if params.len() != arguments.len() {
                return Err(TypeError::Arity {
                    symbol: operator_name(store, *operator),
                    expected: params.len(),
                    actual: arguments.len(),
                });
            }
            let mut subst = TypeSubst::default();
            for (param, arg) in params.iter().zip(arguments.iter()) {
                let arg_ty = infer(store, types, core, env, *arg)?;
                let want = apply_type_subst(param, &subst);
                if types.is_subtype(&arg_ty, &want) {
                    continue;
                }
                types
                    .unify_into(&want, &arg_ty, &mut subst)
                    .map_err(|_| TypeError::TypeMismatch { expected: want, actual: arg_ty })?;
            }
            Ok(apply_type_subst(&ret, &subst))
        }
        TermData::Quantifier { bound, body, .. } => {
            with_binders(store, env, bound, |env| {
                let body_ty = infer(store, types, core, env, *body)?;
                require_formula(types, core, body_ty)?;
                Ok(core.prop())
            })
        }
        TermData::Lambda { bound, body } => {
            with_binders(store, env, bound, |env| {
                let body_ty = infer(store, types, core, env, *body)?;
                let arg_tys: Vec<Type> = bound.iter().map(|b| store.ty(*b).clone()).collect();
                Ok(Type::function(arg_tys, body_ty))
            })
        }
        TermData::Connective { kind, operands } => {
            let expected = match kind {
                ConnectiveKind::Not => 1,
                ConnectiveKind::Implies | ConnectiveKind::Equiv => 2,
                // And/Or are n-ary with at least two operands.
                ConnectiveKind::And | ConnectiveKind::Or => {
                    if operands.len() < 2 {
                        return Err(TypeError::Arity {
                            symbol: format!("{:?}", kind),
                            expected: 2,
                            actual: operands.len(),
                        });
                    }
                    operands.len()
                }
            };
            if operands.len() != expected {
                return Err(TypeError::Arity {
                    symbol: format!("{:?}", kind),
                    expected,
                    actual: operands.len(),
                });
            }
            for o in operands {
                let ty = infer(store, types, core, env, *o)?;
                require_formula(types, core, ty)?;
            }
            Ok(core.prop())
        }
        TermData::Modal { op, index, body } => {
            if let Some(i) = index {
                let idx_ty = infer(store, types, core, env, *i)?;
                let want = match op {
                    ModalOp::Knows | ModalOp::Believes => Type::Atomic(core.agent),
                    ModalOp::Necessity | ModalOp::Possibility => Type::Atomic(core.world),
                };
                if !types.is_subtype(&idx_ty, &want) {
                    return Err(TypeError::TypeMismatch { expected: want, actual: idx_ty });
                }
            }
            let body_ty = infer(store, types, core, env, *body)?;
            require_formula(types, core, body_ty)?;
            Ok(core.prop())
        }
        TermData::Definition { declared_type, body, .. } => {
            check(store, types, core, env, *body, declared_type)?;
            Ok(declared_type.clone())
        }
    }
}

/// Checks `t` against an expected type.
pub fn check(
    store: &TermStore,
    types: &TypeTable,
    core: &CoreTypes,
    env: &mut TypeEnv,
    t: TermId,
    expected: &Type,
) -> Result<(), TypeError> {
    let actual = infer(store, types, core, env, t)?;
    if types.is_subtype(&actual, expected) {
        return Ok(());
    }
    if types.unify_types(&actual, expected).is_some() {
        return Ok(());
    }
    Err(TypeError::TypeMismatch { expected: expected.clone(), actual })
}

/// Formula positions accept `Proposition` and any of its subtypes.
fn require_formula(types: &TypeTable, core: &CoreTypes, ty: Type) -> Result<(), TypeError> {
    if types.is_subtype(&ty, &core.prop()) || matches!(ty, Type::Var { .. }) {
        Ok(())
    } else {
        Err(TypeError::TypeMismatch { expected: core.prop(), actual: ty })
    }
}

fn literal_type(core: &CoreTypes, lit: &Literal) -> Type {
    match lit {
        Literal::Int(_) => Type::Atomic(core.integer),
        Literal::Real(_) => Type::Atomic(core.real),
        Literal::Text(_) => Type::Atomic(core.string),
    }
}

fn operator_name(store: &TermStore, op: TermId) -> String {
    match store.data(op) {
        TermData::Constant { name, .. } => store.interner().resolve(*name).to_string(),
        TermData::Variable { name, .. } => format!("?{}", store.interner().resolve(*name)),
        _ => "<operator>".to_string(),
    }
}

fn with_binders<R>(
    store: &TermStore,
    env: &mut TypeEnv,
    bound: &[TermId],
    f: impl FnOnce(&mut TypeEnv) -> Result<R, TypeError>,
) -> Result<R, TypeError> {
    for b in bound {
        if let TermData::Variable { var, .. } = store.data(*b) {
            env.bind(*var, store.ty(*b).clone());
        }
    }
    f(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude;
    use crate::term::QuantKind;

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
    fn application_checks_operator_arity() {
        let mut fx = fixture();
        let p = fx.store.interner_mut().intern("P");
        let pred = fx.store.constant(
            p,
            None,
            Type::function(vec![fx.core.entity_ty()], fx.core.bool_()),
        );
        let c = fx.store.interner_mut().intern("c");
        let c1 = fx.store.constant(c, None, fx.core.entity_ty());
        let bad = fx.store.application(pred, vec![c1, c1], fx.core.bool_());

        let mut env = TypeEnv::new();
        let err = infer(&fx.store, &fx.types, &fx.core, &mut env, bad).unwrap_err();
        assert!(matches!(err, TypeError::Arity { expected: 1, actual: 2, .. }));
    }

    #[test]
    fn application_instantiates_polymorphic_operators() {
        let mut fx = fixture();
        // id : (a) -> a, applied to an Entity constant.
        let a_sym = fx.store.interner_mut().intern("a");
        let a = fx.types.fresh_var(a_sym);
        let id_sym = fx.store.interner_mut().intern("id");
        let id = fx.store.constant(id_sym, None, Type::function(vec![a.clone()], a));
        let c_sym = fx.store.interner_mut().intern("c");
        let c = fx.store.constant(c_sym, None, fx.core.entity_ty());
        let applied = fx.store.application(id, vec![c], fx.core.entity_ty());

        let mut env = TypeEnv::new();
        let ty = infer(&fx.store, &fx.types, &fx.core, &mut env, applied).unwrap();
        assert_eq!(ty, fx.core.entity_ty());
    }

    #[test]
    fn connective_rejects_non_formula_operands() {
        let mut fx = fixture();
        let c_sym = fx.store.interner_mut().intern("c");
        let c = fx.store.constant(c_sym, None, fx.core.entity_ty());
        let bad = fx
            .store
            .connective(ConnectiveKind::Not, vec![c], fx.core.prop());

        let mut env = TypeEnv::new();
        let err = infer(&fx.store, &fx.types, &fx.core, &mut env, bad).unwrap_err();
        assert!(matches!(err, TypeError::TypeMismatch { .. }));
    }

    #[test]
    fn quantifier_types_as_proposition() {
        let mut fx = fixture();
        let p = fx.store.interner_mut().intern("P");
        let pred = fx.store.constant(
            p,
            None,
            Type::function(vec![fx.core.entity_ty()], fx.core.bool_()),
        );
        let x_sym = fx.store.interner_mut().intern("x");
        let x = fx.store.fresh_variable(x_sym, fx.core.entity_ty());
        let px = fx.store.application(pred, vec![x], fx.core.bool_());
        let forall = fx
            .store
            .quantifier(QuantKind::Forall, vec![x], px, fx.core.prop());

        let mut env = TypeEnv::new();
        let ty = infer(&fx.store, &fx.types, &fx.core, &mut env, forall).unwrap();
        assert_eq!(ty, fx.core.prop());
    }

    #[test]
    fn modal_index_must_be_an_agent_for_knows() {
        let mut fx = fixture();
        let p = fx.store.interner_mut().intern("p");
        let prop = fx.store.constant(p, None, fx.core.bool_());
        let c_sym = fx.store.interner_mut().intern("c");
        let not_an_agent = fx.store.constant(c_sym, None, fx.core.entity_ty());
        let bad = fx
            .store
            .modal(ModalOp::Knows, Some(not_an_agent), prop, fx.core.prop());

        let mut env = TypeEnv::new();
        assert!(infer(&fx.store, &fx.types, &fx.core, &mut env, bad).is_err());
    }

    #[test]
    fn lambda_infers_function_type() {
        let mut fx = fixture();
        let x_sym = fx.store.interner_mut().intern("x");
        let x = fx.store.fresh_variable(x_sym, fx.core.entity_ty());
        let lam_ty = Type::function(vec![fx.core.entity_ty()], fx.core.entity_ty());
        let lam = fx.store.lambda(vec![x], x, lam_ty.clone());

        let mut env = TypeEnv::new();
        let ty = infer(&fx.store, &fx.types, &fx.core, &mut env, lam).unwrap();
        assert_eq!(ty, lam_ty);
    }
}
