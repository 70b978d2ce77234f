//! Lowering: surface tree -> typed kernel terms.
//!
//! Resolves names against the signature table, assigns types, and interns
//! into the [`TermStore`]. Two name-resolution modes:
//!
//! - **forgiving** (default): undeclared names are given signatures on
//!   first use — a predicate head becomes `(Entity, ...) -> Boolean`, a
//!   bare constant becomes `Entity`, a modal agent becomes `Agent`. This is
//!   what interactive use wants.
//! - **strict**: undeclared names are `UnknownSymbol` errors.
//!
//! Free variables (`?x` outside any binder) are registered per lowerer so
//! the same name maps to the same `var_id` across parses; query patterns
//! and printed terms round-trip because of this.

use noesis_base::{Span, Symbol};
use noesis_kernel::{
    check, CoreTypes, Literal, TermData, TermId, TermStore, Type, TypeEnv, TypeTable,
};
use rustc_hash::FxHashMap;

use crate::error::ParseError;
use crate::surface::{Binder, SurfaceExpr, SurfaceType};

/// Lowering state that survives across parses.
pub struct Lowerer {
    free_vars: FxHashMap<Symbol, TermId>,
    strict: bool,
}

impl Lowerer {
    pub fn new() -> Self {
        Lowerer { free_vars: FxHashMap::default(), strict: false }
    }

    /// Enables strict name resolution.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// The free variables registered so far (name -> variable term).
    pub fn free_var(&self, name: Symbol) -> Option<TermId> {
        self.free_vars.get(&name).copied()
    }

    /// Lowers a surface expression to a validated kernel term.
    pub fn lower(
        &mut self,
        store: &mut TermStore,
        types: &mut TypeTable,
        core: &CoreTypes,
        expr: &SurfaceExpr<'_>,
    ) -> Result<TermId, ParseError> {
        let mut scopes: Vec<FxHashMap<Symbol, TermId>> = Vec::new();
        // A top-level parse is a statement unless it is a definition or a
        // bare lambda; biasing the expectation makes `Raining` a
        // propositional atom rather than an entity.
        let expected = match expr {
            SurfaceExpr::Define { .. } | SurfaceExpr::Lambda { .. } => None,
            _ => Some(core.prop()),
        };
        let id = self.lower_expr(store, types, core, &mut scopes, expr, expected.as_ref())?;
        // Final validation: the whole tree must type under the signature.
        let mut env = TypeEnv::new();
        let carried = store.ty(id).clone();
        check(store, types, core, &mut env, id, &carried)
            .map_err(|e| ParseError::typing(e, expr.span()))?;
        Ok(id)
    }

    #[allow(clippy::too_many_arguments)]
    fn lower_expr(
        &mut self,
        store: &mut TermStore,
        types: &mut TypeTable,
        core: &CoreTypes,
        scopes: &mut Vec<FxHashMap<Symbol, TermId>>,
        expr: &SurfaceExpr<'_>,
        expected: Option<&Type>,
    ) -> Result<TermId, ParseError> {
        match expr {
            SurfaceExpr::Var { name, span } => {
                for scope in scopes.iter().rev() {
                    if let Some(id) = scope.get(name) {
                        return Ok(*id);
                    }
                }
                if let Some(id) = self.free_vars.get(name) {
                    return Ok(*id);
                }
                let ty = expected.cloned().unwrap_or_else(|| core.entity_ty());
                let id = store.fresh_variable(*name, ty);
                store.set_metadata(id, meta_for(*span));
                self.free_vars.insert(*name, id);
                Ok(id)
            }

            SurfaceExpr::Ident { name, span } => {
                self.lower_ident(store, types, core, *name, *span, expected, 0)
            }

            SurfaceExpr::Int { value, span } => {
                let sym = store.interner_mut().intern(&value.to_string());
                let id = store.constant(
                    sym,
                    Some(Literal::Int(*value)),
                    Type::Atomic(core.integer),
                );
                store.set_metadata(id, meta_for(*span));
                Ok(id)
            }
            SurfaceExpr::Real { value, span } => {
                let sym = store.interner_mut().intern(&value.to_string());
                let id =
                    store.constant(sym, Some(Literal::Real(*value)), Type::Atomic(core.real));
                store.set_metadata(id, meta_for(*span));
                Ok(id)
            }
            SurfaceExpr::Str { value, span } => {
                let sym = store.interner_mut().intern(value);
                let id = store.constant(
                    sym,
                    Some(Literal::Text((*value).to_string())),
                    Type::Atomic(core.string),
                );
                store.set_metadata(id, meta_for(*span));
                Ok(id)
            }

            SurfaceExpr::App { head, args, span } => {
                // An unknown head in forgiving mode takes its parameter
                // types from the arguments it is first applied to.
                if let SurfaceExpr::Ident { name, span: head_span } = head {
                    if !self.strict && types.get_type(*name).is_none() {
                        let mut lowered = Vec::with_capacity(args.len());
                        for arg in args.iter() {
                            lowered.push(
                                self.lower_expr(store, types, core, scopes, arg, None)?,
                            );
                        }
                        let param_tys: Vec<Type> =
                            lowered.iter().map(|a| store.ty(*a).clone()).collect();
                        let ret = match expected {
                            Some(t)
                                if !matches!(t, Type::Atomic(s) if *s == core.proposition) =>
                            {
                                t.clone()
                            }
                            _ => core.bool_(),
                        };
                        let op_ty = Type::function(param_tys, ret.clone());
                        types.declare(*name, op_ty.clone());
                        let op = store.constant(*name, None, op_ty);
                        store.set_metadata(op, meta_for(*head_span));
                        let id = store.application(op, lowered, ret);
                        store.set_metadata(id, meta_for(*span));
                        return Ok(id);
                    }
                }
                let op = match head {
                    SurfaceExpr::Ident { name, span } => self.lower_ident(
                        store,
                        types,
                        core,
                        *name,
                        *span,
                        expected,
                        args.len(),
                    )?,
                    other => self.lower_expr(store, types, core, scopes, other, None)?,
                };
                let op_ty = store.ty(op).clone();
                let (params, ret) = match op_ty {
                    Type::Function { args: p, ret } => (p, *ret),
                    other => {
                        return Err(ParseError::typing(
                            noesis_kernel::TypeError::TypeMismatch {
                                expected: Type::function(vec![], core.bool_()),
                                actual: other,
                            },
                            *span,
                        ))
                    }
                };
                if params.len() != args.len() {
                    return Err(ParseError::typing(
                        noesis_kernel::TypeError::Arity {
                            symbol: head_name(store, head),
                            expected: params.len(),
                            actual: args.len(),
                        },
                        *span,
                    ));
                }
                let mut lowered = Vec::with_capacity(args.len());
                let mut subst = noesis_kernel::TypeSubst::default();
                for (arg, param) in args.iter().zip(params.iter()) {
                    let want = noesis_kernel::apply_type_subst(param, &subst);
                    let hint = if want.is_ground() { Some(want.clone()) } else { None };
                    let a =
                        self.lower_expr(store, types, core, scopes, arg, hint.as_ref())?;
                    let actual = store.ty(a).clone();
                    if !types.is_subtype(&actual, &want) {
                        types.unify_into(&want, &actual, &mut subst).map_err(|e| {
                            ParseError::typing(e, arg.span())
                        })?;
                    }
                    lowered.push(a);
                }
                let result_ty = noesis_kernel::apply_type_subst(&ret, &subst);
                let id = store.application(op, lowered, result_ty);
                store.set_metadata(id, meta_for(*span));
                Ok(id)
            }

            SurfaceExpr::Connective { kind, operands, span } => {
                let prop = core.prop();
                let mut lowered = Vec::with_capacity(operands.len());
                for o in operands.iter() {
                    lowered.push(self.lower_expr(store, types, core, scopes, o, Some(&prop))?);
                }
                let id = store.connective(*kind, lowered, prop);
                store.set_metadata(id, meta_for(*span));
                Ok(id)
            }

            SurfaceExpr::Quant { kind, binders, body, span } => {
                let bound = self.lower_binders(store, types, core, scopes, binders)?;
                let prop = core.prop();
                let b = self.lower_expr(store, types, core, scopes, body, Some(&prop));
                scopes.pop();
                let id = store.quantifier(*kind, bound, b?, prop);
                store.set_metadata(id, meta_for(*span));
                Ok(id)
            }

            SurfaceExpr::Lambda { binders, body, span } => {
                let bound = self.lower_binders(store, types, core, scopes, binders)?;
                let b = self.lower_expr(store, types, core, scopes, body, None);
                scopes.pop();
                let b = b?;
                let arg_tys: Vec<Type> = bound.iter().map(|v| store.ty(*v).clone()).collect();
                let lam_ty = Type::function(arg_tys, store.ty(b).clone());
                let id = store.lambda(bound, b, lam_ty);
                store.set_metadata(id, meta_for(*span));
                Ok(id)
            }

            SurfaceExpr::Modal { op, index, body, span } => {
                let idx = match index {
                    Some(i) => {
                        let want = match op {
                            noesis_kernel::ModalOp::Knows | noesis_kernel::ModalOp::Believes => {
                                Type::Atomic(core.agent)
                            }
                            _ => Type::Atomic(core.world),
                        };
                        Some(self.lower_expr(store, types, core, scopes, i, Some(&want))?)
                    }
                    None => None,
                };
                let prop = core.prop();
                let b = self.lower_expr(store, types, core, scopes, body, Some(&prop))?;
                let id = store.modal(*op, idx, b, prop);
                store.set_metadata(id, meta_for(*span));
                Ok(id)
            }

            SurfaceExpr::Define { name, ty, body, span } => {
                let declared = self.resolve_type(store, types, core, ty, *span)?;
                let b = self.lower_expr(store, types, core, scopes, body, Some(&declared))?;
                types.declare(*name, declared.clone());
                let id = store.definition(*name, declared, b);
                store.set_metadata(id, meta_for(*span));
                Ok(id)
            }
        }
    }

    /// Resolves an identifier, auto-declaring it in forgiving mode.
    /// `app_arity` is nonzero when the name sits in application-head
    /// position with that many arguments.
    #[allow(clippy::too_many_arguments)]
    fn lower_ident(
        &mut self,
        store: &mut TermStore,
        types: &mut TypeTable,
        core: &CoreTypes,
        name: Symbol,
        span: Span,
        expected: Option<&Type>,
        app_arity: usize,
    ) -> Result<TermId, ParseError> {
        let ty = match types.get_type(name) {
            Some(t) => t.clone(),
            None => {
                if self.strict {
                    return Err(ParseError::unknown(
                        store.interner().resolve(name).to_string(),
                        span,
                    ));
                }
                let inferred = if app_arity > 0 {
                    let ret = match expected {
                        Some(t) if !matches!(t, Type::Atomic(s) if *s == core.proposition) => {
                            t.clone()
                        }
                        _ => core.bool_(),
                    };
                    Type::function(vec![core.entity_ty(); app_arity], ret)
                } else {
                    expected.cloned().unwrap_or_else(|| core.entity_ty())
                };
                types.declare(name, inferred.clone());
                inferred
            }
        };
        let id = store.constant(name, None, ty);
        store.set_metadata(id, meta_for(span));
        Ok(id)
    }

    fn lower_binders(
        &mut self,
        store: &mut TermStore,
        types: &mut TypeTable,
        core: &CoreTypes,
        scopes: &mut Vec<FxHashMap<Symbol, TermId>>,
        binders: &[Binder<'_>],
    ) -> Result<Vec<TermId>, ParseError> {
        let mut scope = FxHashMap::default();
        let mut bound = Vec::with_capacity(binders.len());
        for b in binders {
            let ty = match &b.ty {
                Some(t) => self.resolve_type(store, types, core, t, b.span)?,
                None => core.entity_ty(),
            };
            let var = store.fresh_variable(b.name, ty);
            scope.insert(b.name, var);
            bound.push(var);
        }
        scopes.push(scope);
        Ok(bound)
    }

    /// Resolves a surface type against the table (used by the snapshot
    /// reader as well as lowering).
    pub fn resolve_type(
        &mut self,
        store: &mut TermStore,
        types: &mut TypeTable,
        core: &CoreTypes,
        ty: &SurfaceType<'_>,
        span: Span,
    ) -> Result<Type, ParseError> {
        match ty {
            SurfaceType::Named(name) => {
                if types.is_atomic(*name) {
                    return Ok(Type::Atomic(*name));
                }
                if self.strict {
                    return Err(ParseError::unknown(
                        store.interner().resolve(*name).to_string(),
                        span,
                    ));
                }
                types
                    .define_atomic(*name, &[], store.interner())
                    .map_err(|e| ParseError::typing(e, span))?;
                Ok(Type::Atomic(*name))
            }
            SurfaceType::Applied { ctor, args } => {
                match types.parametric_arity(*ctor) {
                    Some(arity) if arity != args.len() => {
                        return Err(ParseError::typing(
                            noesis_kernel::TypeError::Arity {
                                symbol: store.interner().resolve(*ctor).to_string(),
                                expected: arity,
                                actual: args.len(),
                            },
                            span,
                        ))
                    }
                    Some(_) => {}
                    None => {
                        if self.strict {
                            return Err(ParseError::unknown(
                                store.interner().resolve(*ctor).to_string(),
                                span,
                            ));
                        }
                        types
                            .define_parametric(*ctor, args.len())
                            .map_err(|e| ParseError::typing(e, span))?;
                    }
                }
                let resolved: Result<Vec<Type>, ParseError> = args
                    .iter()
                    .map(|a| self.resolve_type(store, types, core, a, span))
                    .collect();
                Ok(Type::Instantiated { ctor: *ctor, args: resolved? })
            }
            SurfaceType::Func { args, ret } => {
                let resolved: Result<Vec<Type>, ParseError> = args
                    .iter()
                    .map(|a| self.resolve_type(store, types, core, a, span))
                    .collect();
                let ret = self.resolve_type(store, types, core, ret, span)?;
                Ok(Type::function(resolved?, ret))
            }
            SurfaceType::Var(name) => Ok(types.fresh_var(*name)),
        }
    }
}

impl Default for Lowerer {
    fn default() -> Self {
        Self::new()
    }
}

fn meta_for(span: Span) -> noesis_kernel::Metadata {
    noesis_kernel::Metadata { span: Some(span), ..Default::default() }
}

fn head_name(store: &TermStore, head: &SurfaceExpr<'_>) -> String {
    match head {
        SurfaceExpr::Ident { name, .. } => store.interner().resolve(*name).to_string(),
        _ => "<head>".to_string(),
    }
}
