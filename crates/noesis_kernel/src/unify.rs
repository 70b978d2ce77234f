//! First- and higher-order unification.
//!
//! # First-order mode
//!
//! [`unify`] implements Martelli–Montanari over an equation worklist. Rules
//! apply in the fixed order Delete, Decompose, Swap, Eliminate, with a
//! deterministic variable orientation (the younger variable is bound to the
//! older one), so the most general unifier comes out canonical. The
//! occurs-check is mandatory.
//!
//! # Higher-order mode
//!
//! [`unify_ho`] handles the Miller pattern fragment: a flex term is a free
//! metavariable applied to distinct bound variables. Both sides are reduced
//! to beta-eta normal form first. Pattern flex–rigid and flex–flex pairs
//! solve deterministically; non-pattern flex–rigid pairs go through bounded
//! imitation/projection search when the caller allows it; non-pattern
//! flex–flex pairs are left as residual equations for the caller to decide.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

use crate::error::UnifyError;
use crate::normalize::{normalize_unchecked, NormalForm};
use crate::subst::{free_variables, substitute, Subst};
use crate::term::{TermData, TermId, TermStore, VarId};
use crate::types::{Type, TypeTable};

/// Options for the higher-order search.
#[derive(Debug, Clone, Copy)]
pub struct HoOptions {
    /// Depth bound for imitation/projection search on non-pattern
    /// flex–rigid pairs. Zero disables the search entirely.
    pub search_depth: u32,
}

impl Default for HoOptions {
    fn default() -> Self {
        HoOptions { search_depth: 4 }
    }
}

/// Result of a higher-order unification.
#[derive(Debug, Clone)]
pub struct HoSolution {
    /// The computed substitution.
    pub subst: Subst,
    /// Non-pattern flex–flex pairs left unsolved.
    pub residual: Vec<(TermId, TermId)>,
}

/// Applies a substitution and beta-normalizes the result.
pub fn apply_and_reduce(store: &mut TermStore, t: TermId, subst: &Subst) -> TermId {
    let applied = substitute(store, t, subst);
    normalize_unchecked(store, applied, NormalForm::BetaNF, 2_000)
}

// ---------------------------------------------------------------------------
// First-order unification
// ---------------------------------------------------------------------------

/// Computes the most general first-order unifier of `a` and `b`.
pub fn unify(
    store: &mut TermStore,
    types: &TypeTable,
    a: TermId,
    b: TermId,
) -> Result<Subst, UnifyError> {
    let mut subst = Subst::default();
    let mut work: VecDeque<(TermId, TermId)> = VecDeque::new();
    work.push_back((a, b));

    while let Some((l, r)) = work.pop_front() {
        let l = substitute(store, l, &subst);
        let r = substitute(store, r, &subst);

        // Delete.
        if l == r {
            continue;
        }

        let l_data = store.data(l).clone();
        let r_data = store.data(r).clone();

        match (&l_data, &r_data) {
            // Eliminate, with deterministic orientation between variables:
            // the younger (higher-id) variable is bound to the older one.
            (TermData::Variable { var: lv, .. }, TermData::Variable { var: rv, .. }) => {
                if lv.0 > rv.0 {
                    bind(store, types, &mut subst, *lv, l, r)?;
                } else {
                    bind(store, types, &mut subst, *rv, r, l)?;
                }
            }
            (TermData::Variable { var, .. }, _) => {
                bind(store, types, &mut subst, *var, l, r)?;
            }
            // Swap.
            (_, TermData::Variable { var, .. }) => {
                bind(store, types, &mut subst, *var, r, l)?;
            }

            // Decompose.
            (
                TermData::Application { operator: lo, arguments: la },
                TermData::Application { operator: ro, arguments: ra },
            ) => {
                if la.len() != ra.len() {
                    return Err(UnifyError::ArityMismatch);
                }
                work.push_back((*lo, *ro));
                for (x, y) in la.iter().zip(ra.iter()) {
                    work.push_back((*x, *y));
                }
            }
            (
                TermData::Connective { kind: lk, operands: lo },
                TermData::Connective { kind: rk, operands: ro },
            ) => {
                if lk != rk {
                    return Err(UnifyError::SymbolClash);
                }
                if lo.len() != ro.len() {
                    return Err(UnifyError::ArityMismatch);
                }
                for (x, y) in lo.iter().zip(ro.iter()) {
                    work.push_back((*x, *y));
                }
            }
            (
                TermData::Modal { op: lop, index: li, body: lb },
                TermData::Modal { op: rop, index: ri, body: rb },
            ) => {
                if lop != rop {
                    return Err(UnifyError::SymbolClash);
                }
                match (li, ri) {
                    (None, None) => {}
                    (Some(x), Some(y)) => work.push_back((*x, *y)),
                    _ => return Err(UnifyError::SymbolClash),
                }
                work.push_back((*lb, *rb));
            }

            // Conflict. Binders are opaque in first-order mode; alpha-equal
            // binder terms were already handled by Delete above (they share
            // a canonical representative only after canon, so check it).
            (TermData::Quantifier { .. }, TermData::Quantifier { .. })
            | (TermData::Lambda { .. }, TermData::Lambda { .. }) => {
                if store.equal_mod_alpha(l, r) {
                    continue;
                }
                return Err(UnifyError::SymbolClash);
            }
            _ => return Err(UnifyError::SymbolClash),
        }
    }
    Ok(subst)
}

/// Binds `var := term` after occurs- and type-checks, composing into the
/// substitution.
fn bind(
    store: &mut TermStore,
    types: &TypeTable,
    subst: &mut Subst,
    var: VarId,
    var_term: TermId,
    term: TermId,
) -> Result<(), UnifyError> {
    if free_variables(store, term).contains(&var) {
        return Err(UnifyError::OccursCheck);
    }
    let var_ty = store.ty(var_term).clone();
    let term_ty = store.ty(term).clone();
    if !types.is_subtype(&term_ty, &var_ty) && types.unify_types(&var_ty, &term_ty).is_none() {
        return Err(UnifyError::SymbolClash);
    }

    // Re-apply the new binding to every existing range so the substitution
    // stays idempotent.
    let mut single = Subst::default();
    single.insert(var, term);
    let keys: Vec<VarId> = subst.keys().copied().collect();
    for k in keys {
        let range = subst[&k];
        let updated = substitute(store, range, &single);
        subst.insert(k, updated);
    }
    subst.insert(var, term);
    Ok(())
}

// ---------------------------------------------------------------------------
// Higher-order (Miller pattern) unification
// ---------------------------------------------------------------------------

/// Head/spine view of a term: `X(a1..an)` or a bare head with no spine.
fn spine(store: &TermStore, t: TermId) -> (TermId, Vec<TermId>) {
    match store.data(t) {
        TermData::Application { operator, arguments } => (*operator, arguments.clone()),
        _ => (t, Vec::new()),
    }
}

/// `true` when `t`'s head is a metavariable: a variable not bound by any
/// binder traversed so far.
fn is_flex(store: &TermStore, head: TermId, bound: &FxHashSet<VarId>) -> bool {
    matches!(store.data(head), TermData::Variable { var, .. } if !bound.contains(var))
}

/// Unifies `a` and `b` in the pattern fragment.
pub fn unify_ho(
    store: &mut TermStore,
    types: &TypeTable,
    a: TermId,
    b: TermId,
    opts: HoOptions,
) -> Result<HoSolution, UnifyError> {
    let a = normalize_unchecked(store, a, NormalForm::BetaEtaNF, 2_000);
    let b = normalize_unchecked(store, b, NormalForm::BetaEtaNF, 2_000);
    let mut state = HoState {
        subst: Subst::default(),
        residual: Vec::new(),
        bound: FxHashSet::default(),
    };
    solve(store, types, &mut state, vec![(a, b)], opts.search_depth)?;
    Ok(HoSolution { subst: state.subst, residual: state.residual })
}

struct HoState {
    subst: Subst,
    residual: Vec<(TermId, TermId)>,
    bound: FxHashSet<VarId>,
}

fn solve(
    store: &mut TermStore,
    types: &TypeTable,
    state: &mut HoState,
    mut work: Vec<(TermId, TermId)>,
    depth: u32,
) -> Result<(), UnifyError> {
    while let Some((l, r)) = work.pop() {
        let l = apply_and_reduce(store, l, &state.subst);
        let r = apply_and_reduce(store, r, &state.subst);
        if l == r || store.equal_mod_alpha(l, r) {
            continue;
        }

        let (l_head, l_args) = spine(store, l);
        let (r_head, r_args) = spine(store, r);
        let l_flex = is_flex(store, l_head, &state.bound);
        let r_flex = is_flex(store, r_head, &state.bound);

        match (l_flex, r_flex) {
            (true, false) => {
                solve_flex_rigid(store, types, state, &mut work, l_head, &l_args, r, depth)?
            }
            (false, true) => {
                solve_flex_rigid(store, types, state, &mut work, r_head, &r_args, l, depth)?
            }
            (true, true) => solve_flex_flex(store, state, l_head, &l_args, r_head, &r_args, l, r)?,
            (false, false) => decompose_rigid(store, types, state, &mut work, l, r)?,
        }
    }
    Ok(())
}

/// Rigid–rigid decomposition, including alignment of binders.
fn decompose_rigid(
    store: &mut TermStore,
    types: &TypeTable,
    state: &mut HoState,
    work: &mut Vec<(TermId, TermId)>,
    l: TermId,
    r: TermId,
) -> Result<(), UnifyError> {
    let l_data = store.data(l).clone();
    let r_data = store.data(r).clone();
    match (&l_data, &r_data) {
        (
            TermData::Lambda { bound: lb, body: lbody },
            TermData::Lambda { bound: rb, body: rbody },
        ) => {
            if lb.len() != rb.len() {
                return Err(UnifyError::ArityMismatch);
            }
            // Rename the right binders to the left ones, then compare bodies
            // with the left binders treated as rigid.
            let mut rename = Subst::default();
            for (x, y) in lb.iter().zip(rb.iter()) {
                if let TermData::Variable { var: yv, .. } = store.data(*y) {
                    rename.insert(*yv, *x);
                }
                if let TermData::Variable { var: xv, .. } = store.data(*x) {
                    state.bound.insert(*xv);
                }
            }
            let rbody = substitute(store, *rbody, &rename);
            work.push((*lbody, rbody));
            Ok(())
        }
        (
            TermData::Quantifier { kind: lk, bound: lb, body: lbody },
            TermData::Quantifier { kind: rk, bound: rb, body: rbody },
        ) => {
            if lk != rk {
                return Err(UnifyError::SymbolClash);
            }
            if lb.len() != rb.len() {
                return Err(UnifyError::ArityMismatch);
            }
            let mut rename = Subst::default();
            for (x, y) in lb.iter().zip(rb.iter()) {
                if let TermData::Variable { var: yv, .. } = store.data(*y) {
                    rename.insert(*yv, *x);
                }
                if let TermData::Variable { var: xv, .. } = store.data(*x) {
                    state.bound.insert(*xv);
                }
            }
            let rbody = substitute(store, *rbody, &rename);
            work.push((*lbody, rbody));
            Ok(())
        }
        (
            TermData::Application { operator: lo, arguments: la },
            TermData::Application { operator: ro, arguments: ra },
        ) => {
            if la.len() != ra.len() {
                return Err(UnifyError::ArityMismatch);
            }
            work.push((*lo, *ro));
            for (x, y) in la.iter().zip(ra.iter()) {
                work.push((*x, *y));
            }
            Ok(())
        }
        (
            TermData::Connective { kind: lk, operands: lo },
            TermData::Connective { kind: rk, operands: ro },
        ) => {
            if lk != rk || lo.len() != ro.len() {
                return Err(UnifyError::SymbolClash);
            }
            for (x, y) in lo.iter().zip(ro.iter()) {
                work.push((*x, *y));
            }
            Ok(())
        }
        (
            TermData::Modal { op: lop, index: li, body: lb },
            TermData::Modal { op: rop, index: ri, body: rb },
        ) => {
            if lop != rop {
                return Err(UnifyError::SymbolClash);
            }
            match (li, ri) {
                (None, None) => {}
                (Some(x), Some(y)) => work.push((*x, *y)),
                _ => return Err(UnifyError::SymbolClash),
            }
            work.push((*lb, *rb));
            Ok(())
        }
        (TermData::Variable { var: lv, .. }, TermData::Variable { var: rv, .. })
            if state.bound.contains(lv) && state.bound.contains(rv) =>
        {
            // Two distinct rigid bound variables never unify.
            Err(UnifyError::SymbolClash)
        }
        _ => {
            let _ = types;
            Err(UnifyError::SymbolClash)
        }
    }
}

/// Arguments of a flex head as bound-variable ids, if the spine is a Miller
/// pattern (all distinct, all bound).
fn pattern_args(
    store: &TermStore,
    args: &[TermId],
    bound: &FxHashSet<VarId>,
) -> Option<Vec<VarId>> {
    let mut seen = FxHashSet::default();
    let mut out = Vec::with_capacity(args.len());
    for a in args {
        match store.data(*a) {
            TermData::Variable { var, .. } if bound.contains(var) && seen.insert(*var) => {
                out.push(*var)
            }
            _ => return None,
        }
    }
    Some(out)
}

#[allow(clippy::too_many_arguments)]
fn solve_flex_rigid(
    store: &mut TermStore,
    types: &TypeTable,
    state: &mut HoState,
    work: &mut Vec<(TermId, TermId)>,
    head: TermId,
    args: &[TermId],
    rigid: TermId,
    depth: u32,
) -> Result<(), UnifyError> {
    let head_var = match store.data(head) {
        TermData::Variable { var, .. } => *var,
        _ => unreachable!("flex head is always a variable"),
    };

    if let Some(pat) = pattern_args(store, args, &state.bound) {
        // Occurs check on the metavariable itself.
        if free_variables(store, rigid).contains(&head_var) {
            return Err(UnifyError::OccursCheck);
        }
        // Every rigid bound variable of the right side must appear among the
        // pattern arguments, otherwise it would escape its binder.
        let rigid_free = free_variables(store, rigid);
        for v in rigid_free.iter() {
            if state.bound.contains(v) && !pat.contains(v) {
                return Err(UnifyError::SymbolClash);
            }
        }
        let binding = abstract_over(store, args, &pat, rigid);
        insert_binding(store, state, head_var, binding);
        return Ok(());
    }

    // Non-pattern flex–rigid: bounded imitation/projection search.
    if depth == 0 {
        return Err(UnifyError::NotAPattern);
    }
    search_flex_rigid(store, types, state, work, head, head_var, args, rigid, depth)
}

/// Builds `λ fresh-copies-of-args. rigid[args := copies]`, or the rigid term
/// itself for a zero-length spine.
fn abstract_over(
    store: &mut TermStore,
    args: &[TermId],
    arg_vars: &[VarId],
    rigid: TermId,
) -> TermId {
    if args.is_empty() {
        return rigid;
    }
    let mut rename = Subst::default();
    let mut fresh_bound = Vec::with_capacity(args.len());
    let mut arg_tys = Vec::with_capacity(args.len());
    for (a, v) in args.iter().zip(arg_vars.iter()) {
        let (name, ty) = match store.data(*a) {
            TermData::Variable { name, .. } => (*name, store.ty(*a).clone()),
            _ => unreachable!("pattern argument is always a variable"),
        };
        let fresh = store.fresh_variable(name, ty.clone());
        rename.insert(*v, fresh);
        fresh_bound.push(fresh);
        arg_tys.push(ty);
    }
    let body = substitute(store, rigid, &rename);
    let body_ty = store.ty(body).clone();
    store.lambda(fresh_bound, body, Type::function(arg_tys, body_ty))
}

fn insert_binding(store: &mut TermStore, state: &mut HoState, var: VarId, binding: TermId) {
    let mut single = Subst::default();
    single.insert(var, binding);
    let keys: Vec<VarId> = state.subst.keys().copied().collect();
    for k in keys {
        let range = state.subst[&k];
        let updated = apply_and_reduce(store, range, &single);
        state.subst.insert(k, updated);
    }
    state.subst.insert(var, binding);
}

fn solve_flex_flex(
    store: &mut TermStore,
    state: &mut HoState,
    l_head: TermId,
    l_args: &[TermId],
    r_head: TermId,
    r_args: &[TermId],
    l: TermId,
    r: TermId,
) -> Result<(), UnifyError> {
    let (l_pat, r_pat) = match (
        pattern_args(store, l_args, &state.bound),
        pattern_args(store, r_args, &state.bound),
    ) {
        (Some(a), Some(b)) => (a, b),
        // Outside the pattern fragment: leave the pair for the caller.
        _ => {
            state.residual.push((l, r));
            return Ok(());
        }
    };
    let l_var = match store.data(l_head) {
        TermData::Variable { var, .. } => *var,
        _ => unreachable!(),
    };
    let r_var = match store.data(r_head) {
        TermData::Variable { var, .. } => *var,
        _ => unreachable!(),
    };

    if l_var == r_var {
        // Same head: keep exactly the positions where the spines agree.
        if l_pat == r_pat {
            return Ok(());
        }
        let common: Vec<TermId> = l_args
            .iter()
            .zip(r_args.iter())
            .filter(|(a, b)| a == b)
            .map(|(a, _)| *a)
            .collect();
        let fresh_head = fresh_metavar(store, &common, l);
        let applied = apply_spine(store, fresh_head, &common, l);
        let binding = abstract_over(store, l_args, &l_pat, applied);
        insert_binding(store, state, l_var, binding);
        return Ok(());
    }

    // Different heads: both map onto a fresh metavariable over the common
    // variables of the two spines.
    let common: Vec<TermId> = l_args
        .iter()
        .filter(|a| r_args.contains(a))
        .copied()
        .collect();
    let fresh_head = fresh_metavar(store, &common, l);
    let applied = apply_spine(store, fresh_head, &common, l);
    let l_binding = abstract_over(store, l_args, &l_pat, applied);
    let r_binding = abstract_over(store, r_args, &r_pat, applied);
    insert_binding(store, state, l_var, l_binding);
    insert_binding(store, state, r_var, r_binding);
    Ok(())
}

/// A fresh metavariable whose type is a function from the given arguments'
/// types to the type of `like`.
fn fresh_metavar(store: &mut TermStore, args: &[TermId], like: TermId) -> TermId {
    let ret = store.ty(like).clone();
    let name = store.interner_mut().intern("H");
    if args.is_empty() {
        return store.fresh_variable(name, ret);
    }
    let arg_tys: Vec<Type> = args.iter().map(|a| store.ty(*a).clone()).collect();
    store.fresh_variable(name, Type::function(arg_tys, ret))
}

fn apply_spine(store: &mut TermStore, head: TermId, args: &[TermId], like: TermId) -> TermId {
    if args.is_empty() {
        return head;
    }
    let ty = store.ty(like).clone();
    store.application(head, args.to_vec(), ty)
}

/// Imitation/projection search for a non-pattern flex–rigid pair.
#[allow(clippy::too_many_arguments)]
fn search_flex_rigid(
    store: &mut TermStore,
    types: &TypeTable,
    state: &mut HoState,
    work: &mut Vec<(TermId, TermId)>,
    head: TermId,
    head_var: VarId,
    args: &[TermId],
    rigid: TermId,
    depth: u32,
) -> Result<(), UnifyError> {
    let head_ty = store.ty(head).clone();
    let (param_tys, _ret_ty) = match &head_ty {
        Type::Function { args, ret } => (args.clone(), (**ret).clone()),
        // A bare metavariable against a rigid term is an ordinary binding.
        _ => {
            if free_variables(store, rigid).contains(&head_var) {
                return Err(UnifyError::OccursCheck);
            }
            insert_binding(store, state, head_var, rigid);
            return Ok(());
        }
    };

    let mut candidates: Vec<TermId> = Vec::new();

    // Fresh binder copies shared by every candidate shape.
    let mut binder = Vec::with_capacity(param_tys.len());
    for ty in &param_tys {
        let name = store.interner_mut().intern("w");
        binder.push(store.fresh_variable(name, ty.clone()));
    }

    // Projections: λ ws. wi, where wi's type matches the result.
    for b in &binder {
        let b_ty = store.ty(*b).clone();
        if types.is_subtype(&b_ty, store.ty(rigid)) || b_ty == *store.ty(rigid) {
            let lam_ty = Type::function(param_tys.clone(), b_ty);
            candidates.push(store.lambda(binder.clone(), *b, lam_ty));
        }
    }

    // Imitation: λ ws. h(H1(ws), ..., Hk(ws)) copying the rigid head.
    let (r_head, r_args) = spine(store, rigid);
    if matches!(store.data(r_head), TermData::Constant { .. }) {
        let mut imit_args = Vec::with_capacity(r_args.len());
        for ra in &r_args {
            let h = fresh_metavar(store, &binder, *ra);
            imit_args.push(apply_spine(store, h, &binder, *ra));
        }
        let body = if imit_args.is_empty() {
            r_head
        } else {
            let rigid_ty = store.ty(rigid).clone();
            store.application(r_head, imit_args, rigid_ty)
        };
        let body_ty = store.ty(body).clone();
        let lam_ty = Type::function(param_tys.clone(), body_ty);
        candidates.push(store.lambda(binder.clone(), body, lam_ty));
    }

    let flex = apply_spine(store, head, args, rigid);
    for cand in candidates {
        let mut trial_state = HoState {
            subst: state.subst.clone(),
            residual: state.residual.clone(),
            bound: state.bound.clone(),
        };
        insert_binding(store, &mut trial_state, head_var, cand);
        let mut trial_work = work.clone();
        trial_work.push((flex, rigid));
        if solve(store, types, &mut trial_state, trial_work, depth - 1).is_ok() {
            state.subst = trial_state.subst;
            state.residual = trial_state.residual;
            state.bound = trial_state.bound;
            work.clear();
            return Ok(());
        }
    }
    Err(UnifyError::DepthExceeded)
}
