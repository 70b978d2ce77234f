//! Clause-normal-form conversion for the resolution prover.
//!
//! Pipeline over a formula: negation normal form (implication and
//! equivalence expanded, negations pushed to atoms), skolemization of
//! existentials against the enclosing universal prefix (a fresh symbol per
//! existential occurrence), universal prefix dropped, disjunction
//! distributed over conjunction, and finally variables standardized apart
//! per clause. Modal subformulas are treated as opaque atoms; goals that
//! need modal reasoning go to the tableau prover instead.

use noesis_kernel::{
    substitute, ConnectiveKind, CoreTypes, QuantKind, Subst, TermData, TermId, TermStore, Type,
    TypeTable, VarId,
};
use rustc_hash::FxHashMap;

/// A signed atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Literal {
    pub positive: bool,
    pub atom: TermId,
}

impl Literal {
    pub fn complement(self) -> Literal {
        Literal { positive: !self.positive, atom: self.atom }
    }
}

/// A disjunction of literals. The empty clause is falsum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub literals: Vec<Literal>,
}

impl Clause {
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// A clause containing `L` and `¬L` is true everywhere and useless.
    pub fn is_tautology(&self) -> bool {
        self.literals.iter().any(|l| {
            self.literals
                .iter()
                .any(|m| l.positive != m.positive && l.atom == m.atom)
        })
    }

    /// Deduplicates identical literals in place.
    pub fn dedup(&mut self) {
        let mut seen = Vec::new();
        self.literals.retain(|l| {
            if seen.contains(l) {
                false
            } else {
                seen.push(*l);
                true
            }
        });
    }
}

/// Fresh-symbol state shared across one clausification run.
pub struct SkolemState {
    counter: u32,
}

impl SkolemState {
    pub fn new() -> Self {
        SkolemState { counter: 0 }
    }
}

impl Default for SkolemState {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts a formula to a set of clauses.
pub fn clausify(
    store: &mut TermStore,
    types: &mut TypeTable,
    core: &CoreTypes,
    formula: TermId,
    skolem: &mut SkolemState,
) -> Vec<Clause> {
    let nnf = to_nnf(store, core, formula, true);
    let mut universals: Vec<TermId> = Vec::new();
    let matrix = skolemize(store, types, core, nnf, &mut universals, skolem);
    let mut clauses = distribute(store, matrix);
    for c in &mut clauses {
        c.dedup();
    }
    clauses
        .into_iter()
        .filter(|c| !c.is_tautology())
        .map(|c| standardize_apart(store, c))
        .collect()
}

/// Negation normal form. `positive` is the polarity of the current
/// position; implications and equivalences are expanded on the way down.
pub fn to_nnf(store: &mut TermStore, core: &CoreTypes, t: TermId, positive: bool) -> TermId {
    let prop = core.prop();
    match store.data(t).clone() {
        TermData::Connective { kind: ConnectiveKind::Not, operands } => {
            to_nnf(store, core, operands[0], !positive)
        }
        TermData::Connective { kind: ConnectiveKind::And, operands } => {
            let mapped: Vec<TermId> =
                operands.iter().map(|o| to_nnf(store, core, *o, positive)).collect();
            let kind = if positive { ConnectiveKind::And } else { ConnectiveKind::Or };
            store.connective(kind, mapped, prop)
        }
        TermData::Connective { kind: ConnectiveKind::Or, operands } => {
            let mapped: Vec<TermId> =
                operands.iter().map(|o| to_nnf(store, core, *o, positive)).collect();
            let kind = if positive { ConnectiveKind::Or } else { ConnectiveKind::And };
            store.connective(kind, mapped, prop)
        }
        TermData::Connective { kind: ConnectiveKind::Implies, operands } => {
            let (a, b) = (operands[0], operands[1]);
            if positive {
                let na = to_nnf(store, core, a, false);
                let pb = to_nnf(store, core, b, true);
                store.connective(ConnectiveKind::Or, vec![na, pb], prop)
            } else {
                let pa = to_nnf(store, core, a, true);
                let nb = to_nnf(store, core, b, false);
                store.connective(ConnectiveKind::And, vec![pa, nb], prop)
            }
        }
        TermData::Connective { kind: ConnectiveKind::Equiv, operands } => {
            // a ≡ b  ⇝  (a ⇒ b) ∧ (b ⇒ a), then normalize that.
            let (a, b) = (operands[0], operands[1]);
            let ab = store.connective(ConnectiveKind::Implies, vec![a, b], prop.clone());
            let ba = store.connective(ConnectiveKind::Implies, vec![b, a], prop.clone());
            let both = store.connective(ConnectiveKind::And, vec![ab, ba], prop);
            to_nnf(store, core, both, positive)
        }
        TermData::Quantifier { kind, bound, body } => {
            let flipped = match (kind, positive) {
                (k, true) => k,
                (QuantKind::Forall, false) => QuantKind::Exists,
                (QuantKind::Exists, false) => QuantKind::Forall,
            };
            let inner = to_nnf(store, core, body, positive);
            store.quantifier(flipped, bound, inner, prop)
        }
        // Atoms, including modal subformulas, which resolution treats as
        // opaque.
        _ => {
            if positive {
                t
            } else {
                store.connective(ConnectiveKind::Not, vec![t], prop)
            }
        }
    }
}

/// Removes quantifiers from an NNF formula: universals are recorded (their
/// variables stay free in the matrix), existentials become Skolem terms
/// over the enclosing universal prefix.
pub(crate) fn skolemize(
    store: &mut TermStore,
    types: &mut TypeTable,
    core: &CoreTypes,
    t: TermId,
    universals: &mut Vec<TermId>,
    skolem: &mut SkolemState,
) -> TermId {
    match store.data(t).clone() {
        TermData::Quantifier { kind: QuantKind::Forall, bound, body } => {
            let depth = universals.len();
            universals.extend(bound.iter().copied());
            let out = skolemize(store, types, core, body, universals, skolem);
            universals.truncate(depth);
            out
        }
        TermData::Quantifier { kind: QuantKind::Exists, bound, body } => {
            let mut subst = Subst::default();
            for var_term in &bound {
                let (var_id, var_ty) = match store.data(*var_term) {
                    TermData::Variable { var, .. } => (*var, store.ty(*var_term).clone()),
                    _ => continue,
                };
                let sym = store.interner_mut().numbered("sk", skolem.counter);
                skolem.counter += 1;
                let replacement = if universals.is_empty() {
                    types.declare(sym, var_ty.clone());
                    store.constant(sym, None, var_ty)
                } else {
                    let arg_tys: Vec<Type> =
                        universals.iter().map(|u| store.ty(*u).clone()).collect();
                    let fn_ty = Type::function(arg_tys, var_ty.clone());
                    types.declare(sym, fn_ty.clone());
                    let head = store.constant(sym, None, fn_ty);
                    store.application(head, universals.clone(), var_ty)
                };
                subst.insert(var_id, replacement);
            }
            let instantiated = substitute(store, body, &subst);
            skolemize(store, types, core, instantiated, universals, skolem)
        }
        TermData::Connective { kind, operands } => {
            let mapped: Vec<TermId> = operands
                .iter()
                .map(|o| skolemize(store, types, core, *o, universals, skolem))
                .collect();
            store.connective(kind, mapped, core.prop())
        }
        _ => t,
    }
}

/// Distributes disjunction over conjunction, producing clauses.
pub(crate) fn distribute(store: &TermStore, t: TermId) -> Vec<Clause> {
    match store.data(t) {
        TermData::Connective { kind: ConnectiveKind::And, operands } => {
            let operands = operands.clone();
            operands.iter().flat_map(|o| distribute(store, *o)).collect()
        }
        TermData::Connective { kind: ConnectiveKind::Or, operands } => {
            let operands = operands.clone();
            let mut acc: Vec<Clause> = vec![Clause { literals: Vec::new() }];
            for o in operands {
                let sub = distribute(store, o);
                let mut merged = Vec::with_capacity(acc.len() * sub.len());
                for left in &acc {
                    for right in &sub {
                        let mut lits = left.literals.clone();
                        lits.extend(right.literals.iter().copied());
                        merged.push(Clause { literals: lits });
                    }
                }
                acc = merged;
            }
            acc
        }
        TermData::Connective { kind: ConnectiveKind::Not, operands } => {
            vec![Clause { literals: vec![Literal { positive: false, atom: operands[0] }] }]
        }
        _ => vec![Clause { literals: vec![Literal { positive: true, atom: t }] }],
    }
}

/// Renames every free variable of the clause to a fresh one, so clauses
/// never share variables.
pub fn standardize_apart(store: &mut TermStore, clause: Clause) -> Clause {
    let mut rename = Subst::default();
    let mut mapping: FxHashMap<VarId, TermId> = FxHashMap::default();
    for lit in &clause.literals {
        let free = noesis_kernel::free_variable_terms(store, lit.atom);
        for (var, term) in free {
            if mapping.contains_key(&var) {
                continue;
            }
            let (name, ty) = match store.data(term) {
                TermData::Variable { name, .. } => (*name, store.ty(term).clone()),
                _ => continue,
            };
            let fresh = store.fresh_variable(name, ty);
            mapping.insert(var, fresh);
            rename.insert(var, fresh);
        }
    }
    if rename.is_empty() {
        return clause;
    }
    Clause {
        literals: clause
            .literals
            .iter()
            .map(|l| Literal { positive: l.positive, atom: substitute(store, l.atom, &rename) })
            .collect(),
    }
}

/// One-way matching for θ-subsumption: variables of `pattern` may bind,
/// variables of `target` may not.
fn match_one_way(
    store: &TermStore,
    bindings: &mut FxHashMap<VarId, TermId>,
    pattern: TermId,
    target: TermId,
) -> bool {
    let pattern = match store.data(pattern) {
        TermData::Variable { var, .. } => match bindings.get(var) {
            Some(bound) => *bound,
            None => {
                bindings.insert(*var, target);
                return true;
            }
        },
        _ => pattern,
    };
    if pattern == target {
        return true;
    }
    match (store.data(pattern), store.data(target)) {
        (
            TermData::Application { operator: po, arguments: pa },
            TermData::Application { operator: to, arguments: ta },
        ) => {
            if pa.len() != ta.len() {
                return false;
            }
            let (po, to) = (*po, *to);
            let pairs: Vec<(TermId, TermId)> =
                pa.iter().copied().zip(ta.iter().copied()).collect();
            match_one_way(store, bindings, po, to)
                && pairs.into_iter().all(|(x, y)| match_one_way(store, bindings, x, y))
        }
        _ => false,
    }
}

/// θ-subsumption: `general` subsumes `specific` when some substitution
/// maps `general`'s literals into a subset of `specific`'s.
pub fn subsumes(store: &TermStore, general: &Clause, specific: &Clause) -> bool {
    if general.literals.len() > specific.literals.len() {
        return false;
    }
    fn go(
        store: &TermStore,
        general: &[Literal],
        specific: &[Literal],
        bindings: FxHashMap<VarId, TermId>,
    ) -> bool {
        let lit = match general.first() {
            Some(l) => *l,
            None => return true,
        };
        for target in specific {
            if target.positive != lit.positive {
                continue;
            }
            let mut extended = bindings.clone();
            if match_one_way(store, &mut extended, lit.atom, target.atom)
                && go(store, &general[1..], specific, extended)
            {
                return true;
            }
        }
        false
    }
    go(store, &general.literals, &specific.literals, FxHashMap::default())
}
