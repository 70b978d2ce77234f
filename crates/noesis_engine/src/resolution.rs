//! Set-of-support resolution with subsumption.
//!
//! The clause set starts from the CNF of the axioms plus the negated goal;
//! only clauses descended from the negated goal are selected for
//! resolution (set-of-support), with unit preference among them. Forward
//! and backward θ-subsumption keep the set reduced, tautologies are
//! discarded on creation, and clauses are standardized apart before every
//! step. Success is the empty clause; saturation without it is `Unknown`.
//!
//! Answer extraction: unifier bindings for the goal's free variables are
//! threaded through every resolution step, so a proved non-ground goal
//! reports its answer substitution.

use log::debug;
use noesis_kernel::{
    substitute, unify, ConnectiveKind, CoreTypes, Subst, TermId, TermStore, TypeTable, VarId,
};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::cnf::{clausify, standardize_apart, subsumes, Clause, Literal, SkolemState};
use crate::limits::{Budget, CancelFlag, ResourceLimits};
use crate::proof::{EngineKind, ProofObject, ProofStatus};

/// Where a clause came from.
#[derive(Debug, Clone)]
enum Origin {
    /// CNF of a stored axiom.
    Axiom(TermId),
    /// CNF of the negated goal.
    NegatedGoal,
    /// Resolvent of two earlier clauses.
    Resolvent(usize, usize),
}

struct Derived {
    clause: Clause,
    origin: Origin,
    /// Part of the set of support.
    sos: bool,
    /// Alive until backward subsumption removes it.
    alive: bool,
    /// Accumulated answer bindings for the goal's free variables.
    answer: FxHashMap<VarId, TermId>,
}

/// Proves `goal` from `axioms` by refuting its negation.
pub fn prove(
    store: &mut TermStore,
    types: &mut TypeTable,
    core: &CoreTypes,
    axioms: &[TermId],
    goal: TermId,
    limits: ResourceLimits,
    cancel: CancelFlag,
) -> ProofObject {
    let goal_vars: Vec<VarId> =
        noesis_kernel::free_variables(store, goal).into_iter().collect();
    let negated = store.connective(ConnectiveKind::Not, vec![goal], core.prop());
    let mut po = run(store, types, core, axioms, Some((negated, &goal_vars)), limits, cancel);
    if po.status == ProofStatus::Contradiction {
        // A refutation of the negated goal proves the goal.
        po.status = ProofStatus::Proved;
        po.goal_achieved = true;
        let answer: Subst = po.bindings.iter().map(|(v, t)| (*v, *t)).collect();
        po.conclusion = Some(substitute(store, goal, &answer));
        po.message = "goal proved by refutation".to_string();
    }
    po
}

/// Attempts to derive the empty clause from `axioms` alone (consistency
/// refutation). `Contradiction` on success.
pub fn refute(
    store: &mut TermStore,
    types: &mut TypeTable,
    core: &CoreTypes,
    axioms: &[TermId],
    limits: ResourceLimits,
    cancel: CancelFlag,
) -> ProofObject {
    run(store, types, core, axioms, None, limits, cancel)
}

fn run(
    store: &mut TermStore,
    types: &mut TypeTable,
    core: &CoreTypes,
    axioms: &[TermId],
    goal: Option<(TermId, &[VarId])>,
    limits: ResourceLimits,
    cancel: CancelFlag,
) -> ProofObject {
    let mut budget = Budget::with_cancel(limits, cancel);
    let mut skolem = SkolemState::new();
    let mut derived: Vec<Derived> = Vec::new();

    for axiom in axioms {
        for clause in clausify(store, types, core, *axiom, &mut skolem) {
            derived.push(Derived {
                clause,
                origin: Origin::Axiom(*axiom),
                // Without a goal every input clause supports the search.
                sos: goal.is_none(),
                alive: true,
                answer: FxHashMap::default(),
            });
        }
    }
    let goal_vars: Vec<VarId> = goal.map(|(_, vs)| vs.to_vec()).unwrap_or_default();
    if let Some((negated, _)) = goal {
        for clause in clausify_goal(store, types, core, negated, &mut skolem) {
            derived.push(Derived {
                clause,
                origin: Origin::NegatedGoal,
                sos: true,
                alive: true,
                answer: FxHashMap::default(),
            });
        }
    }

    debug!("resolution: {} input clauses", derived.len());

    // Immediate success: an input empty clause.
    if let Some(idx) = derived.iter().position(|d| d.clause.is_empty()) {
        return finish(store, core, &derived, idx, &goal_vars, &budget);
    }

    let mut processed: FxHashSet<usize> = FxHashSet::default();
    loop {
        // Unit preference among unprocessed set-of-support clauses.
        let given = derived
            .iter()
            .enumerate()
            .filter(|(i, d)| d.alive && d.sos && !processed.contains(i))
            .min_by_key(|(_, d)| d.clause.literals.len())
            .map(|(i, _)| i);
        let given = match given {
            Some(g) => g,
            None => {
                let mut po = ProofObject::with_status(
                    EngineKind::Resolution,
                    ProofStatus::Unknown,
                    "clause set saturated without refutation",
                );
                po.time_ms = budget.elapsed_ms();
                po.record_resource("clauses", derived.len() as u64);
                po.record_resource("steps", budget.steps());
                return po;
            }
        };
        processed.insert(given);

        let partners: Vec<usize> =
            (0..derived.len()).filter(|i| derived[*i].alive && *i != given).collect();
        for partner in partners {
            if let Some(dim) = budget.tick() {
                let mut po = ProofObject::with_status(
                    EngineKind::Resolution,
                    ProofStatus::ResourceExhausted(dim),
                    "resolution budget exhausted",
                );
                po.time_ms = budget.elapsed_ms();
                po.record_resource("clauses", derived.len() as u64);
                return po;
            }

            // Standardize the partner apart before resolving, so the two
            // parents never share variables.
            let partner_clause = standardize_apart(store, derived[partner].clause.clone());
            let given_clause = derived[given].clause.clone();

            for (gi, glit) in given_clause.literals.iter().enumerate() {
                for (pi, plit) in partner_clause.literals.iter().enumerate() {
                    if glit.positive == plit.positive {
                        continue;
                    }
                    let sigma = match unify(store, types, glit.atom, plit.atom) {
                        Ok(s) => s,
                        Err(_) => continue,
                    };
                    let resolvent =
                        build_resolvent(store, &given_clause, gi, &partner_clause, pi, &sigma);
                    if resolvent.is_tautology() {
                        continue;
                    }
                    // Forward subsumption.
                    if derived
                        .iter()
                        .any(|d| d.alive && subsumes(store, &d.clause, &resolvent))
                    {
                        continue;
                    }
                    // Backward subsumption.
                    for d in derived.iter_mut() {
                        if d.alive && subsumes(store, &resolvent, &d.clause) {
                            d.alive = false;
                        }
                    }

                    let answer = merge_answers(
                        store,
                        &derived[given].answer,
                        &derived[partner].answer,
                        &sigma,
                        &goal_vars,
                    );
                    let is_empty = resolvent.is_empty();
                    derived.push(Derived {
                        clause: resolvent,
                        origin: Origin::Resolvent(given, partner),
                        sos: true,
                        alive: true,
                        answer,
                    });
                    if let Some(dim) = budget.charge_nodes(1) {
                        let mut po = ProofObject::with_status(
                            EngineKind::Resolution,
                            ProofStatus::ResourceExhausted(dim),
                            "clause budget exhausted",
                        );
                        po.time_ms = budget.elapsed_ms();
                        po.record_resource("clauses", derived.len() as u64);
                        return po;
                    }
                    if is_empty {
                        let idx = derived.len() - 1;
                        return finish(store, core, &derived, idx, &goal_vars, &budget);
                    }
                }
            }
        }
    }
}

/// Clausifies the negated goal without the per-clause variable renaming
/// `clausify` performs: the goal's own variable ids must survive into the
/// clauses so answers can be read off the step unifiers.
fn clausify_goal(
    store: &mut TermStore,
    types: &mut TypeTable,
    core: &CoreTypes,
    negated: TermId,
    skolem: &mut SkolemState,
) -> Vec<Clause> {
    let mut clauses = Vec::new();
    let nnf = crate::cnf::to_nnf(store, core, negated, true);
    let mut universals = Vec::new();
    let matrix = crate::cnf::skolemize(store, types, core, nnf, &mut universals, skolem);
    for clause in crate::cnf::distribute(store, matrix) {
        let mut c = clause;
        c.dedup();
        if !c.is_tautology() {
            clauses.push(c);
        }
    }
    clauses
}

fn build_resolvent(
    store: &mut TermStore,
    given: &Clause,
    skip_given: usize,
    partner: &Clause,
    skip_partner: usize,
    sigma: &Subst,
) -> Clause {
    let mut literals = Vec::with_capacity(given.literals.len() + partner.literals.len() - 2);
    for (i, lit) in given.literals.iter().enumerate() {
        if i == skip_given {
            continue;
        }
        literals.push(Literal {
            positive: lit.positive,
            atom: substitute(store, lit.atom, sigma),
        });
    }
    for (i, lit) in partner.literals.iter().enumerate() {
        if i == skip_partner {
            continue;
        }
        literals.push(Literal {
            positive: lit.positive,
            atom: substitute(store, lit.atom, sigma),
        });
    }
    let mut clause = Clause { literals };
    clause.dedup();
    clause
}

/// Combines parent answers with the step unifier, restricted to goal
/// variables.
fn merge_answers(
    store: &mut TermStore,
    a: &FxHashMap<VarId, TermId>,
    b: &FxHashMap<VarId, TermId>,
    sigma: &Subst,
    goal_vars: &[VarId],
) -> FxHashMap<VarId, TermId> {
    let mut out = FxHashMap::default();
    for (v, t) in a.iter().chain(b.iter()) {
        out.insert(*v, substitute(store, *t, sigma));
    }
    for gv in goal_vars {
        if out.contains_key(gv) {
            continue;
        }
        if let Some(t) = sigma.get(gv) {
            out.insert(*gv, *t);
        }
    }
    out
}

/// Builds the final proof object from the parent DAG of the empty clause.
fn finish(
    store: &mut TermStore,
    core: &CoreTypes,
    derived: &[Derived],
    empty_idx: usize,
    goal_vars: &[VarId],
    budget: &Budget,
) -> ProofObject {
    let falsum_sym = store.interner_mut().intern("false");
    let falsum = store.constant(falsum_sym, None, core.bool_());

    let mut po =
        ProofObject::with_status(EngineKind::Resolution, ProofStatus::Contradiction, "empty clause derived");
    po.conclusion = Some(falsum);

    // Topological emit: walk ancestors depth-first, emitting premises
    // before dependents.
    let mut step_of: FxHashMap<usize, usize> = FxHashMap::default();
    let mut stack = vec![(empty_idx, false)];
    while let Some((idx, expanded)) = stack.pop() {
        if step_of.contains_key(&idx) {
            continue;
        }
        match &derived[idx].origin {
            Origin::Axiom(source) => {
                let concl = clause_term(store, core, &derived[idx].clause, falsum);
                let s = po.push_step("axiom", vec![], concl);
                step_of.insert(idx, s);
                po.used_axioms.insert(*source);
            }
            Origin::NegatedGoal => {
                let concl = clause_term(store, core, &derived[idx].clause, falsum);
                let s = po.push_step("negated-goal", vec![], concl);
                step_of.insert(idx, s);
            }
            Origin::Resolvent(a, b) => {
                let (a, b) = (*a, *b);
                if expanded {
                    let concl = clause_term(store, core, &derived[idx].clause, falsum);
                    let s = po.push_step("resolve", vec![step_of[&a], step_of[&b]], concl);
                    step_of.insert(idx, s);
                } else {
                    stack.push((idx, true));
                    stack.push((a, false));
                    stack.push((b, false));
                }
            }
        }
    }

    for gv in goal_vars {
        if let Some(t) = derived[empty_idx].answer.get(gv) {
            po.bindings.insert(*gv, *t);
        }
    }
    po.time_ms = budget.elapsed_ms();
    po.record_resource("clauses", derived.len() as u64);
    po.record_resource("steps", budget.steps());
    po
}

/// Renders a clause as a term for proof steps: falsum, a single literal,
/// or a disjunction.
fn clause_term(store: &mut TermStore, core: &CoreTypes, clause: &Clause, falsum: TermId) -> TermId {
    let lit_term = |store: &mut TermStore, l: &Literal| {
        if l.positive {
            l.atom
        } else {
            store.connective(ConnectiveKind::Not, vec![l.atom], core.prop())
        }
    };
    match clause.literals.len() {
        0 => falsum,
        1 => lit_term(store, &clause.literals[0]),
        _ => {
            let lits: Vec<TermId> =
                clause.literals.iter().map(|l| lit_term(store, l)).collect();
            store.connective(ConnectiveKind::Or, lits, core.prop())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noesis_kernel::prelude;
    use noesis_language::Frontend;

    struct Fixture {
        store: TermStore,
        types: TypeTable,
        core: CoreTypes,
        frontend: Frontend,
    }

    fn fixture() -> Fixture {
        let mut store = TermStore::new();
        let mut types = TypeTable::new();
        let core = prelude::install(&mut types, &mut store).unwrap();
        Fixture { store, types, core, frontend: Frontend::new() }
    }

    fn parse(fx: &mut Fixture, src: &str) -> TermId {
        fx.frontend
            .parse(src, &mut fx.store, &mut fx.types, &fx.core)
            .unwrap_or_else(|e| panic!("parse '{}': {:?}", src, e))
    }

    #[test]
    fn proves_modus_ponens_chain() {
        let mut fx = fixture();
        let axioms = vec![
            parse(&mut fx, "Man(Socrates)"),
            parse(&mut fx, "forall ?x. Man(?x) => Mortal(?x)"),
        ];
        let goal = parse(&mut fx, "Mortal(Socrates)");
        let po = prove(
            &mut fx.store,
            &mut fx.types,
            &fx.core,
            &axioms,
            goal,
            ResourceLimits::default(),
            CancelFlag::new(),
        );
        assert_eq!(po.status, ProofStatus::Proved);
        assert!(po.goal_achieved);
        assert_eq!(po.used_axioms.len(), 2);
    }

    #[test]
    fn refutation_derives_empty_clause_in_two_steps() {
        let mut fx = fixture();
        let axioms = vec![
            parse(&mut fx, "P(a)"),
            parse(&mut fx, "forall ?x. not P(?x) or Q(?x)"),
            parse(&mut fx, "not Q(a)"),
        ];
        let po = refute(
            &mut fx.store,
            &mut fx.types,
            &fx.core,
            &axioms,
            ResourceLimits::default(),
            CancelFlag::new(),
        );
        assert_eq!(po.status, ProofStatus::Contradiction);
        let resolutions =
            po.proof_steps.iter().filter(|s| s.rule == "resolve").count();
        assert_eq!(resolutions, 2);
    }

    #[test]
    fn unprovable_goal_saturates_to_unknown() {
        let mut fx = fixture();
        let axioms = vec![parse(&mut fx, "Man(Socrates)")];
        let goal = parse(&mut fx, "Mortal(Socrates)");
        let po = prove(
            &mut fx.store,
            &mut fx.types,
            &fx.core,
            &axioms,
            goal,
            ResourceLimits::default(),
            CancelFlag::new(),
        );
        assert_eq!(po.status, ProofStatus::Unknown);
        assert!(!po.goal_achieved);
    }

    #[test]
    fn non_ground_goal_reports_answer_bindings() {
        let mut fx = fixture();
        let axioms = vec![
            parse(&mut fx, "Man(Socrates)"),
            parse(&mut fx, "forall ?x. Man(?x) => Mortal(?x)"),
        ];
        let goal = parse(&mut fx, "Mortal(?who)");
        let po = prove(
            &mut fx.store,
            &mut fx.types,
            &fx.core,
            &axioms,
            goal,
            ResourceLimits::default(),
            CancelFlag::new(),
        );
        assert_eq!(po.status, ProofStatus::Proved);
        let socrates = parse(&mut fx, "Socrates");
        assert!(po.bindings.values().any(|t| *t == socrates));
    }

    #[test]
    fn proof_steps_are_topological() {
        let mut fx = fixture();
        let axioms = vec![
            parse(&mut fx, "P(a)"),
            parse(&mut fx, "forall ?x. P(?x) => Q(?x)"),
        ];
        let goal = parse(&mut fx, "Q(a)");
        let po = prove(
            &mut fx.store,
            &mut fx.types,
            &fx.core,
            &axioms,
            goal,
            ResourceLimits::default(),
            CancelFlag::new(),
        );
        assert_eq!(po.status, ProofStatus::Proved);
        for (i, step) in po.proof_steps.iter().enumerate() {
            for p in &step.premises {
                assert!(*p < i);
            }
        }
    }

    #[test]
    fn exhausted_node_budget_reports_dimension() {
        let mut fx = fixture();
        // A pair of clauses that resolve forever: P(f(?x)) => P(?x) style
        // growth against a seed fact.
        let axioms = vec![
            parse(&mut fx, "P(a)"),
            parse(&mut fx, "forall ?x. P(?x) => P(f(?x))"),
        ];
        let goal = parse(&mut fx, "Q(b)");
        let po = prove(
            &mut fx.store,
            &mut fx.types,
            &fx.core,
            &axioms,
            goal,
            ResourceLimits { nodes: 16, time_ms: 2_000, ..Default::default() },
            CancelFlag::new(),
        );
        assert!(matches!(
            po.status,
            ProofStatus::ResourceExhausted(_) | ProofStatus::Unknown
        ));
    }
}
