//! The inference coordinator: goal analysis, strategy selection, resource
//! governance, and result merging.
//!
//! A goal is classified by its syntactic features: a modal operator sends
//! it to the tableau, a registered theory symbol to the matching bridge, a
//! defeasible-semantics hint to argumentation, anything else to
//! resolution. Caller hints override the analysis. Before any prover runs,
//! a shallow store pass answers goals that are a visible fact or one
//! rule application away — that path produces the classic
//! `rule-instantiation` / `modus-ponens` step pair.
//!
//! Fallback: when the selected prover replies `Unknown` or
//! `StrategyFailed` and wall-clock budget remains, the coordinator tries
//! the next strategy from a fixed order, each prover at most once per
//! call. Logical failure is always a value inside the returned
//! [`ProofObject`]; `submit_goal` returns `Err` only on precondition
//! violations (ill-typed goal, unknown context).

use log::{debug, info};
use noesis_kernel::{
    check, substitute, CoreTypes, Subst, TermData, TermId, TermStore, TypeEnv, TypeError,
    TypeTable,
};
use noesis_store::{match_terms, Binding, CtxId, KnowledgeStore, StoreError};
use rustc_hash::FxHashSet;
use std::fmt;

use crate::argumentation::{self, DefeasibleRule, Semantics};
use crate::bridge::{BridgeOptions, TheoryBridge, TheoryVerdict};
use crate::limits::{Budget, CancelFlag, ResourceLimits};
use crate::proof::{EngineKind, ProofObject, ProofStatus};
use crate::resolution;
use crate::tableau::{self, ModalSystem};

/// A prover the coordinator can dispatch to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    Resolution,
    Tableau,
    Argumentation,
    Bridge(String),
}

/// Caller-supplied overrides.
#[derive(Debug, Clone, Default)]
pub struct Hints {
    /// Forces a strategy instead of goal analysis.
    pub strategy: Option<Strategy>,
    /// Modal system for the tableau (default K).
    pub modal_system: Option<ModalSystem>,
    /// Requests defeasible closure under these semantics.
    pub semantics: Option<Semantics>,
}

/// Precondition violations. Logical failure never lands here.
#[derive(Debug)]
pub enum EngineError {
    IllTypedGoal(TypeError),
    UnknownContext(String),
    InvariantViolation(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::IllTypedGoal(e) => write!(f, "ill-typed goal: {}", e),
            EngineError::UnknownContext(name) => write!(f, "unknown context '{}'", name),
            EngineError::InvariantViolation(msg) => write!(f, "invariant violated: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UnknownContext(name) => EngineError::UnknownContext(name),
            StoreError::Type(t) => EngineError::IllTypedGoal(t),
            other => EngineError::InvariantViolation(other.to_string()),
        }
    }
}

/// Dispatches goals to provers under a shared resource budget.
pub struct Coordinator {
    bridges: Vec<Box<dyn TheoryBridge>>,
    defeasible: Vec<DefeasibleRule>,
    default_system: ModalSystem,
}

impl Coordinator {
    pub fn new() -> Self {
        Coordinator {
            bridges: Vec::new(),
            defeasible: Vec::new(),
            default_system: ModalSystem::K,
        }
    }

    /// Registers an external theory bridge.
    pub fn register_bridge(&mut self, bridge: Box<dyn TheoryBridge>) {
        self.bridges.push(bridge);
    }

    /// Registers a defeasible rule for argumentation queries.
    pub fn add_defeasible_rule(&mut self, rule: DefeasibleRule) {
        self.defeasible.push(rule);
    }

    /// Sets the modal system used when no hint supplies one.
    pub fn set_default_modal_system(&mut self, system: ModalSystem) {
        self.default_system = system;
    }

    /// Proves `goal` against the listed contexts.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_goal(
        &self,
        terms: &mut TermStore,
        types: &mut TypeTable,
        core: &CoreTypes,
        kb: &KnowledgeStore,
        goal: TermId,
        ctxs: &[CtxId],
        hints: &Hints,
        limits: Option<ResourceLimits>,
    ) -> Result<ProofObject, EngineError> {
        // Preconditions: well-typed goal, known contexts.
        let mut env = TypeEnv::new();
        check(terms, types, core, &mut env, goal, &core.prop())
            .map_err(EngineError::IllTypedGoal)?;
        let mut axioms: Vec<TermId> = Vec::new();
        let mut seen = FxHashSet::default();
        for ctx in ctxs {
            for stmt in kb.visible_statements(*ctx)? {
                if seen.insert(terms.canon(stmt)) {
                    axioms.push(stmt);
                }
            }
        }

        let limits = limits.unwrap_or_default();
        let overall = Budget::with_cancel(limits, CancelFlag::new());

        // Shallow store pass first: a visible fact or one rule application.
        if hints.strategy.is_none() {
            if let Some(po) = self.store_pass(terms, core, kb, goal, ctxs, &axioms) {
                return Ok(po);
            }
        }

        let selected = match &hints.strategy {
            Some(s) => s.clone(),
            None => self.analyze(terms, goal, hints),
        };
        info!("coordinator: strategy {:?}", selected);

        let mut tried: Vec<Strategy> = Vec::new();
        let mut order: Vec<Strategy> = vec![selected];
        for fallback in [Strategy::Resolution, Strategy::Tableau] {
            if !order.contains(&fallback) {
                order.push(fallback);
            }
        }

        let mut last = ProofObject::with_status(
            EngineKind::KnowledgeStore,
            ProofStatus::StrategyFailed,
            "no strategy applied",
        );
        for strategy in order {
            if tried.contains(&strategy) {
                continue;
            }
            tried.push(strategy.clone());
            let remaining = overall.remaining_ms();
            if remaining == 0 {
                last.status = ProofStatus::ResourceExhausted(crate::proof::ResourceDimension::Time);
                last.message = "budget exhausted before fallback".to_string();
                break;
            }
            let slice = ResourceLimits { time_ms: remaining, ..limits };
            let po = self.run_strategy(
                terms, types, core, &strategy, goal, &axioms, hints, slice,
            );
            match po.status {
                ProofStatus::Unknown | ProofStatus::StrategyFailed => {
                    debug!("coordinator: {:?} returned {:?}, falling back", strategy, po.status);
                    last = po;
                }
                _ => return Ok(po),
            }
        }
        Ok(last)
    }

    /// Refutation mode: try to derive falsum from the contexts' contents.
    pub fn check_consistency(
        &self,
        terms: &mut TermStore,
        types: &mut TypeTable,
        core: &CoreTypes,
        kb: &KnowledgeStore,
        ctxs: &[CtxId],
        limits: Option<ResourceLimits>,
    ) -> Result<ProofObject, EngineError> {
        let mut axioms: Vec<TermId> = Vec::new();
        let mut seen = FxHashSet::default();
        for ctx in ctxs {
            for stmt in kb.visible_statements(*ctx)? {
                if seen.insert(terms.canon(stmt)) && !contains_modal(terms, stmt) {
                    axioms.push(stmt);
                }
            }
        }
        Ok(resolution::refute(
            terms,
            types,
            core,
            &axioms,
            limits.unwrap_or_default(),
            CancelFlag::new(),
        ))
    }

    /// Answers goals one store lookup or one rule application away.
    fn store_pass(
        &self,
        terms: &mut TermStore,
        core: &CoreTypes,
        kb: &KnowledgeStore,
        goal: TermId,
        ctxs: &[CtxId],
        axioms: &[TermId],
    ) -> Option<ProofObject> {
        // Direct hit.
        if kb.exists(terms, goal, ctxs) {
            let mut po = ProofObject::proved(EngineKind::KnowledgeStore, goal);
            po.push_step("axiom", vec![], goal);
            po.used_axioms.insert(goal);
            return Some(po);
        }

        // One rule application: match the goal against a stored rule head
        // and require the instantiated body to be visible.
        for stmt in axioms {
            let (bound_rule, body, head) = match split_rule_parts(terms, *stmt) {
                Some(parts) => parts,
                None => continue,
            };
            let mut bindings = Binding::default();
            if !match_terms(terms, &mut bindings, goal, head) {
                continue;
            }
            let subst: Subst = bindings.iter().map(|(v, t)| (*v, *t)).collect();
            let mut premises_ok = true;
            let mut body_facts = Vec::new();
            for lit in &body {
                let instantiated = substitute(terms, *lit, &subst);
                if !noesis_kernel::free_variables(terms, instantiated).is_empty()
                    || !kb.exists(terms, instantiated, ctxs)
                {
                    premises_ok = false;
                    break;
                }
                body_facts.push(instantiated);
            }
            if !premises_ok {
                continue;
            }

            let instantiated_rule = substitute(terms, bound_rule, &subst);
            let conclusion = substitute(terms, goal, &subst);
            let mut po = ProofObject::proved(EngineKind::KnowledgeStore, conclusion);
            let mut fact_steps = Vec::new();
            for fact in &body_facts {
                fact_steps.push(po.push_step("axiom", vec![], *fact));
                po.used_axioms.insert(*fact);
            }
            let inst = po.push_step("rule-instantiation", vec![], instantiated_rule);
            let mut premises = vec![inst];
            premises.extend(fact_steps);
            po.push_step("modus-ponens", premises, conclusion);
            po.used_axioms.insert(*stmt);
            po.bindings = bindings.into_iter().collect();
            po.message = "proved by shallow rule application".to_string();
            return Some(po);
        }
        None
    }

    fn analyze(&self, terms: &TermStore, goal: TermId, hints: &Hints) -> Strategy {
        if contains_modal(terms, goal) {
            return Strategy::Tableau;
        }
        if hints.semantics.is_some() {
            return Strategy::Argumentation;
        }
        let symbols = constant_names(terms, goal);
        for bridge in &self.bridges {
            if bridge.symbols().iter().any(|s| symbols.contains(*s)) {
                return Strategy::Bridge(bridge.theory_tag().to_string());
            }
        }
        Strategy::Resolution
    }

    #[allow(clippy::too_many_arguments)]
    fn run_strategy(
        &self,
        terms: &mut TermStore,
        types: &mut TypeTable,
        core: &CoreTypes,
        strategy: &Strategy,
        goal: TermId,
        axioms: &[TermId],
        hints: &Hints,
        limits: ResourceLimits,
    ) -> ProofObject {
        match strategy {
            Strategy::Resolution => {
                // First-order only: modal statements are outside this
                // prover's language.
                let fo_axioms: Vec<TermId> = axioms
                    .iter()
                    .copied()
                    .filter(|a| !contains_modal(terms, *a))
                    .collect();
                if contains_modal(terms, goal) {
                    return ProofObject::with_status(
                        EngineKind::Resolution,
                        ProofStatus::StrategyFailed,
                        "resolution does not handle modal goals",
                    );
                }
                resolution::prove(terms, types, core, &fo_axioms, goal, limits, CancelFlag::new())
            }
            Strategy::Tableau => {
                let system = hints.modal_system.unwrap_or(self.default_system);
                // Modal axioms hold at the evaluation world; validity of
                // axioms ⇒ goal is local consequence there.
                let modal_axioms: Vec<TermId> = axioms
                    .iter()
                    .copied()
                    .filter(|a| contains_modal(terms, *a))
                    .collect();
                let formula = if modal_axioms.is_empty() {
                    goal
                } else {
                    let conj = if modal_axioms.len() == 1 {
                        modal_axioms[0]
                    } else {
                        terms.connective(
                            noesis_kernel::ConnectiveKind::And,
                            modal_axioms.clone(),
                            core.prop(),
                        )
                    };
                    terms.connective(
                        noesis_kernel::ConnectiveKind::Implies,
                        vec![conj, goal],
                        core.prop(),
                    )
                };
                let mut po =
                    tableau::prove_valid(terms, formula, system, limits, CancelFlag::new());
                if po.goal_achieved {
                    po.conclusion = Some(goal);
                    po.used_axioms.extend(modal_axioms);
                }
                po
            }
            Strategy::Argumentation => {
                let semantics = hints.semantics.unwrap_or(Semantics::Grounded);
                let justified = argumentation::justified_beliefs(
                    terms,
                    core,
                    axioms,
                    &self.defeasible,
                    semantics,
                    limits,
                );
                let goal_canon = terms.canon(goal);
                let negated = noesis_store::negate(terms, core, goal);
                let negated_canon = terms.canon(negated);
                let canon_set: FxHashSet<TermId> =
                    justified.iter().map(|t| terms.canon(*t)).collect();
                if canon_set.contains(&goal_canon) {
                    let mut po = ProofObject::proved(EngineKind::Argumentation, goal);
                    po.push_step("defeasible-derivation", vec![], goal);
                    po.message = format!("justified under {:?} semantics", semantics);
                    po
                } else if canon_set.contains(&negated_canon) {
                    let mut po = ProofObject::with_status(
                        EngineKind::Argumentation,
                        ProofStatus::Disproved,
                        format!("negation justified under {:?} semantics", semantics),
                    );
                    po.push_step("defeasible-derivation", vec![], negated);
                    po.conclusion = Some(negated);
                    po
                } else {
                    ProofObject::with_status(
                        EngineKind::Argumentation,
                        ProofStatus::Unknown,
                        "neither the goal nor its negation is justified",
                    )
                }
            }
            Strategy::Bridge(tag) => {
                let bridge = match self.bridges.iter().find(|b| b.theory_tag() == *tag) {
                    Some(b) => b,
                    None => {
                        return ProofObject::with_status(
                            EngineKind::TheoryBridge,
                            ProofStatus::StrategyFailed,
                            format!("no bridge registered for theory '{}'", tag),
                        )
                    }
                };
                // Validity via unsatisfiability of the negation; the
                // verdict becomes a single proof step.
                let negated = noesis_store::negate(terms, core, goal);
                let options = BridgeOptions { timeout_ms: limits.time_ms };
                match bridge.check_sat(terms, negated, axioms, &options) {
                    TheoryVerdict::Unsat { core: unsat_core } => {
                        let mut po = ProofObject::proved(EngineKind::TheoryBridge, goal);
                        po.push_step(format!("theory({})", tag), vec![], goal);
                        po.used_axioms.extend(unsat_core);
                        po.message = format!("theory '{}' refuted the negation", tag);
                        po
                    }
                    TheoryVerdict::Sat { model } => {
                        let mut po = ProofObject::with_status(
                            EngineKind::TheoryBridge,
                            ProofStatus::Disproved,
                            match model {
                                Some(m) => format!("countermodel from theory '{}': {}", tag, m),
                                None => format!("theory '{}' found the negation satisfiable", tag),
                            },
                        );
                        po.push_step(format!("theory({})", tag), vec![], negated);
                        po
                    }
                    TheoryVerdict::Unknown { reason } => ProofObject::with_status(
                        EngineKind::TheoryBridge,
                        ProofStatus::Unknown,
                        format!("theory '{}' answered unknown: {}", tag, reason),
                    ),
                }
            }
        }
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Does the term contain a modal operator anywhere?
pub fn contains_modal(terms: &TermStore, t: TermId) -> bool {
    if matches!(terms.data(t), TermData::Modal { .. }) {
        return true;
    }
    terms.children(t).into_iter().any(|c| contains_modal(terms, c))
}

fn constant_names(terms: &TermStore, t: TermId) -> FxHashSet<String> {
    let mut out = FxHashSet::default();
    collect_constants(terms, t, &mut out);
    out
}

fn collect_constants(terms: &TermStore, t: TermId, out: &mut FxHashSet<String>) {
    if let TermData::Constant { name, .. } = terms.data(t) {
        out.insert(terms.interner().resolve(*name).to_string());
    }
    for c in terms.children(t) {
        collect_constants(terms, c, out);
    }
}

/// Splits a stored rule into (whole implication, body literals, head).
fn split_rule_parts(
    terms: &TermStore,
    stmt: TermId,
) -> Option<(TermId, Vec<TermId>, TermId)> {
    use noesis_kernel::{ConnectiveKind, QuantKind};
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
                TermData::Connective { kind: ConnectiveKind::And, operands: conj } => conj.clone(),
                _ => vec![operands[0]],
            };
            Some((implication, body, operands[1]))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::testing::FixedVerdictBridge;
    use noesis_kernel::prelude;
    use noesis_language::Frontend;
    use noesis_store::ContextKind;

    struct Fixture {
        terms: TermStore,
        types: TypeTable,
        core: CoreTypes,
        frontend: Frontend,
        kb: KnowledgeStore,
        coordinator: Coordinator,
    }

    fn fixture() -> Fixture {
        let mut terms = TermStore::new();
        let mut types = TypeTable::new();
        let core = prelude::install(&mut types, &mut terms).unwrap();
        Fixture {
            terms,
            types,
            core,
            frontend: Frontend::new(),
            kb: KnowledgeStore::new(),
            coordinator: Coordinator::new(),
        }
    }

    fn parse(fx: &mut Fixture, src: &str) -> TermId {
        fx.frontend
            .parse(src, &mut fx.terms, &mut fx.types, &fx.core)
            .unwrap_or_else(|e| panic!("parse '{}': {:?}", src, e))
    }

    fn add(fx: &mut Fixture, src: &str, ctx: CtxId) {
        let t = parse(fx, src);
        fx.kb.add(&mut fx.terms, &fx.types, &fx.core, t, ctx).unwrap();
    }

    #[test]
    fn socrates_is_mortal_by_shallow_modus_ponens() {
        let mut fx = fixture();
        let ctx = fx.kb.create_context("TRUTHS", None, ContextKind::Standard).unwrap();
        add(&mut fx, "Man(Socrates)", ctx);
        add(&mut fx, "forall ?x. Man(?x) => Mortal(?x)", ctx);
        let goal = parse(&mut fx, "Mortal(Socrates)");

        let po = fx
            .coordinator
            .submit_goal(
                &mut fx.terms,
                &mut fx.types,
                &fx.core,
                &fx.kb,
                goal,
                &[ctx],
                &Hints::default(),
                None,
            )
            .unwrap();
        assert!(po.goal_achieved);
        assert_eq!(po.status, ProofStatus::Proved);
        let rules: Vec<&str> = po.proof_steps.iter().map(|s| s.rule.as_str()).collect();
        assert!(rules.contains(&"rule-instantiation"));
        assert!(rules.contains(&"modus-ponens"));
        // The rule variable was instantiated to Socrates.
        let socrates = parse(&mut fx, "Socrates");
        assert!(po.bindings.values().any(|t| *t == socrates));
    }

    #[test]
    fn modal_goal_routes_to_tableau() {
        let mut fx = fixture();
        let ctx = fx.kb.create_context("TRUTHS", None, ContextKind::Standard).unwrap();
        let goal = parse(&mut fx, "□(P => Q) => (□P => □Q)");
        let po = fx
            .coordinator
            .submit_goal(
                &mut fx.terms,
                &mut fx.types,
                &fx.core,
                &fx.kb,
                goal,
                &[ctx],
                &Hints::default(),
                None,
            )
            .unwrap();
        assert_eq!(po.engine, EngineKind::ModalTableau);
        assert_eq!(po.status, ProofStatus::Proved);
    }

    #[test]
    fn deep_chain_falls_through_to_resolution() {
        let mut fx = fixture();
        let ctx = fx.kb.create_context("TRUTHS", None, ContextKind::Standard).unwrap();
        add(&mut fx, "P(a)", ctx);
        add(&mut fx, "forall ?x. P(?x) => Q(?x)", ctx);
        add(&mut fx, "forall ?x. Q(?x) => R(?x)", ctx);
        // Two rule applications deep: beyond the store pass.
        let goal = parse(&mut fx, "R(a)");
        let po = fx
            .coordinator
            .submit_goal(
                &mut fx.terms,
                &mut fx.types,
                &fx.core,
                &fx.kb,
                goal,
                &[ctx],
                &Hints::default(),
                None,
            )
            .unwrap();
        assert_eq!(po.engine, EngineKind::Resolution);
        assert_eq!(po.status, ProofStatus::Proved);
    }

    #[test]
    fn ill_typed_goal_is_a_precondition_error() {
        let mut fx = fixture();
        let ctx = fx.kb.create_context("TRUTHS", None, ContextKind::Standard).unwrap();
        add(&mut fx, "Man(Socrates)", ctx);
        // A bare entity is not a formula.
        let goal = parse(&mut fx, "Socrates");
        let err = fx
            .coordinator
            .submit_goal(
                &mut fx.terms,
                &mut fx.types,
                &fx.core,
                &fx.kb,
                goal,
                &[ctx],
                &Hints::default(),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::IllTypedGoal(_)));
    }

    #[test]
    fn theory_symbols_route_to_bridge() {
        let mut fx = fixture();
        let ctx = fx.kb.create_context("TRUTHS", None, ContextKind::Standard).unwrap();
        fx.coordinator.register_bridge(Box::new(FixedVerdictBridge {
            tag: "arithmetic".to_string(),
            trigger_symbols: vec!["plus".to_string()],
            verdict: || TheoryVerdict::Unsat { core: Vec::new() },
        }));
        let goal = parse(&mut fx, "Equal(plus(One, One), Two)");
        let po = fx
            .coordinator
            .submit_goal(
                &mut fx.terms,
                &mut fx.types,
                &fx.core,
                &fx.kb,
                goal,
                &[ctx],
                &Hints::default(),
                None,
            )
            .unwrap();
        assert_eq!(po.engine, EngineKind::TheoryBridge);
        assert_eq!(po.status, ProofStatus::Proved);
    }

    #[test]
    fn consistency_check_finds_contradiction() {
        let mut fx = fixture();
        let ctx = fx.kb.create_context("TRUTHS", None, ContextKind::Standard).unwrap();
        add(&mut fx, "P(a)", ctx);
        add(&mut fx, "forall ?x. not P(?x) or Q(?x)", ctx);
        add(&mut fx, "not Q(a)", ctx);
        let po = fx
            .coordinator
            .check_consistency(&mut fx.terms, &mut fx.types, &fx.core, &fx.kb, &[ctx], None)
            .unwrap();
        assert_eq!(po.status, ProofStatus::Contradiction);
    }

    #[test]
    fn defeasible_hint_routes_to_argumentation() {
        let mut fx = fixture();
        let ctx = fx.kb.create_context("BELIEFS/birds", None, ContextKind::Standard).unwrap();
        add(&mut fx, "Bird(Tweety)", ctx);
        add(&mut fx, "Penguin(Tweety)", ctx);
        add(&mut fx, "forall ?x. Penguin(?x) => not Flies(?x)", ctx);
        let body = parse(&mut fx, "Bird(?b)");
        let head = parse(&mut fx, "Flies(?b)");
        fx.coordinator.add_defeasible_rule(DefeasibleRule {
            name: None,
            body: vec![body],
            head,
            priority: 0,
        });

        let hints = Hints { semantics: Some(Semantics::Grounded), ..Default::default() };
        let goal = parse(&mut fx, "Flies(Tweety)");
        let po = fx
            .coordinator
            .submit_goal(
                &mut fx.terms,
                &mut fx.types,
                &fx.core,
                &fx.kb,
                goal,
                &[ctx],
                &Hints { strategy: Some(Strategy::Argumentation), ..hints },
                None,
            )
            .unwrap();
        assert_eq!(po.engine, EngineKind::Argumentation);
        assert_eq!(po.status, ProofStatus::Disproved);
    }

    #[test]
    fn unknown_context_is_a_precondition_error() {
        let mut fx = fixture();
        let goal = parse(&mut fx, "P(a)");
        let err = fx
            .coordinator
            .submit_goal(
                &mut fx.terms,
                &mut fx.types,
                &fx.core,
                &fx.kb,
                goal,
                &[CtxId(99)],
                &Hints::default(),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownContext(_)));
    }
}
