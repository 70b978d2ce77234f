//! Labelled modal tableau over K, T, B, S4, S5.
//!
//! Validity of φ is checked by building a tableau for ¬φ: labelled
//! formulas `w:ψ` live on branches together with an accessibility relation
//! per modal family (alethic, and one relation per epistemic/doxastic
//! agent). Alpha rules extend the branch, beta rules split it, `◇`
//! introduces worlds, `□` propagates along current and future edges.
//!
//! Frame conditions by system: K none; T reflexive; B reflexive+symmetric;
//! S4 reflexive+transitive; S5 reflexive+symmetric+transitive. Edge
//! insertion closes the relation incrementally and re-fires recorded box
//! formulas along every new edge.
//!
//! For S4/S5, a `◇` expansion first looks for an existing world already
//! carrying everything the fresh world would start with and reuses it
//! (world subsumption); this blocks loops and guarantees termination on
//! propositionally bounded inputs.
//!
//! A branch closes on `w:ψ` and `w:¬ψ`. All branches closed proves the
//! original formula; a saturated open branch is a countermodel and the
//! reply is `Disproved`.

use log::debug;
use noesis_kernel::{ConnectiveKind, ModalOp, TermData, TermId, TermStore};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::limits::{Budget, CancelFlag, ResourceLimits};
use crate::proof::{EngineKind, ProofObject, ProofStatus};

/// The modal system fixing the frame conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalSystem {
    K,
    T,
    B,
    S4,
    S5,
}

impl ModalSystem {
    fn reflexive(self) -> bool {
        !matches!(self, ModalSystem::K)
    }

    fn symmetric(self) -> bool {
        matches!(self, ModalSystem::B | ModalSystem::S5)
    }

    fn transitive(self) -> bool {
        matches!(self, ModalSystem::S4 | ModalSystem::S5)
    }

    fn blocks(self) -> bool {
        matches!(self, ModalSystem::S4 | ModalSystem::S5)
    }
}

/// Which accessibility relation an operator talks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RelKey {
    family: Family,
    agent: Option<TermId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Family {
    Alethic,
    Epistemic,
    Doxastic,
}

/// Tableau-internal formula view with negation pushed to atoms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Mf {
    Atom { positive: bool, term: TermId },
    And(Vec<Mf>),
    Or(Vec<Mf>),
    Box { key: RelKey, body: std::boxed::Box<Mf> },
    Dia { key: RelKey, body: std::boxed::Box<Mf> },
}

fn rel_key(op: ModalOp, index: Option<TermId>) -> RelKey {
    match op {
        ModalOp::Necessity | ModalOp::Possibility => RelKey { family: Family::Alethic, agent: index },
        ModalOp::Knows => RelKey { family: Family::Epistemic, agent: index },
        ModalOp::Believes => RelKey { family: Family::Doxastic, agent: index },
    }
}

/// Converts a kernel formula into the tableau view. First-order
/// subformulas (quantifiers, applications) are opaque atoms here; the
/// coordinator routes goals needing quantifier reasoning elsewhere.
fn to_mf(store: &TermStore, t: TermId, positive: bool) -> Mf {
    match store.data(t) {
        TermData::Connective { kind: ConnectiveKind::Not, operands } => {
            to_mf(store, operands[0], !positive)
        }
        TermData::Connective { kind: ConnectiveKind::And, operands } => {
            let parts: Vec<Mf> = operands.iter().map(|o| to_mf(store, *o, positive)).collect();
            if positive {
                Mf::And(parts)
            } else {
                Mf::Or(parts)
            }
        }
        TermData::Connective { kind: ConnectiveKind::Or, operands } => {
            let parts: Vec<Mf> = operands.iter().map(|o| to_mf(store, *o, positive)).collect();
            if positive {
                Mf::Or(parts)
            } else {
                Mf::And(parts)
            }
        }
        TermData::Connective { kind: ConnectiveKind::Implies, operands } => {
            let (a, b) = (operands[0], operands[1]);
            if positive {
                Mf::Or(vec![to_mf(store, a, false), to_mf(store, b, true)])
            } else {
                Mf::And(vec![to_mf(store, a, true), to_mf(store, b, false)])
            }
        }
        TermData::Connective { kind: ConnectiveKind::Equiv, operands } => {
            let (a, b) = (operands[0], operands[1]);
            let forward = |pos: bool| {
                Mf::Or(vec![to_mf(store, a, !pos), to_mf(store, b, pos)])
            };
            if positive {
                Mf::And(vec![forward(true), Mf::Or(vec![to_mf(store, b, false), to_mf(store, a, true)])])
            } else {
                // ¬(a ≡ b): one true, the other false.
                Mf::Or(vec![
                    Mf::And(vec![to_mf(store, a, true), to_mf(store, b, false)]),
                    Mf::And(vec![to_mf(store, a, false), to_mf(store, b, true)]),
                ])
            }
        }
        TermData::Modal { op, index, body } => {
            let key = rel_key(*op, *index);
            let box_like = matches!(op, ModalOp::Necessity | ModalOp::Knows | ModalOp::Believes);
            let inner = std::boxed::Box::new(to_mf(store, *body, positive));
            match (box_like, positive) {
                (true, true) | (false, false) => Mf::Box { key, body: inner },
                _ => Mf::Dia { key, body: inner },
            }
        }
        _ => Mf::Atom { positive, term: t },
    }
}

type World = u32;

#[derive(Clone)]
struct Branch {
    todo: Vec<(World, Mf)>,
    labels: FxHashMap<World, FxHashSet<Mf>>,
    pos: FxHashMap<World, FxHashSet<TermId>>,
    neg: FxHashMap<World, FxHashSet<TermId>>,
    boxes: FxHashMap<(World, RelKey), Vec<Mf>>,
    edges: FxHashSet<(RelKey, World, World)>,
    keys_seen: FxHashSet<RelKey>,
    worlds: Vec<World>,
    next_world: World,
}

impl Branch {
    fn new(root: Mf) -> Self {
        let mut b = Branch {
            todo: vec![(0, root)],
            labels: FxHashMap::default(),
            pos: FxHashMap::default(),
            neg: FxHashMap::default(),
            boxes: FxHashMap::default(),
            edges: FxHashSet::default(),
            keys_seen: FxHashSet::default(),
            worlds: vec![0],
            next_world: 1,
        };
        b.labels.insert(0, FxHashSet::default());
        b
    }

    /// Records that `f` has been processed at `world`. Returns `false` if
    /// it already was, so rules never re-fire for the same formula.
    fn note_fresh(&mut self, world: World, f: &Mf) -> bool {
        self.labels.entry(world).or_default().insert(f.clone())
    }

    /// Inserts an edge and closes the relation under the system's frame
    /// conditions. Returns every edge actually added.
    fn add_edge(
        &mut self,
        system: ModalSystem,
        key: RelKey,
        from: World,
        to: World,
    ) -> Vec<(RelKey, World, World)> {
        self.keys_seen.insert(key);
        let mut added = Vec::new();
        let mut pending = vec![(from, to)];
        while let Some((a, b)) = pending.pop() {
            if !self.edges.insert((key, a, b)) {
                continue;
            }
            added.push((key, a, b));
            if system.reflexive() {
                pending.push((a, a));
                pending.push((b, b));
            }
            if system.symmetric() {
                pending.push((b, a));
            }
            if system.transitive() {
                let edges: Vec<(World, World)> = self
                    .edges
                    .iter()
                    .filter(|(k, _, _)| *k == key)
                    .map(|(_, x, y)| (*x, *y))
                    .collect();
                for (x, y) in edges {
                    if y == a {
                        pending.push((x, b));
                    }
                    if x == b {
                        pending.push((a, y));
                    }
                }
            }
        }
        added
    }

    /// Re-fires recorded boxes along freshly added edges.
    fn refire(&mut self, added: &[(RelKey, World, World)]) {
        for (key, from, to) in added {
            if let Some(bodies) = self.boxes.get(&(*from, *key)) {
                for body in bodies.clone() {
                    self.todo.push((*to, body));
                }
            }
        }
    }

    /// The label set a fresh successor of `world` under `key` would start
    /// with, for world subsumption.
    fn successor_seed(&self, world: World, key: RelKey, body: &Mf) -> FxHashSet<Mf> {
        let mut seed = FxHashSet::default();
        seed.insert(body.clone());
        if let Some(bodies) = self.boxes.get(&(world, key)) {
            for b in bodies {
                seed.insert(b.clone());
            }
        }
        seed
    }
}

/// Proves validity of `formula` in the given modal system.
pub fn prove_valid(
    store: &mut TermStore,
    formula: TermId,
    system: ModalSystem,
    limits: ResourceLimits,
    cancel: CancelFlag,
) -> ProofObject {
    let mut budget = Budget::with_cancel(limits, cancel);
    // Tableau for the negation: closed everywhere means φ is valid.
    let root = to_mf(store, formula, false);
    debug!("tableau: system {:?}", system);

    let mut stack: Vec<Branch> = vec![Branch::new(root)];
    let mut closed_branches: Vec<(World, TermId)> = Vec::new();

    while let Some(mut branch) = stack.pop() {
        let mut closed = None;
        let mut forked = false;
        loop {
            if let Some(dim) = budget.tick() {
                let mut po = ProofObject::with_status(
                    EngineKind::ModalTableau,
                    ProofStatus::ResourceExhausted(dim),
                    "tableau budget exhausted",
                );
                po.time_ms = budget.elapsed_ms();
                po.record_resource("worlds", branch.next_world as u64);
                return po;
            }
            let (world, f) = match branch.todo.pop() {
                Some(item) => item,
                None => break,
            };
            if !branch.note_fresh(world, &f) {
                continue;
            }
            match f {
                Mf::Atom { positive, term } => {
                    let clashes = if positive {
                        branch.neg.get(&world).map_or(false, |s| s.contains(&term))
                    } else {
                        branch.pos.get(&world).map_or(false, |s| s.contains(&term))
                    };
                    if clashes {
                        closed = Some((world, term));
                        break;
                    }
                    if positive {
                        branch.pos.entry(world).or_default().insert(term);
                    } else {
                        branch.neg.entry(world).or_default().insert(term);
                    }
                }
                Mf::And(parts) => {
                    for p in parts {
                        branch.todo.push((world, p));
                    }
                }
                Mf::Or(parts) => {
                    // Beta: one branch per disjunct; the current branch is
                    // superseded by its forks.
                    for p in parts {
                        let mut fork = branch.clone();
                        fork.todo.push((world, p));
                        stack.push(fork);
                    }
                    forked = true;
                    break;
                }
                Mf::Box { key, body } => {
                    branch.boxes.entry((world, key)).or_default().push((*body).clone());
                    if system.reflexive() {
                        branch.todo.push((world, (*body).clone()));
                    }
                    let targets: Vec<World> = branch
                        .edges
                        .iter()
                        .filter(|(k, from, _)| *k == key && *from == world)
                        .map(|(_, _, to)| *to)
                        .collect();
                    for t in targets {
                        branch.todo.push((t, (*body).clone()));
                    }
                }
                Mf::Dia { key, body } => {
                    // World subsumption for the transitive systems: reuse a
                    // world already carrying the seed labels.
                    let seed = branch.successor_seed(world, key, &body);
                    let reuse = if system.blocks() {
                        branch
                            .worlds
                            .iter()
                            .copied()
                            .find(|w| {
                                branch
                                    .labels
                                    .get(w)
                                    .map_or(false, |ls| seed.iter().all(|s| ls.contains(s)))
                            })
                    } else {
                        None
                    };
                    match reuse {
                        Some(existing) => {
                            let added = branch.add_edge(system, key, world, existing);
                            branch.refire(&added);
                        }
                        None => {
                            let fresh = branch.next_world;
                            branch.next_world += 1;
                            branch.worlds.push(fresh);
                            branch.labels.insert(fresh, FxHashSet::default());
                            if let Some(dim) = budget.charge_nodes(1) {
                                let mut po = ProofObject::with_status(
                                    EngineKind::ModalTableau,
                                    ProofStatus::ResourceExhausted(dim),
                                    "world budget exhausted",
                                );
                                po.time_ms = budget.elapsed_ms();
                                return po;
                            }
                            let added = branch.add_edge(system, key, world, fresh);
                            branch.refire(&added);
                            branch.todo.push((fresh, (*body).clone()));
                        }
                    }
                }
            }
        }

        match closed {
            Some(clash) => closed_branches.push(clash),
            None if forked => {}
            None => {
                // Saturated open branch: countermodel found, the formula
                // is not valid.
                let mut po = ProofObject::with_status(
                    EngineKind::ModalTableau,
                    ProofStatus::Disproved,
                    describe_countermodel(store, &branch),
                );
                po.conclusion = Some(formula);
                po.time_ms = budget.elapsed_ms();
                po.record_resource("worlds", branch.next_world as u64);
                return po;
            }
        }
    }

    // Every branch closed.
    let mut po = ProofObject::proved(EngineKind::ModalTableau, formula);
    let negated = po.push_step("negate-goal", vec![], formula);
    let mut branch_steps = Vec::new();
    for (world, term) in &closed_branches {
        let s = po.push_step(format!("branch-closed(w{})", world), vec![negated], *term);
        branch_steps.push(s);
    }
    po.push_step("tableau-closed", branch_steps, formula);
    po.message = format!("valid: all {} branches closed", closed_branches.len());
    po.time_ms = budget.elapsed_ms();
    po.record_resource("branches", closed_branches.len() as u64);
    po.record_resource("steps", budget.steps());
    po
}

fn describe_countermodel(store: &TermStore, branch: &Branch) -> String {
    use std::fmt::Write;
    let mut out = String::from("countermodel: ");
    for w in &branch.worlds {
        let _ = write!(out, "w{} {{", w);
        if let Some(atoms) = branch.pos.get(w) {
            let mut first = true;
            for a in atoms {
                if !first {
                    out.push_str(", ");
                }
                first = false;
                let _ = write!(out, "{}", noesis_language_free_render(store, *a));
            }
        }
        out.push_str("} ");
    }
    let mut edges: Vec<&(RelKey, World, World)> = branch.edges.iter().collect();
    edges.sort_by_key(|(_, a, b)| (*a, *b));
    for (_, a, b) in edges {
        let _ = write!(out, "w{}->w{} ", a, b);
    }
    out
}

/// Minimal rendering for countermodel messages (the engine crate does not
/// depend on the language crate's printer).
fn noesis_language_free_render(store: &TermStore, t: TermId) -> String {
    match store.data(t) {
        TermData::Constant { name, .. } => store.interner().resolve(*name).to_string(),
        TermData::Variable { name, .. } => format!("?{}", store.interner().resolve(*name)),
        TermData::Application { operator, arguments } => {
            let args: Vec<String> = arguments
                .iter()
                .map(|a| noesis_language_free_render(store, *a))
                .collect();
            format!(
                "{}({})",
                noesis_language_free_render(store, *operator),
                args.join(", ")
            )
        }
        _ => format!("<{}>", t.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noesis_kernel::{prelude, CoreTypes, TypeTable};
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

    fn prove(fx: &mut Fixture, src: &str, system: ModalSystem) -> ProofObject {
        let t = fx
            .frontend
            .parse(src, &mut fx.store, &mut fx.types, &fx.core)
            .unwrap_or_else(|e| panic!("parse '{}': {:?}", src, e));
        prove_valid(
            &mut fx.store,
            t,
            system,
            ResourceLimits::default(),
            CancelFlag::new(),
        )
    }

    #[test]
    fn k_axiom_is_valid_in_k() {
        let mut fx = fixture();
        let po = prove(&mut fx, "□(P => Q) => (□P => □Q)", ModalSystem::K);
        assert_eq!(po.status, ProofStatus::Proved);
        assert!(po.goal_achieved);
    }

    #[test]
    fn t_axiom_needs_reflexivity() {
        let mut fx = fixture();
        // □P ⇒ P is valid in T but not in K.
        let po_t = prove(&mut fx, "□P => P", ModalSystem::T);
        assert_eq!(po_t.status, ProofStatus::Proved);
        let po_k = prove(&mut fx, "□P => P", ModalSystem::K);
        assert_eq!(po_k.status, ProofStatus::Disproved);
    }

    #[test]
    fn four_axiom_needs_transitivity() {
        let mut fx = fixture();
        let po_s4 = prove(&mut fx, "□P => □□P", ModalSystem::S4);
        assert_eq!(po_s4.status, ProofStatus::Proved);
        let po_t = prove(&mut fx, "□P => □□P", ModalSystem::T);
        assert_eq!(po_t.status, ProofStatus::Disproved);
    }

    #[test]
    fn five_axiom_holds_only_in_s5() {
        let mut fx = fixture();
        let po_s5 = prove(&mut fx, "◇P => □◇P", ModalSystem::S5);
        assert_eq!(po_s5.status, ProofStatus::Proved);
        let po_s4 = prove(&mut fx, "◇P => □◇P", ModalSystem::S4);
        assert_eq!(po_s4.status, ProofStatus::Disproved);
    }

    #[test]
    fn invalid_formula_yields_countermodel() {
        let mut fx = fixture();
        let po = prove(&mut fx, "□(P or Q) => □P", ModalSystem::K);
        assert_eq!(po.status, ProofStatus::Disproved);
        assert!(po.message.contains("countermodel"));
    }

    #[test]
    fn s5_terminates_on_nested_modalities() {
        let mut fx = fixture();
        // Deep alternation that would loop without world subsumption.
        let po = prove(&mut fx, "◇□◇□◇P => ◇P", ModalSystem::S5);
        // Termination is the point; either verdict must arrive in budget.
        assert!(!matches!(po.status, ProofStatus::ResourceExhausted(_)));
    }

    #[test]
    fn epistemic_operators_use_their_own_relation() {
        let mut fx = fixture();
        // K_alice P ⇒ P is the knowledge axiom; valid with reflexivity.
        let po = prove(&mut fx, "K_alice P => P", ModalSystem::T);
        assert_eq!(po.status, ProofStatus::Proved);
        // Knowledge of alice says nothing about bob.
        let po2 = prove(&mut fx, "K_alice P => K_bob P", ModalSystem::T);
        assert_eq!(po2.status, ProofStatus::Disproved);
    }
}
