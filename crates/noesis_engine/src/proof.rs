//! The proof object: the single reply type of every prover.
//!
//! A [`ProofObject`] is a value, never an exception: logical failure
//! (`Disproved`, `Unknown`) and resource exhaustion travel inside it. The
//! derivation is an ordered DAG of [`ProofStep`]s in topological order from
//! axioms to conclusion; each step's premises refer to earlier steps by
//! index, so cycles cannot be constructed.

use noesis_kernel::{TermId, VarId};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

/// Which resource dimension ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResourceDimension {
    Time,
    Depth,
    Nodes,
    Memory,
}

/// Outcome of a proof attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProofStatus {
    /// The goal holds; `bindings` carries the answer substitution.
    Proved,
    /// The goal was refuted; the steps derive a countermodel or refutation.
    Disproved,
    /// The strategy finished without an answer either way.
    Unknown,
    /// A resource budget ran out; the dimension is named.
    ResourceExhausted(ResourceDimension),
    /// The premises themselves derive falsum.
    Contradiction,
    /// The selected strategy does not apply to this goal.
    StrategyFailed,
}

/// Which engine produced a proof object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineKind {
    /// Shallow store lookup by the coordinator.
    KnowledgeStore,
    Resolution,
    ModalTableau,
    Argumentation,
    TheoryBridge,
}

/// One derivation step. `premises` index earlier steps.
#[derive(Debug, Clone)]
pub struct ProofStep {
    pub rule: String,
    pub premises: Vec<usize>,
    pub conclusion: TermId,
}

/// Answer substitution: variable id to term.
pub type ProofBindings = FxHashMap<VarId, TermId>;

/// Canonical derivation record returned by every prover.
#[derive(Debug, Clone)]
pub struct ProofObject {
    pub goal_achieved: bool,
    pub conclusion: Option<TermId>,
    pub bindings: ProofBindings,
    pub status: ProofStatus,
    pub message: String,
    pub proof_steps: Vec<ProofStep>,
    pub used_axioms: FxHashSet<TermId>,
    pub engine: EngineKind,
    pub time_ms: u64,
    pub resources_consumed: FxHashMap<String, u64>,
}

impl ProofObject {
    /// An empty reply with the given status.
    pub fn with_status(engine: EngineKind, status: ProofStatus, message: impl Into<String>) -> Self {
        ProofObject {
            goal_achieved: false,
            conclusion: None,
            bindings: ProofBindings::default(),
            status,
            message: message.into(),
            proof_steps: Vec::new(),
            used_axioms: FxHashSet::default(),
            engine,
            time_ms: 0,
            resources_consumed: FxHashMap::default(),
        }
    }

    /// A successful reply concluding `goal`.
    pub fn proved(engine: EngineKind, goal: TermId) -> Self {
        let mut po = Self::with_status(engine, ProofStatus::Proved, "goal proved");
        po.goal_achieved = true;
        po.conclusion = Some(goal);
        po
    }

    /// Appends a step, enforcing the topological-order invariant.
    ///
    /// # Panics
    ///
    /// Panics if a premise index refers to a step that does not exist yet;
    /// that would make the DAG cyclic or dangling, which is a caller bug.
    pub fn push_step(
        &mut self,
        rule: impl Into<String>,
        premises: Vec<usize>,
        conclusion: TermId,
    ) -> usize {
        let idx = self.proof_steps.len();
        for p in &premises {
            assert!(
                *p < idx,
                "proof step premise {} refers to a step at or after {}",
                p,
                idx
            );
        }
        self.proof_steps.push(ProofStep { rule: rule.into(), premises, conclusion });
        idx
    }

    /// Records a consumed-resource counter.
    pub fn record_resource(&mut self, key: &str, amount: u64) {
        *self.resources_consumed.entry(key.to_string()).or_insert(0) += amount;
    }

    /// Walks the steps from the conclusion back to axioms, returning the
    /// indices actually reachable from the last step.
    pub fn steps_from_conclusion(&self) -> Vec<usize> {
        let mut reachable = Vec::new();
        let mut stack: Vec<usize> = match self.proof_steps.len() {
            0 => return reachable,
            n => vec![n - 1],
        };
        let mut seen = FxHashSet::default();
        while let Some(idx) = stack.pop() {
            if !seen.insert(idx) {
                continue;
            }
            reachable.push(idx);
            stack.extend(self.proof_steps[idx].premises.iter().copied());
        }
        reachable
    }
}
