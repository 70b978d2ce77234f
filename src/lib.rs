//! Noesis: a symbolic cognition kernel.
//!
//! A typed higher-order knowledge representation core with a
//! multi-strategy inference engine. [`Session`] is the facade: it owns the
//! hash-consed term store, the type table with its subtype DAG, the
//! context-partitioned knowledge store, the parser frontend, and the
//! inference coordinator, wired together behind a small API.
//!
//! ```
//! use noesis::Session;
//!
//! let mut session = Session::new();
//! session.assert("Man(Socrates)").unwrap();
//! session.assert("forall ?x. Man(?x) => Mortal(?x)").unwrap();
//! let po = session.prove("Mortal(Socrates)").unwrap();
//! assert!(po.goal_achieved);
//! ```

mod env;
mod snapshot;

pub use env::default_limits;
pub use snapshot::{read_snapshot, write_snapshot};

pub use noesis_engine::{
    Coordinator, DefeasibleRule, EngineError, EngineKind, Hints, ModalSystem, ProofObject,
    ProofStatus, ResourceDimension, ResourceLimits, Semantics, Strategy,
};
pub use noesis_kernel::{CoreTypes, TermId, TermStore, Type, TypeTable};
pub use noesis_language::{Frontend, ParseError};
pub use noesis_store::{Binding, ContextKind, CtxId, KnowledgeStore, StoreError};

use std::fmt;

/// The default context a fresh session asserts into.
pub const DEFAULT_CONTEXT: &str = "TRUTHS";

/// Failures surfaced by the session facade.
#[derive(Debug)]
pub enum SessionError {
    Parse(Vec<ParseError>),
    Store(StoreError),
    Engine(EngineError),
    Io(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Parse(errs) => {
                write!(f, "parse failed:")?;
                for e in errs {
                    write!(f, " {}", e)?;
                }
                Ok(())
            }
            SessionError::Store(e) => write!(f, "{}", e),
            SessionError::Engine(e) => write!(f, "{}", e),
            SessionError::Io(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        SessionError::Store(e)
    }
}

impl From<EngineError> for SessionError {
    fn from(e: EngineError) -> Self {
        SessionError::Engine(e)
    }
}

/// One KR instance: shared term store, type table, knowledge store,
/// frontend, and coordinator.
pub struct Session {
    pub terms: TermStore,
    pub types: TypeTable,
    pub core: CoreTypes,
    pub frontend: Frontend,
    pub kb: KnowledgeStore,
    pub coordinator: Coordinator,
    default_ctx: CtxId,
}

impl Session {
    /// A fresh instance with the base ontology installed and the default
    /// context created.
    pub fn new() -> Self {
        let mut terms = TermStore::new();
        let mut types = TypeTable::new();
        let core = noesis_kernel::prelude::install(&mut types, &mut terms)
            .expect("installing the prelude into an empty table cannot fail");
        let mut kb = KnowledgeStore::new();
        let default_ctx = kb
            .create_context(DEFAULT_CONTEXT, None, ContextKind::Standard)
            .expect("creating the default context in an empty store cannot fail");
        Session {
            terms,
            types,
            core,
            frontend: Frontend::new(),
            kb,
            coordinator: Coordinator::new(),
            default_ctx,
        }
    }

    /// The default context's id.
    pub fn default_context(&self) -> CtxId {
        self.default_ctx
    }

    /// Parses a formula or definition.
    pub fn parse(&mut self, source: &str) -> Result<TermId, SessionError> {
        self.frontend
            .parse(source, &mut self.terms, &mut self.types, &self.core)
            .map_err(SessionError::Parse)
    }

    /// Prints a term in the canonical serialized form.
    pub fn print(&mut self, t: TermId) -> String {
        self.frontend.print(&mut self.terms, t)
    }

    /// Asserts a statement into the default context.
    pub fn assert(&mut self, source: &str) -> Result<bool, SessionError> {
        self.assert_in(source, DEFAULT_CONTEXT)
    }

    /// Asserts a statement into a named context.
    ///
    /// Definitions only extend the signature table (that already happened
    /// during lowering); they are not stored as facts.
    pub fn assert_in(&mut self, source: &str, context: &str) -> Result<bool, SessionError> {
        let stmt = self.parse(source)?;
        if matches!(self.terms.data(stmt), noesis_kernel::TermData::Definition { .. }) {
            return Ok(true);
        }
        let ctx = self.kb.resolve(context)?;
        Ok(self.kb.add(&mut self.terms, &self.types, &self.core, stmt, ctx)?)
    }

    /// Creates a context.
    pub fn create_context(
        &mut self,
        name: &str,
        parent: Option<&str>,
        kind: ContextKind,
    ) -> Result<CtxId, SessionError> {
        Ok(self.kb.create_context(name, parent, kind)?)
    }

    /// Deletes a context (and its children).
    pub fn delete_context(&mut self, name: &str) -> Result<(), SessionError> {
        Ok(self.kb.delete_context(name)?)
    }

    /// Shallow query against the default context.
    pub fn query(&mut self, pattern: &str) -> Result<Vec<Binding>, SessionError> {
        self.query_in(pattern, &[DEFAULT_CONTEXT])
    }

    /// Shallow query against named contexts.
    pub fn query_in(
        &mut self,
        pattern: &str,
        contexts: &[&str],
    ) -> Result<Vec<Binding>, SessionError> {
        let pattern = self.parse(pattern)?;
        let ctxs: Result<Vec<CtxId>, StoreError> =
            contexts.iter().map(|c| self.kb.resolve(c)).collect();
        let iter = self.kb.query(&mut self.terms, pattern, &ctxs?, None)?;
        Ok(iter.collect())
    }

    /// Proves a goal against the default context with default limits.
    pub fn prove(&mut self, goal: &str) -> Result<ProofObject, SessionError> {
        self.prove_with(goal, &[DEFAULT_CONTEXT], &Hints::default(), None)
    }

    /// Proves a goal with explicit contexts, hints, and limits.
    pub fn prove_with(
        &mut self,
        goal: &str,
        contexts: &[&str],
        hints: &Hints,
        limits: Option<ResourceLimits>,
    ) -> Result<ProofObject, SessionError> {
        let goal = self.parse(goal)?;
        let ctxs: Result<Vec<CtxId>, StoreError> =
            contexts.iter().map(|c| self.kb.resolve(c)).collect();
        let limits = limits.or_else(|| Some(default_limits()));
        Ok(self.coordinator.submit_goal(
            &mut self.terms,
            &mut self.types,
            &self.core,
            &self.kb,
            goal,
            &ctxs?,
            hints,
            limits,
        )?)
    }

    /// Renders a proof object for human consumption.
    pub fn render_proof(&mut self, po: &ProofObject) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        let _ = writeln!(out, "status: {:?} ({:?})", po.status, po.engine);
        if let Some(c) = po.conclusion {
            let _ = writeln!(out, "conclusion: {}", self.print(c));
        }
        if !po.bindings.is_empty() {
            let mut entries: Vec<(String, String)> = po
                .bindings
                .iter()
                .map(|(var, term)| {
                    let name = self
                        .terms
                        .var_term(*var)
                        .map(|vt| self.print(vt))
                        .unwrap_or_else(|| format!("?#{}", var.0));
                    let rendered = self.print(*term);
                    (name, rendered)
                })
                .collect();
            entries.sort();
            let _ = writeln!(out, "bindings:");
            for (name, term) in entries {
                let _ = writeln!(out, "  {} -> {}", name, term);
            }
        }
        for (i, step) in po.proof_steps.iter().enumerate() {
            let premises: Vec<String> =
                step.premises.iter().map(|p| p.to_string()).collect();
            let _ = writeln!(
                out,
                "[{}] {} ({}) {}",
                i,
                step.rule,
                premises.join(","),
                self.print(step.conclusion)
            );
        }
        if !po.message.is_empty() {
            let _ = writeln!(out, "note: {}", po.message);
        }
        out
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facade_wires_the_pipeline_together() {
        let mut session = Session::new();
        session.assert("Man(Socrates)").unwrap();
        session.assert("forall ?x. Man(?x) => Mortal(?x)").unwrap();
        let po = session.prove("Mortal(Socrates)").unwrap();
        assert!(po.goal_achieved);
    }

    #[test]
    fn snapshot_round_trips_through_memory() {
        let mut session = Session::new();
        session.assert("Man(Socrates)").unwrap();
        session.assert("forall ?x. Man(?x) => Mortal(?x)").unwrap();
        session
            .create_context("HYPOTHETICAL/h1", Some(DEFAULT_CONTEXT), ContextKind::Standard)
            .unwrap();
        session.assert_in("Dreaming(Socrates)", "HYPOTHETICAL/h1").unwrap();

        let mut buf = Vec::new();
        write_snapshot(&mut session, &mut buf).unwrap();
        let mut restored = read_snapshot(&mut buf.as_slice()).unwrap();

        let po = restored.prove("Mortal(Socrates)").unwrap();
        assert!(po.goal_achieved);
        let hits = restored
            .query_in("Dreaming(?x)", &["HYPOTHETICAL/h1"])
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn truncated_snapshot_fails_cleanly() {
        let mut session = Session::new();
        session.assert("Man(Socrates)").unwrap();
        let mut buf = Vec::new();
        write_snapshot(&mut session, &mut buf).unwrap();
        buf.truncate(buf.len() - 3);
        assert!(matches!(
            read_snapshot(&mut buf.as_slice()),
            Err(SessionError::Io(_))
        ));
    }
}
