//! The context-partitioned knowledge store.
//!
//! A [`KnowledgeStore`] owns the arena of [`Partition`]s (see the
//! `context` module for the tree discipline) and the operations over
//! them: add, retract, exists, and `query` — indexed structural matching
//! plus depth-1 rule-head lookup; anything deeper belongs to the
//! inference engine. The returned [`QueryIter`] is a pull-based iterator;
//! the current implementation materializes its bindings at call time,
//! which the lazy interface permits.

use noesis_kernel::{
    check, ConnectiveKind, CoreTypes, TermData, TermId, TermStore, TypeEnv, TypeTable, VarId,
};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::context::{ContextKind, CtxId, Entry, Partition, RuleEntry};
use crate::error::StoreError;
use crate::matching::{match_terms, resolve_bindings, Binding};

/// Bindings produced by [`KnowledgeStore::query`].
///
/// Pull-based: consuming code sees one binding at a time. Order is
/// unspecified but stable in the absence of writes.
pub struct QueryIter {
    results: std::vec::IntoIter<Binding>,
}

impl Iterator for QueryIter {
    type Item = Binding;

    fn next(&mut self) -> Option<Binding> {
        self.results.next()
    }
}

/// The knowledge store: a tree of partitions over a shared term store.
pub struct KnowledgeStore {
    partitions: Vec<Partition>,
    by_name: FxHashMap<String, CtxId>,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        KnowledgeStore { partitions: Vec::new(), by_name: FxHashMap::default() }
    }

    /// Creates a context, optionally as a child seeing a snapshot of its
    /// parent.
    pub fn create_context(
        &mut self,
        name: &str,
        parent: Option<&str>,
        kind: ContextKind,
    ) -> Result<CtxId, StoreError> {
        let parent_id = match parent {
            Some(p) => Some(self.resolve(p)?),
            None => None,
        };
        let inherited: Vec<Entry> = match parent_id {
            Some(pid) => self.partitions[pid.index()].visible().collect(),
            None => Vec::new(),
        };
        let id = CtxId(self.partitions.len() as u32);
        self.partitions.push(Partition::new(name.to_string(), kind, parent_id, inherited));
        if let Some(pid) = parent_id {
            self.partitions[pid.index()].children.push(id);
        }
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Deletes a context and, cascading, all of its descendants.
    pub fn delete_context(&mut self, name: &str) -> Result<(), StoreError> {
        let id = self.resolve(name)?;
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let p = &mut self.partitions[cur.index()];
            p.alive = false;
            self.by_name.remove(&p.name);
            stack.extend(p.children.iter().copied());
        }
        Ok(())
    }

    /// Resolves a context name to its id.
    pub fn resolve(&self, name: &str) -> Result<CtxId, StoreError> {
        match self.by_name.get(name) {
            Some(id) if self.partitions[id.index()].alive => Ok(*id),
            _ => Err(StoreError::UnknownContext(name.to_string())),
        }
    }

    /// `true` if the context exists and is alive.
    pub fn has_context(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    fn partition(&self, id: CtxId) -> Result<&Partition, StoreError> {
        let p = self
            .partitions
            .get(id.index())
            .ok_or_else(|| StoreError::UnknownContext(format!("#{}", id.0)))?;
        if !p.alive {
            return Err(StoreError::UnknownContext(p.name.clone()));
        }
        Ok(p)
    }

    /// Adds a statement to a context.
    ///
    /// Returns `true` when the statement is new to the context. Type errors
    /// propagate; a contradiction is an error only in consistent-only
    /// contexts; appending to a frozen context violates an invariant.
    pub fn add(
        &mut self,
        terms: &mut TermStore,
        types: &TypeTable,
        core: &CoreTypes,
        stmt: TermId,
        ctx: CtxId,
    ) -> Result<bool, StoreError> {
        let kind = self.partition(ctx)?.kind;
        match kind {
            ContextKind::Frozen => {
                let name = self.partitions[ctx.index()].name.clone();
                return Err(StoreError::InvariantViolation(format!(
                    "append to frozen context '{}'",
                    name
                )));
            }
            ContextKind::ConsistentOnly => {
                let negated = negate(terms, core, stmt);
                if self.exists(terms, negated, &[ctx]) {
                    let name = self.partitions[ctx.index()].name.clone();
                    return Err(StoreError::Contradiction { context: name });
                }
            }
            ContextKind::Standard => {}
        }

        // Every stored statement must be a well-typed formula.
        let mut env = TypeEnv::new();
        check(terms, types, core, &mut env, stmt, &core.prop()).map_err(StoreError::Type)?;

        let canon = terms.canon(stmt);
        let p = &mut self.partitions[ctx.index()];
        if p.tombstones.remove(&canon) {
            p.members.insert(canon);
            return Ok(true);
        }
        if p.members.contains(&canon) {
            return Ok(false);
        }
        p.members.insert(canon);
        p.statements.push(Entry { term: stmt, canon });
        p.index.insert(terms, types, stmt);
        if let Some(rule) = RuleEntry::split(terms, stmt) {
            p.rules.push(rule);
        }
        Ok(true)
    }

    /// Retracts every visible statement matching `pattern`. Returns the
    /// number retracted. Other contexts are untouched.
    pub fn retract(
        &mut self,
        terms: &mut TermStore,
        pattern: TermId,
        ctx: CtxId,
    ) -> Result<usize, StoreError> {
        self.partition(ctx)?;
        let visible: Vec<Entry> = self.partitions[ctx.index()].visible().collect();
        let mut hit = Vec::new();
        for entry in visible {
            let mut bindings = Binding::default();
            if match_terms(terms, &mut bindings, pattern, entry.term)
                || terms.equal_mod_alpha(pattern, entry.term)
            {
                hit.push(entry.canon);
            }
        }
        let p = &mut self.partitions[ctx.index()];
        for canon in &hit {
            p.tombstones.insert(*canon);
            p.members.remove(canon);
        }
        Ok(hit.len())
    }

    /// `true` if `stmt` (up to alpha-equivalence) is visible in any of the
    /// given contexts.
    pub fn exists(&self, terms: &mut TermStore, stmt: TermId, ctxs: &[CtxId]) -> bool {
        let canon = terms.canon(stmt);
        ctxs.iter().any(|c| {
            self.partition(*c)
                .map(|p| p.members.contains(&canon))
                .unwrap_or(false)
        })
    }

    /// Finds bindings under which `pattern` matches a visible fact or a
    /// rule head (depth 1: every body literal must itself match a visible
    /// fact) in the union of `ctxs`.
    ///
    /// With `bind_vars`, the bindings are restricted to those variables;
    /// otherwise every variable bound during matching is reported,
    /// including rule variables.
    pub fn query(
        &self,
        terms: &mut TermStore,
        pattern: TermId,
        ctxs: &[CtxId],
        bind_vars: Option<&[VarId]>,
    ) -> Result<QueryIter, StoreError> {
        let mut results: Vec<Binding> = Vec::new();
        let mut seen: FxHashSet<Vec<(VarId, TermId)>> = FxHashSet::default();

        for ctx in ctxs {
            let p = self.partition(*ctx)?;

            // Indexed candidates where the pattern shape allows, else scan.
            let candidates: Vec<TermId> = match p.index.candidates(terms, pattern) {
                Some(c) => c,
                None => p.visible().map(|e| e.term).collect(),
            };
            for fact in candidates {
                let canon = terms.canon(fact);
                if !p.members.contains(&canon) {
                    continue;
                }
                let mut bindings = Binding::default();
                if match_terms(terms, &mut bindings, pattern, fact) {
                    push_unique(terms, &mut results, &mut seen, bindings, bind_vars);
                }
            }

            // Depth-1 rule lookup: match the head, then satisfy every body
            // literal directly against visible facts (rules never chain
            // here; deep entailment is the engine's job).
            for rule in &p.rules {
                let mut bindings = Binding::default();
                if !match_terms(terms, &mut bindings, pattern, rule.head) {
                    continue;
                }
                let mut satisfied = Vec::new();
                satisfy_body(terms, p, &rule.body, 0, bindings, &mut satisfied);
                for b in satisfied {
                    push_unique(terms, &mut results, &mut seen, b, bind_vars);
                }
            }
        }

        Ok(QueryIter { results: results.into_iter() })
    }

    /// Locally added statements of a context, in insertion order (for
    /// snapshots).
    pub fn statements_in_order(&self, ctx: CtxId) -> Result<Vec<TermId>, StoreError> {
        let p = self.partition(ctx)?;
        Ok(p.statements
            .iter()
            .filter(|e| !p.tombstones.contains(&e.canon))
            .map(|e| e.term)
            .collect())
    }

    /// All visible statements of a context (inherited and own).
    pub fn visible_statements(&self, ctx: CtxId) -> Result<Vec<TermId>, StoreError> {
        Ok(self.partition(ctx)?.visible().map(|e| e.term).collect())
    }

    /// Context names in creation order, with parent and kind (for
    /// snapshots).
    pub fn contexts_in_order(&self) -> Vec<(String, Option<String>, ContextKind)> {
        self.partitions
            .iter()
            .filter(|p| p.alive)
            .map(|p| {
                let parent = p.parent.map(|pid| self.partitions[pid.index()].name.clone());
                (p.name.clone(), parent, p.kind)
            })
            .collect()
    }

    /// The narrowest atomic type the index has recorded for a ground term.
    pub fn narrowest_type(&self, ctx: CtxId, term: TermId) -> Option<noesis_base::Symbol> {
        self.partition(ctx).ok().and_then(|p| p.index.type_of(term))
    }
}

impl Default for KnowledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Backtracking satisfaction of a rule body against one partition's facts.
fn satisfy_body(
    terms: &mut TermStore,
    p: &Partition,
    body: &[TermId],
    idx: usize,
    bindings: Binding,
    out: &mut Vec<Binding>,
) {
    if idx == body.len() {
        out.push(bindings);
        return;
    }
    let lit = body[idx];
    let candidates: Vec<TermId> = match p.index.candidates(terms, lit) {
        Some(c) => c,
        None => p.visible().map(|e| e.term).collect(),
    };
    for fact in candidates {
        let canon = terms.canon(fact);
        if !p.members.contains(&canon) {
            continue;
        }
        let mut extended = bindings.clone();
        if match_terms(terms, &mut extended, lit, fact) {
            satisfy_body(terms, p, body, idx + 1, extended, out);
        }
    }
}

fn push_unique(
    terms: &TermStore,
    results: &mut Vec<Binding>,
    seen: &mut FxHashSet<Vec<(VarId, TermId)>>,
    bindings: Binding,
    bind_vars: Option<&[VarId]>,
) {
    let keep: Vec<VarId> = match bind_vars {
        Some(vs) => vs.to_vec(),
        None => bindings.keys().copied().collect(),
    };
    let resolved = resolve_bindings(terms, &bindings, &keep);
    let mut key: Vec<(VarId, TermId)> = resolved.iter().map(|(v, t)| (*v, *t)).collect();
    key.sort();
    if seen.insert(key) {
        results.push(resolved);
    }
}

/// The negation of a formula, with double negations collapsed.
pub fn negate(terms: &mut TermStore, core: &CoreTypes, stmt: TermId) -> TermId {
    if let TermData::Connective { kind: ConnectiveKind::Not, operands } = terms.data(stmt) {
        return operands[0];
    }
    terms.connective(ConnectiveKind::Not, vec![stmt], core.prop())
}

#[cfg(test)]
mod tests {
    use super::*;
    use noesis_kernel::prelude;
    use noesis_language::Frontend;

    struct Fixture {
        terms: TermStore,
        types: TypeTable,
        core: CoreTypes,
        frontend: Frontend,
        store: KnowledgeStore,
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
            store: KnowledgeStore::new(),
        }
    }

    fn parse(fx: &mut Fixture, src: &str) -> TermId {
        fx.frontend
            .parse(src, &mut fx.terms, &mut fx.types, &fx.core)
            .unwrap_or_else(|e| panic!("parse '{}': {:?}", src, e))
    }

    fn add(fx: &mut Fixture, src: &str, ctx: CtxId) -> bool {
        let t = parse(fx, src);
        fx.store.add(&mut fx.terms, &fx.types, &fx.core, t, ctx).unwrap()
    }

    #[test]
    fn add_and_exists() {
        let mut fx = fixture();
        let ctx = fx.store.create_context("TRUTHS", None, ContextKind::Standard).unwrap();
        assert!(add(&mut fx, "Man(Socrates)", ctx));
        // Second insert of the same fact is a no-op.
        assert!(!add(&mut fx, "Man(Socrates)", ctx));
        let q = parse(&mut fx, "Man(Socrates)");
        assert!(fx.store.exists(&mut fx.terms, q, &[ctx]));
    }

    #[test]
    fn query_binds_pattern_variables() {
        let mut fx = fixture();
        let ctx = fx.store.create_context("TRUTHS", None, ContextKind::Standard).unwrap();
        add(&mut fx, "Man(Socrates)", ctx);
        add(&mut fx, "Man(Plato)", ctx);
        let pattern = parse(&mut fx, "Man(?x)");
        let results: Vec<Binding> = fx
            .store
            .query(&mut fx.terms, pattern, &[ctx], None)
            .unwrap()
            .collect();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn depth_one_rule_head_lookup() {
        let mut fx = fixture();
        let ctx = fx.store.create_context("TRUTHS", None, ContextKind::Standard).unwrap();
        add(&mut fx, "Man(Socrates)", ctx);
        add(&mut fx, "forall ?x. Man(?x) => Mortal(?x)", ctx);
        let pattern = parse(&mut fx, "Mortal(?who)");
        let results: Vec<Binding> = fx
            .store
            .query(&mut fx.terms, pattern, &[ctx], None)
            .unwrap()
            .collect();
        assert_eq!(results.len(), 1);

        // The pattern variable resolves through the rule variable to the
        // matching constant.
        let who = fx.terms.interner_mut().intern("who");
        let who_var = fx.frontend.free_var(who).unwrap();
        let who_id = match fx.terms.data(who_var) {
            TermData::Variable { var, .. } => *var,
            _ => unreachable!(),
        };
        let socrates = parse(&mut fx, "Socrates");
        assert_eq!(results[0].get(&who_id), Some(&socrates));
    }

    #[test]
    fn child_sees_parent_snapshot_not_later_changes() {
        let mut fx = fixture();
        let h1 = fx.store.create_context("H1", None, ContextKind::Standard).unwrap();
        add(&mut fx, "P(a)", h1);
        let h2 = fx.store.create_context("H2", Some("H1"), ContextKind::Standard).unwrap();

        // Parent retracts after branching; the child's snapshot is intact.
        let pattern = parse(&mut fx, "P(a)");
        fx.store.retract(&mut fx.terms, pattern, h1).unwrap();
        let q = parse(&mut fx, "P(a)");
        assert!(!fx.store.exists(&mut fx.terms, q, &[h1]));
        assert!(fx.store.exists(&mut fx.terms, q, &[h2]));
    }

    #[test]
    fn child_retraction_shadows_without_touching_parent() {
        let mut fx = fixture();
        let h1 = fx.store.create_context("H1", None, ContextKind::Standard).unwrap();
        add(&mut fx, "P(a)", h1);
        let h2 = fx.store.create_context("H2", Some("H1"), ContextKind::Standard).unwrap();
        let pattern = parse(&mut fx, "P(a)");
        let n = fx.store.retract(&mut fx.terms, pattern, h2).unwrap();
        assert_eq!(n, 1);

        let q = parse(&mut fx, "P(a)");
        assert!(fx.store.exists(&mut fx.terms, q, &[h1]));
        assert!(!fx.store.exists(&mut fx.terms, q, &[h2]));
    }

    #[test]
    fn consistent_only_rejects_contradiction() {
        let mut fx = fixture();
        let ctx = fx
            .store
            .create_context("BELIEFS/core", None, ContextKind::ConsistentOnly)
            .unwrap();
        add(&mut fx, "Flies(Tweety)", ctx);
        let neg = parse(&mut fx, "not Flies(Tweety)");
        let err = fx.store.add(&mut fx.terms, &fx.types, &fx.core, neg, ctx).unwrap_err();
        assert!(matches!(err, StoreError::Contradiction { .. }));
    }

    #[test]
    fn frozen_context_rejects_appends() {
        let mut fx = fixture();
        let ctx = fx.store.create_context("FIXED", None, ContextKind::Frozen).unwrap();
        let t = parse(&mut fx, "P(a)");
        let err = fx.store.add(&mut fx.terms, &fx.types, &fx.core, t, ctx).unwrap_err();
        assert!(matches!(err, StoreError::InvariantViolation(_)));
    }

    #[test]
    fn delete_context_cascades_to_children() {
        let mut fx = fixture();
        fx.store.create_context("H1", None, ContextKind::Standard).unwrap();
        fx.store.create_context("H2", Some("H1"), ContextKind::Standard).unwrap();
        fx.store.delete_context("H1").unwrap();
        assert!(!fx.store.has_context("H1"));
        assert!(!fx.store.has_context("H2"));
    }

    #[test]
    fn unknown_context_is_an_error() {
        let fx = fixture();
        assert!(matches!(fx.store.resolve("NOWHERE"), Err(StoreError::UnknownContext(_))));
    }

    #[test]
    fn alpha_variant_statements_are_one_entry() {
        let mut fx = fixture();
        let ctx = fx.store.create_context("TRUTHS", None, ContextKind::Standard).unwrap();
        assert!(add(&mut fx, "forall ?x. Man(?x) => Mortal(?x)", ctx));
        assert!(!add(&mut fx, "forall ?y. Man(?y) => Mortal(?y)", ctx));
    }

    #[test]
    fn bind_vars_restricts_reported_bindings() {
        let mut fx = fixture();
        let ctx = fx.store.create_context("TRUTHS", None, ContextKind::Standard).unwrap();
        add(&mut fx, "Loves(Abelard, Heloise)", ctx);
        let pattern = parse(&mut fx, "Loves(?a, ?b)");
        let a = fx.terms.interner_mut().intern("a");
        let a_var = fx.frontend.free_var(a).unwrap();
        let a_id = match fx.terms.data(a_var) {
            TermData::Variable { var, .. } => *var,
            _ => unreachable!(),
        };
        let results: Vec<Binding> = fx
            .store
            .query(&mut fx.terms, pattern, &[ctx], Some(&[a_id]))
            .unwrap()
            .collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].len(), 1);
    }
}
