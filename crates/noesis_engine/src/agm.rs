//! AGM-style belief base operations.
//!
//! The base is a finite statement list in insertion order. Entailment is
//! discharged by the resolution prover under a small budget, so these
//! operations inherit its soundness and its incompleteness under tight
//! limits.
//!
//! - `expand` is plain union.
//! - `contract` removes just enough to stop entailing φ: statements are
//!   considered from most entrenched to least, and each is kept unless the
//!   kept set would then entail φ. The caller may supply an entrenchment
//!   order; ties (and the default) follow insertion order, earlier
//!   statements counting as more entrenched.
//! - `revise` is the Levi identity: contract ¬φ, then add φ — unless the
//!   contracted base already entails φ, in which case the base is returned
//!   unchanged.
//!
//! Contracting a tautology cannot succeed; the base is returned unchanged
//! with [`ContractionOutcome::TautologicalContraction`].

use log::debug;
use noesis_kernel::{CoreTypes, TermId, TermStore, TypeTable};
use rustc_hash::FxHashMap;

use crate::limits::{CancelFlag, ResourceLimits};
use crate::proof::ProofStatus;
use crate::resolution;

/// Entrenchment ranks keyed by canonical statement id; higher rank means
/// harder to give up. Statements without a rank share the lowest.
pub type Entrenchment = FxHashMap<TermId, i64>;

/// What `contract` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractionOutcome {
    /// φ is no longer entailed.
    Contracted,
    /// φ is a tautology; the base was returned unchanged.
    TautologicalContraction,
}

/// `K ∪ {φ}`, deduplicating by alpha-equivalence.
pub fn expand(store: &mut TermStore, base: &[TermId], phi: TermId) -> Vec<TermId> {
    let phi_canon = store.canon(phi);
    let mut out = base.to_vec();
    if !base.iter().any(|s| store.canon(*s) == phi_canon) {
        out.push(phi);
    }
    out
}

/// Does the base entail φ?
pub fn entails(
    store: &mut TermStore,
    types: &mut TypeTable,
    core: &CoreTypes,
    base: &[TermId],
    phi: TermId,
    limits: ResourceLimits,
) -> bool {
    let po = resolution::prove(store, types, core, base, phi, limits, CancelFlag::new());
    po.status == ProofStatus::Proved
}

/// A maximal subset of the base not entailing φ, selected by entrenchment.
pub fn contract(
    store: &mut TermStore,
    types: &mut TypeTable,
    core: &CoreTypes,
    base: &[TermId],
    phi: TermId,
    entrenchment: Option<&Entrenchment>,
    limits: ResourceLimits,
) -> (Vec<TermId>, ContractionOutcome) {
    if entails(store, types, core, &[], phi, limits) {
        debug!("contract: target is tautological, base unchanged");
        return (base.to_vec(), ContractionOutcome::TautologicalContraction);
    }
    if !entails(store, types, core, base, phi, limits) {
        return (base.to_vec(), ContractionOutcome::Contracted);
    }

    // Most entrenched first; insertion order breaks ties (earlier wins).
    let mut order: Vec<usize> = (0..base.len()).collect();
    let rank = |store: &mut TermStore, idx: usize| -> i64 {
        entrenchment
            .and_then(|e| {
                let canon = store.canon(base[idx]);
                e.get(&canon).copied()
            })
            .unwrap_or(i64::MIN)
    };
    let ranks: Vec<i64> = order.iter().map(|i| rank(store, *i)).collect();
    order.sort_by_key(|i| (std::cmp::Reverse(ranks[*i]), *i));

    let mut kept: Vec<usize> = Vec::new();
    for idx in order {
        let mut candidate: Vec<TermId> = kept.iter().map(|i| base[*i]).collect();
        candidate.push(base[idx]);
        if !entails(store, types, core, &candidate, phi, limits) {
            kept.push(idx);
        }
    }
    kept.sort();
    (kept.into_iter().map(|i| base[i]).collect(), ContractionOutcome::Contracted)
}

/// The Levi identity: `revise(K, φ) = expand(contract(K, ¬φ), φ)`. When K
/// already entails φ, K is returned unchanged.
pub fn revise(
    store: &mut TermStore,
    types: &mut TypeTable,
    core: &CoreTypes,
    base: &[TermId],
    phi: TermId,
    entrenchment: Option<&Entrenchment>,
    limits: ResourceLimits,
) -> Vec<TermId> {
    if entails(store, types, core, base, phi, limits) {
        return base.to_vec();
    }
    let negated = noesis_store::negate(store, core, phi);
    let (contracted, _) =
        contract(store, types, core, base, negated, entrenchment, limits);
    expand(store, &contracted, phi)
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

    fn small_limits() -> ResourceLimits {
        ResourceLimits { time_ms: 2_000, nodes: 5_000, ..Default::default() }
    }

    #[test]
    fn revision_makes_the_new_belief_entailed() {
        let mut fx = fixture();
        let base = vec![parse(&mut fx, "Raining"), parse(&mut fx, "Raining => Wet")];
        let phi = parse(&mut fx, "not Raining");
        let revised = revise(
            &mut fx.store,
            &mut fx.types,
            &fx.core,
            &base,
            phi,
            None,
            small_limits(),
        );
        assert!(entails(&mut fx.store, &mut fx.types, &fx.core, &revised, phi, small_limits()));
    }

    #[test]
    fn revision_with_entailed_belief_is_identity() {
        let mut fx = fixture();
        let base = vec![parse(&mut fx, "Raining"), parse(&mut fx, "Raining => Wet")];
        let wet = parse(&mut fx, "Wet");
        let revised = revise(
            &mut fx.store,
            &mut fx.types,
            &fx.core,
            &base,
            wet,
            None,
            small_limits(),
        );
        assert_eq!(revised, base);
    }

    #[test]
    fn contraction_stops_entailment() {
        let mut fx = fixture();
        let base = vec![parse(&mut fx, "Raining"), parse(&mut fx, "Raining => Wet")];
        let wet = parse(&mut fx, "Wet");
        let (contracted, outcome) = contract(
            &mut fx.store,
            &mut fx.types,
            &fx.core,
            &base,
            wet,
            None,
            small_limits(),
        );
        assert_eq!(outcome, ContractionOutcome::Contracted);
        assert!(!entails(
            &mut fx.store,
            &mut fx.types,
            &fx.core,
            &contracted,
            wet,
            small_limits()
        ));
        // Maximality: only one of the two statements had to go.
        assert_eq!(contracted.len(), 1);
    }

    #[test]
    fn insertion_order_breaks_ties() {
        let mut fx = fixture();
        // Both statements alone entail Wet; the earlier one survives.
        let first = parse(&mut fx, "Wet and Cold");
        let second = parse(&mut fx, "Wet and Dark");
        let wet = parse(&mut fx, "Wet");
        let (contracted, _) = contract(
            &mut fx.store,
            &mut fx.types,
            &fx.core,
            &[first, second],
            wet,
            None,
            small_limits(),
        );
        // Neither can be kept: each entails Wet by itself.
        assert!(contracted.is_empty());

        // With unrelated statements, the earlier entailing one wins.
        let base = vec![parse(&mut fx, "Raining"), parse(&mut fx, "Raining => Wet")];
        let (contracted, _) = contract(
            &mut fx.store,
            &mut fx.types,
            &fx.core,
            &base,
            wet,
            None,
            small_limits(),
        );
        assert_eq!(contracted, vec![base[0]]);
    }

    #[test]
    fn entrenchment_overrides_insertion_order() {
        let mut fx = fixture();
        let raining = parse(&mut fx, "Raining");
        let rule = parse(&mut fx, "Raining => Wet");
        let wet = parse(&mut fx, "Wet");
        let mut ent = Entrenchment::default();
        let rule_canon = fx.store.canon(rule);
        ent.insert(rule_canon, 10);
        let (contracted, _) = contract(
            &mut fx.store,
            &mut fx.types,
            &fx.core,
            &[raining, rule],
            wet,
            Some(&ent),
            small_limits(),
        );
        // The rule is more entrenched, so the fact goes.
        assert_eq!(contracted, vec![rule]);
    }

    #[test]
    fn tautology_contraction_reports_and_keeps_base() {
        let mut fx = fixture();
        let base = vec![parse(&mut fx, "Raining")];
        let taut = parse(&mut fx, "Wet or not Wet");
        let (contracted, outcome) = contract(
            &mut fx.store,
            &mut fx.types,
            &fx.core,
            &base,
            taut,
            None,
            small_limits(),
        );
        assert_eq!(outcome, ContractionOutcome::TautologicalContraction);
        assert_eq!(contracted, base);
    }
}
