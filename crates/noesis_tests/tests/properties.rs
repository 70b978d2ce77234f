//! Universal invariants from the kernel contracts, exercised cross-crate.

use noesis::Session;
use noesis_kernel::{
    apply_type_subst, free_variables, substitute, Subst, TermData, Type,
};
use rustc_hash::FxHashSet;

#[test]
fn alpha_equal_terms_hash_equal_and_converse() {
    let mut session = Session::new();
    let a = session.parse("forall ?x. Man(?x) => Mortal(?x)").unwrap();
    let b = session.parse("forall ?y. Man(?y) => Mortal(?y)").unwrap();
    let c = session.parse("forall ?x. Man(?x) => Happy(?x)").unwrap();

    assert!(session.terms.equal_mod_alpha(a, b));
    assert_eq!(session.terms.content_hash(a), session.terms.content_hash(b));

    assert!(!session.terms.equal_mod_alpha(a, c));
    assert_ne!(session.terms.content_hash(a), session.terms.content_hash(c));
}

#[test]
fn substitution_never_captures_and_bounds_free_variables() {
    let mut session = Session::new();
    // R(?u, ?v) with two free variables.
    let term = session.parse("Rel(?u, ?v)").unwrap();
    let replacement = session.parse("Mother(?w)").unwrap();
    let replacement_arg = match session.terms.data(replacement) {
        TermData::Application { arguments, .. } => arguments[0],
        _ => unreachable!(),
    };

    let free_before = free_variables(&session.terms, term);
    let u_sym = session.terms.interner_mut().intern("u");
    let u_term = session.frontend.free_var(u_sym).unwrap();
    let u_var = match session.terms.data(u_term) {
        TermData::Variable { var, .. } => *var,
        _ => unreachable!(),
    };

    let mut subst = Subst::default();
    subst.insert(u_var, replacement_arg);
    let result = substitute(&mut session.terms, term, &subst);
    let free_after = free_variables(&session.terms, result);

    // free(result) ⊆ (free(term) \ {u}) ∪ free(replacement)
    let mut allowed: FxHashSet<_> = free_before.clone();
    allowed.remove(&u_var);
    allowed.extend(free_variables(&session.terms, replacement_arg));
    assert!(free_after.is_subset(&allowed));
    assert!(!free_after.contains(&u_var));
}

#[test]
fn type_unifier_makes_both_sides_equal() {
    let mut session = Session::new();
    let a_sym = session.terms.interner_mut().intern("a");
    let var = session.types.fresh_var(a_sym);
    let ent = session.core.entity_ty();
    let f1 = Type::function(vec![var.clone()], var.clone());
    let f2 = Type::function(vec![ent.clone()], ent.clone());

    let subst = session.types.unify_types(&f1, &f2).unwrap();
    assert_eq!(apply_type_subst(&f1, &subst), apply_type_subst(&f2, &subst));

    // And incompatible types have no unifier.
    let bool_ = session.core.bool_();
    let f3 = Type::function(vec![ent.clone(), ent], bool_);
    assert!(session.types.unify_types(&f1, &f3).is_none());
}

#[test]
fn query_bindings_instantiate_the_pattern_to_stored_facts() {
    let mut session = Session::new();
    session.assert("Likes(Alice, Bob)").unwrap();
    session.assert("Likes(Bob, Carol)").unwrap();

    let results = session.query("Likes(?from, ?to)").unwrap();
    assert_eq!(results.len(), 2);
    let pattern = session.parse("Likes(?from, ?to)").unwrap();
    let ctx = session.default_context();
    for binding in results {
        let subst: Subst = binding.iter().map(|(v, t)| (*v, *t)).collect();
        let instantiated = substitute(&mut session.terms, pattern, &subst);
        assert!(free_variables(&session.terms, instantiated).is_empty());
        assert!(session.kb.exists(&mut session.terms, instantiated, &[ctx]));
    }
}

#[test]
fn revision_postulates_hold_on_a_small_base() {
    use noesis_engine::{agm, ResourceLimits};

    let mut session = Session::new();
    let raining = session.parse("Raining").unwrap();
    let rule = session.parse("Raining => Wet").unwrap();
    let base = vec![raining, rule];
    let limits = ResourceLimits { time_ms: 2_000, nodes: 5_000, ..Default::default() };

    // revise(K, φ) ⊨ φ
    let not_raining = session.parse("not Raining").unwrap();
    let revised = agm::revise(
        &mut session.terms,
        &mut session.types,
        &session.core,
        &base,
        not_raining,
        None,
        limits,
    );
    assert!(agm::entails(
        &mut session.terms,
        &mut session.types,
        &session.core,
        &revised,
        not_raining,
        limits
    ));

    // K ⊨ φ already: revise(K, φ) = K
    let wet = session.parse("Wet").unwrap();
    let unchanged = agm::revise(
        &mut session.terms,
        &mut session.types,
        &session.core,
        &base,
        wet,
        None,
        limits,
    );
    assert_eq!(unchanged, base);

    // contract(K, φ) ⊭ φ for non-tautological φ
    let (contracted, _) = agm::contract(
        &mut session.terms,
        &mut session.types,
        &session.core,
        &base,
        wet,
        None,
        limits,
    );
    assert!(!agm::entails(
        &mut session.terms,
        &mut session.types,
        &session.core,
        &contracted,
        wet,
        limits
    ));
}

#[test]
fn subsumption_never_drops_the_stronger_clause() {
    use noesis_engine::{clausify, subsumes, SkolemState};

    let mut session = Session::new();
    let general_stmt = session.parse("forall ?x. P(?x)").unwrap();
    let specific_stmt = session.parse("P(a) or Q(a)").unwrap();
    let mut skolem = SkolemState::new();
    let general = clausify(
        &mut session.terms,
        &mut session.types,
        &session.core,
        general_stmt,
        &mut skolem,
    )
    .remove(0);
    let specific = clausify(
        &mut session.terms,
        &mut session.types,
        &session.core,
        specific_stmt,
        &mut skolem,
    )
    .remove(0);

    // The general clause subsumes the specific one, never the reverse.
    assert!(subsumes(&session.terms, &general, &specific));
    assert!(!subsumes(&session.terms, &specific, &general));
}
