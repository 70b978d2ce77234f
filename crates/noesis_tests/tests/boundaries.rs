//! Boundary behaviours: the edges the spec pins down explicitly.

use noesis::{Hints, ModalSystem, ProofStatus, Session};
use noesis_engine::{clausify, ResourceLimits, SkolemState};
use noesis_kernel::{free_variables, TermData};

#[test]
fn subtype_cycle_insertion_is_rejected_and_dag_unchanged() {
    let mut session = Session::new();
    let animal = session.terms.interner_mut().intern("Animal");
    let bird = session.terms.interner_mut().intern("Bird");
    session
        .types
        .define_atomic(animal, &[], session.terms.interner())
        .unwrap();
    session
        .types
        .define_atomic(bird, &[animal], session.terms.interner())
        .unwrap();

    let err = session
        .types
        .define_atomic(animal, &[bird], session.terms.interner())
        .unwrap_err();
    assert!(matches!(err, noesis_kernel::TypeError::CyclicSubtype { .. }));
    // The failed edge left the DAG as it was.
    assert!(session.types.supertypes_of(animal).is_empty());
    assert_eq!(session.types.supertypes_of(bird), &[animal]);
}

#[test]
fn skolemization_uses_distinct_symbols_per_existential() {
    let mut session = Session::new();
    let stmt = session
        .parse("(exists ?x. Tall(?x)) and (exists ?y. Short(?y))")
        .unwrap();
    let clauses = clausify(
        &mut session.terms,
        &mut session.types,
        &session.core,
        stmt,
        &mut SkolemState::new(),
    );
    assert_eq!(clauses.len(), 2);

    // Both clauses are ground with different skolem constants.
    let mut skolem_names = Vec::new();
    for clause in &clauses {
        assert!(free_variables(&session.terms, clause.literals[0].atom).is_empty());
        if let TermData::Application { arguments, .. } =
            session.terms.data(clause.literals[0].atom)
        {
            if let TermData::Constant { name, .. } = session.terms.data(arguments[0]) {
                skolem_names.push(*name);
            }
        }
    }
    assert_eq!(skolem_names.len(), 2);
    assert_ne!(skolem_names[0], skolem_names[1]);
}

#[test]
fn s5_tableau_terminates_on_propositionally_bounded_input() {
    let mut session = Session::new();
    let hints = Hints { modal_system: Some(ModalSystem::S5), ..Default::default() };
    // Alternating modalities that would spin up worlds forever without
    // subsumption blocking.
    let po = session
        .prove_with(
            "□◇□◇P => ◇P",
            &["TRUTHS"],
            &hints,
            Some(ResourceLimits { time_ms: 10_000, ..Default::default() }),
        )
        .unwrap();
    assert!(!matches!(po.status, ProofStatus::ResourceExhausted(_)));
}

#[test]
fn resource_exhaustion_names_the_dimension() {
    let mut session = Session::new();
    session.assert("P(a)").unwrap();
    session.assert("forall ?x. P(?x) => P(f(?x))").unwrap();
    let po = session
        .prove_with(
            "Q(zzz)",
            &["TRUTHS"],
            &Hints::default(),
            Some(ResourceLimits { time_ms: 50, nodes: 40, ..Default::default() }),
        )
        .unwrap();
    match po.status {
        ProofStatus::ResourceExhausted(dim) => {
            // Either time or nodes, but always named.
            let _ = dim;
        }
        // A small clause set may also saturate first; both are honest.
        ProofStatus::Unknown => {}
        other => panic!("expected exhaustion or saturation, got {:?}", other),
    }
}

#[test]
fn frozen_context_append_is_an_invariant_violation() {
    let mut session = Session::new();
    session
        .create_context("FIXED", None, noesis::ContextKind::Frozen)
        .unwrap();
    let err = session.assert_in("P(a)", "FIXED").unwrap_err();
    assert!(matches!(
        err,
        noesis::SessionError::Store(noesis::StoreError::InvariantViolation(_))
    ));
}

#[test]
fn higher_order_pattern_unification_is_unitary() {
    use noesis_kernel::{unify_ho, HoOptions, Type};

    let mut session = Session::new();
    let ent = session.core.entity_ty();
    let pred_ty = Type::function(vec![ent.clone()], ent.clone());

    let f_sym = session.terms.interner_mut().intern("f");
    let f = session.terms.constant(f_sym, None, pred_ty.clone());
    let meta_sym = session.terms.interner_mut().intern("F");
    let meta = session.terms.fresh_variable(meta_sym, pred_ty.clone());

    let y_sym = session.terms.interner_mut().intern("y");
    let y1 = session.terms.fresh_variable(y_sym, ent.clone());
    let fy = session.terms.application(meta, vec![y1], ent.clone());
    let lhs = session.terms.lambda(vec![y1], fy, pred_ty.clone());

    let y2 = session.terms.fresh_variable(y_sym, ent.clone());
    let gy = session.terms.application(f, vec![y2], ent.clone());
    let rhs = session.terms.lambda(vec![y2], gy, pred_ty);

    let sol = unify_ho(&mut session.terms, &session.types, lhs, rhs, HoOptions::default())
        .unwrap();
    assert!(sol.residual.is_empty());
    // The single pattern solution maps F to (an alpha-variant of) f itself.
    let applied = noesis_kernel::apply_and_reduce(&mut session.terms, lhs, &sol.subst);
    assert!(session.terms.equal_mod_alpha(applied, rhs));
}
