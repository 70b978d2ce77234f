//! End-to-end scenarios across the full stack: parse, store, prove.

use noesis::{
    ContextKind, Hints, ModalSystem, ProofStatus, Semantics, Session, Strategy,
};
use noesis_engine::DefeasibleRule;

#[test]
fn modus_ponens_socrates() {
    let mut session = Session::new();
    session.assert("Man(Socrates)").unwrap();
    session.assert("forall ?x. Man(?x) => Mortal(?x)").unwrap();

    let po = session.prove("Mortal(Socrates)").unwrap();
    assert!(po.goal_achieved);
    assert_eq!(po.status, ProofStatus::Proved);

    // The rule's variable was instantiated to Socrates.
    let socrates = session.parse("Socrates").unwrap();
    assert!(po.bindings.values().any(|t| *t == socrates));

    // The derivation shows the rule instantiation and the modus ponens.
    let rules: Vec<&str> = po.proof_steps.iter().map(|s| s.rule.as_str()).collect();
    assert!(rules.contains(&"rule-instantiation"));
    assert!(rules.contains(&"modus-ponens"));
}

#[test]
fn resolution_refutation_in_two_steps() {
    let mut session = Session::new();
    session.assert("P(a)").unwrap();
    session.assert("forall ?x. not P(?x) or Q(?x)").unwrap();
    session.assert("not Q(a)").unwrap();

    let ctx = session.default_context();
    let po = session
        .coordinator
        .check_consistency(
            &mut session.terms,
            &mut session.types,
            &session.core,
            &session.kb,
            &[ctx],
            None,
        )
        .unwrap();
    assert_eq!(po.status, ProofStatus::Contradiction);
    let resolutions = po.proof_steps.iter().filter(|s| s.rule == "resolve").count();
    assert_eq!(resolutions, 2);
}

#[test]
fn k_axiom_is_valid_under_k() {
    let mut session = Session::new();
    let hints = Hints {
        modal_system: Some(ModalSystem::K),
        ..Default::default()
    };
    let po = session
        .prove_with("□(P => Q) => (□P => □Q)", &["TRUTHS"], &hints, None)
        .unwrap();
    assert_eq!(po.status, ProofStatus::Proved);
    assert!(po.goal_achieved);
}

#[test]
fn occurs_check_rejects_x_against_f_of_x() {
    use noesis_kernel::{prelude, unify, TermStore, Type, TypeTable, UnifyError};

    let mut store = TermStore::new();
    let mut types = TypeTable::new();
    let core = prelude::install(&mut types, &mut store).unwrap();

    let x_sym = store.interner_mut().intern("x");
    let x = store.fresh_variable(x_sym, core.entity_ty());
    let f_sym = store.interner_mut().intern("f");
    let f = store.constant(
        f_sym,
        None,
        Type::function(vec![core.entity_ty()], core.entity_ty()),
    );
    let f_x = store.application(f, vec![x], core.entity_ty());

    let err = unify(&mut store, &types, x, f_x).unwrap_err();
    assert_eq!(err, UnifyError::OccursCheck);
}

#[test]
fn tweety_does_not_fly_under_grounded_semantics() {
    let mut session = Session::new();
    session.assert("Bird(Tweety)").unwrap();
    session.assert("Penguin(Tweety)").unwrap();
    session.assert("forall ?x. Penguin(?x) => not Flies(?x)").unwrap();

    let body = session.parse("Bird(?b)").unwrap();
    let head = session.parse("Flies(?b)").unwrap();
    session.coordinator.add_defeasible_rule(DefeasibleRule {
        name: None,
        body: vec![body],
        head,
        priority: 0,
    });

    let hints = Hints {
        strategy: Some(Strategy::Argumentation),
        semantics: Some(Semantics::Grounded),
        ..Default::default()
    };
    // Flies(Tweety) is not justified; its negation is.
    let po = session
        .prove_with("Flies(Tweety)", &["TRUTHS"], &hints, None)
        .unwrap();
    assert_eq!(po.status, ProofStatus::Disproved);
    assert!(!po.goal_achieved);

    let po = session
        .prove_with("not Flies(Tweety)", &["TRUTHS"], &hints, None)
        .unwrap();
    assert_eq!(po.status, ProofStatus::Proved);
}

#[test]
fn context_isolation_after_child_retraction() {
    let mut session = Session::new();
    session
        .create_context("H1", None, ContextKind::Standard)
        .unwrap();
    session.assert_in("P(a)", "H1").unwrap();
    session
        .create_context("H2", Some("H1"), ContextKind::Standard)
        .unwrap();

    // Retract in the child only.
    let pattern = session.parse("P(a)").unwrap();
    let h2 = session.kb.resolve("H2").unwrap();
    let n = session.kb.retract(&mut session.terms, pattern, h2).unwrap();
    assert_eq!(n, 1);

    let stmt = session.parse("P(a)").unwrap();
    let h1 = session.kb.resolve("H1").unwrap();
    assert!(session.kb.exists(&mut session.terms, stmt, &[h1]));
    assert!(!session.kb.exists(&mut session.terms, stmt, &[h2]));
}
