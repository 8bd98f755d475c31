//! Universal invariants that must hold for every strategy and session

use sys2_core::{
    registered_ids, strategy_for, Session, SessionConfig, STRATEGY_DENSE_BINARY, STRATEGY_EXACT,
};
use sys2_e2e_tests::{core_session, must_learn};

fn geometry_for(id: &str) -> usize {
    match id {
        STRATEGY_DENSE_BINARY => 2048,
        _ => 512,
    }
}

#[test]
fn create_from_name_is_deterministic_everywhere() {
    for id in registered_ids() {
        let strategy = strategy_for(id).expect("registered");
        let geometry = geometry_for(id);
        let a = strategy.create_from_name("Fido", geometry);
        let b = strategy.create_from_name("Fido", geometry);
        assert_eq!(strategy.similarity(&a, &b), 1.0, "strategy {}", id);

        let other = strategy.create_from_name("Entirely_Unrelated", geometry);
        let sim = strategy.similarity(&a, &other);
        assert!(
            sim < strategy.thresholds().orthogonality + 0.2,
            "strategy {} seeds too-similar atoms ({})",
            id,
            sim
        );
    }
}

#[test]
fn bind_is_involutive_everywhere() {
    for id in registered_ids() {
        let strategy = strategy_for(id).expect("registered");
        let geometry = geometry_for(id);
        let a = strategy.create_from_name("role", geometry);
        let b = strategy.create_from_name("filler", geometry);
        let bound = strategy.bind(&a, &b).expect("bind");
        let unbound = strategy.bind(&bound, &b).expect("unbind");
        assert!(
            strategy.similarity(&unbound, &a) >= 1.0 - 1e-9,
            "strategy {}",
            id
        );
    }
}

#[test]
fn statement_vectors_and_metadata_are_deterministic() {
    let build = || {
        let mut session = core_session();
        must_learn(&mut session, "@_ Fido IS_A Dog\n@_ Opus CANNOT fly");
        session.to_image()
    };
    let first = build();
    let second = build();
    // Vocabulary order, fact order, metadata, and vector bytes all agree
    // across fresh sessions fed the same source.
    assert_eq!(first.vocab_names, second.vocab_names);
    assert_eq!(first.facts.len(), second.facts.len());
    for (a, b) in first.facts.iter().zip(second.facts.iter()) {
        assert_eq!(a.operator, b.operator);
        assert_eq!(a.args, b.args);
        assert_eq!(a.inner_operator, b.inner_operator);
        assert_eq!(a.vector_bytes, b.vector_bytes);
    }
}

#[test]
fn stored_facts_stay_similar_to_the_bundle() {
    for strategy_id in [STRATEGY_EXACT, STRATEGY_DENSE_BINARY] {
        let config = SessionConfig {
            strategy_id: strategy_id.to_string(),
            geometry: geometry_for(strategy_id),
            auto_load_core: false,
            ..SessionConfig::default()
        };
        let mut session = Session::new(config).expect("session");
        for i in 0..10 {
            must_learn(
                &mut session,
                &format!("@_ Item{} HAS property{}", i, i),
            );
        }
        let image = session.to_image();
        let strategy = strategy_for(strategy_id).expect("registered");
        let vectors: Vec<_> = image
            .facts
            .iter()
            .map(|f| strategy.deserialize(&f.vector_bytes).expect("vector"))
            .collect();
        let bundle = strategy.bundle(&vectors).expect("bundle");
        for vector in &vectors {
            assert!(
                strategy.similarity(&bundle, vector) >= strategy.thresholds().strong_match,
                "a fact faded from the {} bundle",
                strategy_id
            );
        }
    }
}

#[test]
fn failed_learn_leaves_dump_unchanged() {
    let mut session = core_session();
    must_learn(
        &mut session,
        "mutuallyExclusive hasState Open Closed\nhasState Door Open",
    );
    let before = session.dump();

    assert!(!session.learn("hasState Door Closed").success);
    assert_eq!(session.dump(), before);

    assert!(!session.learn("@ nonsense ( syntax").success);
    assert_eq!(session.dump(), before);

    assert!(!session.learn("lowercase_op Fido Dog").success);
    assert_eq!(session.dump(), before);
}

#[test]
fn every_prove_terminates_within_budgets() {
    let mut session = core_session();
    // A deliberately cyclic taxonomy plus mutually recursive rules.
    must_learn(
        &mut session,
        "@_ a IS_A b\n@_ b IS_A c\n@_ c IS_A a\n\
         rule r1: IF ($x FOO $y) THEN ($x BAR $y)\n\
         rule r2: IF ($x BAR $y) THEN ($x FOO $y)",
    );
    let result = session.prove("@q a IS_A zzz").expect("prove runs");
    assert!(!result.valid);
    let result = session.prove("@q Left FOO Right").expect("prove runs");
    assert!(!result.valid);
}

#[test]
fn canonicalization_is_idempotent() {
    let mut session = core_session();
    // `isA` and `CANNOT` both rewrite under canonicalization; learning the
    // rewritten spelling must produce the identical stored record.
    must_learn(&mut session, "isA Rex dog\nOpus CANNOT fly");
    let image = session.to_image();
    let rex = image
        .facts
        .iter()
        .find(|f| f.args.first().map(String::as_str) == Some("Rex"))
        .expect("Rex fact stored");
    assert_eq!(rex.operator, "IS_A");
    let opus = image
        .facts
        .iter()
        .find(|f| f.inner_operator.is_some())
        .expect("negation stored");
    assert_eq!(opus.operator, "Not");
    assert_eq!(opus.inner_operator.as_deref(), Some("CAN"));
}

#[test]
fn equivalent_formulations_prove_equally() {
    let mut via_alias = core_session();
    must_learn(&mut via_alias, "isA Fido dog");
    let mut via_canonical = core_session();
    must_learn(&mut via_canonical, "@_ Fido IS_A dog");

    let a = via_alias.prove("@q Fido IS_A dog").expect("prove runs");
    let b = via_canonical.prove("@q Fido IS_A dog").expect("prove runs");
    assert_eq!(a.valid, b.valid);
    assert!(a.valid);
}

#[test]
fn extend_is_lossless_where_supported() {
    let strategy = strategy_for(STRATEGY_DENSE_BINARY).expect("registered");
    let small = strategy.create_from_name("grow", 1024);
    let big = strategy.extend(&small, 8192).expect("dense extend supported");
    assert_eq!(big.geometry(), 8192);

    let exact = strategy_for(STRATEGY_EXACT).expect("registered");
    let v = exact.create_from_name("grow", 0);
    assert!(exact.extend(&v, 128).is_err());
}
