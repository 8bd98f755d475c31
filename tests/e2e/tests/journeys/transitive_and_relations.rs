//! Taxonomy chains and declared relation properties

use sys2_e2e_tests::{core_session, dense_session, must_learn};

#[test]
fn transitive_is_a_chain() {
    let mut session = core_session();
    must_learn(
        &mut session,
        "@_ Fido IS_A Dog\n@_ Dog IS_A Mammal\n@_ Mammal IS_A Animal",
    );

    let result = session.prove("@q Fido IS_A Animal").expect("prove runs");
    assert!(result.valid);
    assert_eq!(result.method.as_deref(), Some("transitive"));
    assert!(result.confidence.expect("confidence set") >= 0.7);
    assert_eq!(result.steps.len(), 3);
}

#[test]
fn transitive_chain_fails_without_link() {
    let mut session = core_session();
    must_learn(&mut session, "@_ Fido IS_A Dog\n@_ Cat IS_A Mammal");

    let result = session.prove("@q Fido IS_A Mammal").expect("prove runs");
    assert!(!result.valid);
    assert!(result.reason.is_some());
}

#[test]
fn symmetric_relation() {
    let mut session = core_session();
    must_learn(
        &mut session,
        "@_ MARRIED_TO IS_A symmetric_relation\n@_ Maria MARRIED_TO Ion",
    );

    let result = session.prove("@q Ion MARRIED_TO Maria").expect("prove runs");
    assert!(result.valid);
    assert_eq!(result.method.as_deref(), Some("symmetric"));
}

#[test]
fn inverse_relation() {
    let mut session = core_session();
    must_learn(
        &mut session,
        "inverseOf PARENT_OF CHILD_OF\n@_ Ion PARENT_OF Maria",
    );

    let result = session.prove("@q Maria CHILD_OF Ion").expect("prove runs");
    assert!(result.valid);
    assert_eq!(result.method.as_deref(), Some("inverse"));
}

#[test]
fn synonym_spellings_converge() {
    let mut session = core_session();
    // `isA` is aliased to IS_A by the core theory; both spellings must
    // canonicalize to the same fact and the same proof outcome.
    must_learn(&mut session, "isA Rex dog");
    let via_alias = session.prove("@q isA Rex dog").expect("prove runs");
    let via_canonical = session.prove("@q Rex IS_A dog").expect("prove runs");
    assert!(via_alias.valid);
    assert!(via_canonical.valid);
}

#[test]
fn rules_apply_with_unification() {
    let mut session = core_session();
    must_learn(
        &mut session,
        "rule gp: IF ($x PARENT_OF $y) AND ($y PARENT_OF $z) THEN ($x GRANDPARENT_OF $z)\n\
         @_ Ion PARENT_OF Maria\n\
         @_ Maria PARENT_OF Ana",
    );

    let result = session.prove("@q Ion GRANDPARENT_OF Ana").expect("prove runs");
    assert!(result.valid);
    assert_eq!(result.method.as_deref(), Some("rule"));
    assert!(result.confidence.expect("confidence") < 1.0);

    let miss = session.prove("@q Ana GRANDPARENT_OF Ion").expect("prove runs");
    assert!(!miss.valid);
}

#[test]
fn dense_binary_production_profile_smoke() {
    // The full production geometry; one pass through learn + prove.
    let mut session = dense_session(32_768);
    must_learn(
        &mut session,
        "@_ Fido IS_A Dog\n@_ Dog IS_A Mammal\n@_ Mammal IS_A Animal",
    );
    let result = session.prove("@q Fido IS_A Animal").expect("prove runs");
    assert!(result.valid);
    assert_eq!(result.method.as_deref(), Some("transitive"));
}
