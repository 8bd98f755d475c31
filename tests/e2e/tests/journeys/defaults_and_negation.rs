//! Default reasoning with exceptions, and the negation family

use sys2_e2e_tests::{closed_world_session, core_session, must_learn};

#[test]
fn default_with_exception_blocks_definitively() {
    let mut session = core_session();
    must_learn(
        &mut session,
        "bird CAN fly\n\
         penguin IS_A bird\n\
         penguin CANNOT fly\n\
         Opus IS_A penguin",
    );

    let result = session.prove("@g Opus CAN fly").expect("prove runs");
    assert!(!result.valid);
    assert!(result.definitive);
    assert!(
        result.reason.as_deref().expect("reason set").contains("exception"),
        "reason was {:?}",
        result.reason
    );
}

#[test]
fn sibling_without_exception_inherits_default() {
    let mut session = core_session();
    must_learn(
        &mut session,
        "bird CAN fly\n\
         penguin IS_A bird\n\
         penguin CANNOT fly\n\
         sparrow IS_A bird\n\
         Jack IS_A sparrow",
    );

    let result = session.prove("@g Jack CAN fly").expect("prove runs");
    assert!(result.valid);
    assert_eq!(result.method.as_deref(), Some("inheritance"));
}

#[test]
fn negation_open_world_vs_closed_world() {
    // Open world: an unstated negation is not provable.
    let mut open = core_session();
    must_learn(&mut open, "dog IS_A mammal");
    let result = open.prove("@g Not (flies Dog)").expect("prove runs");
    assert!(!result.valid);
    assert_eq!(
        result.reason.as_deref(),
        Some("Not goal requires explicit negation (open world)")
    );

    // Closed world: unprovable means false, so the negation holds.
    let mut closed = closed_world_session();
    must_learn(&mut closed, "dog IS_A mammal");
    let result = closed.prove("@g Not (flies Dog)").expect("prove runs");
    assert!(result.valid);
    assert_eq!(result.method.as_deref(), Some("closed_world_assumption"));
}

#[test]
fn explicit_negation_wins_in_both_modes() {
    for mut session in [core_session(), closed_world_session()] {
        must_learn(&mut session, "Opus CANNOT fly");
        let result = session.prove("@g Not (Opus CAN fly)").expect("prove runs");
        assert!(result.valid);
        assert_eq!(result.method.as_deref(), Some("explicit_negation"));
    }
}

#[test]
fn negation_of_provable_statement_fails() {
    let mut session = closed_world_session();
    must_learn(&mut session, "@_ Fido IS_A Dog");
    let result = session.prove("@g Not (Fido IS_A Dog)").expect("prove runs");
    assert!(!result.valid);
}

#[test]
fn rule_derived_negation() {
    let mut session = core_session();
    must_learn(
        &mut session,
        "rule grounded: IF ($x IS_A penguin) THEN (Not ($x CAN fly))\n\
         @_ Opus IS_A penguin",
    );
    let result = session.prove("@g Not (Opus CAN fly)").expect("prove runs");
    assert!(result.valid);
    assert_eq!(result.method.as_deref(), Some("rule_negation"));
}

#[test]
fn disjoint_types_refute_membership() {
    let mut session = core_session();
    must_learn(
        &mut session,
        "disjointWith cat dog\n@_ Fido IS_A dog",
    );
    let result = session.prove("@g Not (Fido IS_A cat)").expect("prove runs");
    assert!(result.valid);
    assert_eq!(result.method.as_deref(), Some("disjointness"));
}

#[test]
fn existential_witness_and_refutation() {
    let mut session = core_session();
    must_learn(
        &mut session,
        "@_ Opus IS_A penguin\n@_ Opus LIVES_IN Antarctica",
    );

    let witness = session
        .prove("@g Exists $x (($x IS_A penguin) AND ($x LIVES_IN Antarctica))")
        .expect("prove runs");
    assert!(witness.valid);
    assert_eq!(witness.method.as_deref(), Some("existence_witness"));

    // A penguin that is not a penguin is structurally impossible.
    let refuted = session
        .prove("@g Not (Exists $x (($x IS_A penguin) AND (Not ($x IS_A penguin))))")
        .expect("prove runs");
    assert!(refuted.valid);
    assert_eq!(
        refuted.method.as_deref(),
        Some("quantifier_type_disjointness")
    );
}
