//! Contradiction detection and transactional rollback

use sys2_core::ContradictionKind;
use sys2_e2e_tests::{core_session, must_learn};

#[test]
fn mutually_exclusive_rejects_and_preserves_state() {
    let mut session = core_session();
    must_learn(
        &mut session,
        "mutuallyExclusive hasState Open Closed\nhasState Door Open",
    );
    let before = session.dump();

    let outcome = session.learn("hasState Door Closed");
    assert!(!outcome.success);
    assert_eq!(outcome.facts_added, 0);
    assert_eq!(outcome.contradictions.len(), 1);

    let contradiction = &outcome.contradictions[0];
    assert_eq!(contradiction.kind, ContradictionKind::MutuallyExclusive);
    assert_eq!(contradiction.severity, "reject");
    assert_eq!(
        contradiction.conflicting_fact.as_deref(),
        Some("hasState Door Open")
    );
    assert!(contradiction.constraint.text.contains("mutuallyExclusive"));
    assert_eq!(
        contradiction.proof.last().map(|s| s.kind.as_str()),
        Some("reject")
    );

    // The whole call rolled back: state is bit-for-bit the pre-call state.
    assert_eq!(session.dump(), before);
}

#[test]
fn batch_with_late_contradiction_rolls_back_entirely() {
    let mut session = core_session();
    must_learn(
        &mut session,
        "mutuallyExclusive hasState Open Closed\nhasState Door Open",
    );
    let before = session.dump();

    // The first statement alone would be fine; the second poisons the batch.
    let outcome = session.learn("@_ Window IS_A opening\nhasState Door Closed");
    assert!(!outcome.success);
    assert_eq!(session.dump(), before);
    assert!(!session.prove("@q Window IS_A opening").expect("prove runs").valid);
}

#[test]
fn swapped_ordering_conflict() {
    let mut session = core_session();
    // The core theory declares `before` as conflicting with its own swap.
    must_learn(&mut session, "before Breakfast Lunch");

    let outcome = session.learn("before Lunch Breakfast");
    assert!(!outcome.success);
    assert_eq!(
        outcome.contradictions[0].kind,
        ContradictionKind::ContradictsSameArgs
    );
}

#[test]
fn taxonomic_disjointness_rejects_transitively() {
    let mut session = core_session();
    must_learn(
        &mut session,
        "disjointWith plant animal\n@_ Fido IS_A dog\n@_ dog IS_A animal",
    );

    let outcome = session.learn("@_ Fido IS_A plant");
    assert!(!outcome.success);
    assert_eq!(outcome.contradictions[0].kind, ContradictionKind::DisjointType);
}

#[test]
fn negative_facts_never_block_positives() {
    let mut session = core_session();
    must_learn(&mut session, "Opus CANNOT fly");
    // Storing the positive after the negation is allowed; the proof engine
    // arbitrates, not the contradiction detector.
    let outcome = session.learn("Opus CAN fly");
    assert!(outcome.success, "{:?}", outcome.errors);
}
