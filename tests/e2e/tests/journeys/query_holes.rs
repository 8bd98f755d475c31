//! Hole decoding against the bundled KB

use sys2_e2e_tests::{core_session, dense_session, must_learn};

#[test]
fn single_hole_yields_all_verified_children() {
    let mut session = core_session();
    must_learn(
        &mut session,
        "@_ Ion PARENT_OF Maria\n@_ Ion PARENT_OF Mihai\n@_ Dan PARENT_OF Vlad",
    );

    let outcome = session.query("@q Ion PARENT_OF ?who").expect("query runs");
    let answers: Vec<&str> = outcome
        .bindings
        .iter()
        .filter_map(|set| set.get("who"))
        .map(|a| a.answer.as_str())
        .collect();
    assert!(answers.contains(&"Maria"));
    assert!(answers.contains(&"Mihai"));
    assert!(!answers.contains(&"Vlad"));
    for set in &outcome.bindings {
        let answer = set.get("who").expect("hole bound");
        assert!(answer.verified);
        assert!(answer.confidence > 0.0);
    }
}

#[test]
fn hole_in_subject_position() {
    let mut session = core_session();
    must_learn(&mut session, "@_ Ion PARENT_OF Maria");

    let outcome = session.query("@q ?parent PARENT_OF Maria").expect("query runs");
    assert!(outcome
        .bindings
        .iter()
        .any(|set| set.get("parent").map(|a| a.answer.as_str()) == Some("Ion")));
}

#[test]
fn dense_profile_decodes_holes_too() {
    let mut session = dense_session(4096);
    must_learn(
        &mut session,
        "@_ Ion PARENT_OF Maria\n@_ Ion PARENT_OF Mihai",
    );

    let outcome = session.query("@q Ion PARENT_OF ?who").expect("query runs");
    let answers: Vec<&str> = outcome
        .bindings
        .iter()
        .filter_map(|set| set.get("who"))
        .map(|a| a.answer.as_str())
        .collect();
    assert!(answers.contains(&"Maria"));
    assert!(answers.contains(&"Mihai"));
}

#[test]
fn query_results_are_stable_across_repeats() {
    let mut session = core_session();
    must_learn(&mut session, "@_ Ion PARENT_OF Maria");

    let first = session.query("@q Ion PARENT_OF ?who").expect("query runs");
    let second = session.query("@q Ion PARENT_OF ?who").expect("query runs");
    assert_eq!(
        serde_json::to_string(&first).expect("serializes"),
        serde_json::to_string(&second).expect("serializes")
    );
}

#[test]
fn query_cache_invalidated_by_learn() {
    let mut session = core_session();
    must_learn(&mut session, "@_ Ion PARENT_OF Maria");
    let before = session.query("@q Ion PARENT_OF ?who").expect("query runs");
    assert_eq!(before.bindings.len(), 1);

    must_learn(&mut session, "@_ Ion PARENT_OF Mihai");
    let after = session.query("@q Ion PARENT_OF ?who").expect("query runs");
    assert_eq!(after.bindings.len(), 2);
}

#[test]
fn two_holes_enumerate_pairs() {
    let mut session = core_session();
    must_learn(
        &mut session,
        "@_ Ion PARENT_OF Maria\n@_ Dan PARENT_OF Vlad",
    );

    let outcome = session.query("@q ?p PARENT_OF ?c").expect("query runs");
    let pairs: Vec<(String, String)> = outcome
        .bindings
        .iter()
        .filter_map(|set| {
            Some((
                set.get("p")?.answer.clone(),
                set.get("c")?.answer.clone(),
            ))
        })
        .collect();
    assert!(pairs.contains(&("Ion".to_string(), "Maria".to_string())));
    assert!(pairs.contains(&("Dan".to_string(), "Vlad".to_string())));
    assert!(!pairs.contains(&("Ion".to_string(), "Vlad".to_string())));
}

#[test]
fn csp_solutions_answer_queries_from_metadata() {
    let mut session = core_session();
    must_learn(
        &mut session,
        "@_ Red IS_A color\n@_ Green IS_A color\nDIFFERENT Red Green\nDIFFERENT Green Red",
    );
    let problem = sys2_core::CspProblem {
        name: "pick".into(),
        variables: vec![sys2_core::CspVariable {
            name: "x".into(),
            domain_type: "color".into(),
        }],
        constraints: vec![],
        max_solutions: 0,
    };
    let solved = session.solve(&problem).expect("solve runs");
    assert_eq!(solved.solutions.len(), 2);

    // The stored compound facts answer by their authoritative metadata.
    let outcome = session.query("@q cspSolution ?x").expect("query runs");
    let all: Vec<&str> = outcome
        .bindings
        .iter()
        .chain(outcome.alternatives.iter())
        .filter_map(|set| set.get("x"))
        .map(|a| a.answer.as_str())
        .collect();
    assert!(all.contains(&"Red"));
    assert!(all.contains(&"Green"));
}
