//! Shared harness for the end-to-end suite
//!
//! Builders for the session configurations the scenarios exercise: the
//! default `exact` profile with the core theory pack, the same profile under
//! the closed-world assumption, and the dense-binary production profile.

use sys2_core::{Session, SessionConfig, STRATEGY_DENSE_BINARY};

/// Default profile: `exact` strategy, core theory loaded
pub fn core_session() -> Session {
    Session::new(SessionConfig::default()).expect("default session constructs")
}

/// Default profile with the closed-world assumption on
pub fn closed_world_session() -> Session {
    let config = SessionConfig {
        closed_world: true,
        ..SessionConfig::default()
    };
    Session::new(config).expect("closed-world session constructs")
}

/// Production stress profile: dense-binary at a reduced geometry so the
/// suite stays fast (the full 32768 geometry is covered by one smoke test)
pub fn dense_session(geometry: usize) -> Session {
    let config = SessionConfig {
        strategy_id: STRATEGY_DENSE_BINARY.to_string(),
        geometry,
        ..SessionConfig::default()
    };
    Session::new(config).expect("dense session constructs")
}

/// Learn and assert success, with the errors in the panic message
pub fn must_learn(session: &mut Session, source: &str) {
    let outcome = session.learn(source);
    assert!(
        outcome.success,
        "learn failed: {:?} / {:?}",
        outcome.errors, outcome.contradictions
    );
}
