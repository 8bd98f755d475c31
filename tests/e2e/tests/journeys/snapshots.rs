//! Snapshot round-trips through storage adapters

use sys2_core::{FileAdapter, MemoryAdapter, Session, SessionConfig, StorageAdapter, STRATEGY_DENSE_BINARY};
use sys2_e2e_tests::must_learn;

fn dense_config() -> SessionConfig {
    SessionConfig {
        strategy_id: STRATEGY_DENSE_BINARY.to_string(),
        geometry: 2048,
        ..SessionConfig::default()
    }
}

#[test]
fn memory_adapter_roundtrip_preserves_proofs() {
    let mut session = Session::new(dense_config()).expect("session");
    must_learn(
        &mut session,
        "@_ Fido IS_A Dog\n@_ Dog IS_A Mammal\n@_ Mammal IS_A Animal",
    );

    let mut adapter = MemoryAdapter::new();
    session.save_to(&mut adapter, "snapshot").expect("save");

    let mut restored =
        Session::load_from(&adapter, "snapshot", dense_config()).expect("restore");
    assert_eq!(restored.dump().fact_count, session.dump().fact_count);
    assert_eq!(restored.dump().vocab_size, session.dump().vocab_size);

    let result = restored.prove("@q Fido IS_A Animal").expect("prove runs");
    assert!(result.valid);
    assert_eq!(result.method.as_deref(), Some("transitive"));
}

#[test]
fn snapshot_bytes_are_stable_across_save_load_save() {
    let mut session = Session::new(dense_config()).expect("session");
    must_learn(&mut session, "@_ Ion PARENT_OF Maria\n@_ Maria MARRIED_TO Dan");

    let mut adapter = MemoryAdapter::new();
    session.save_to(&mut adapter, "first").expect("save");
    let first = adapter.load("first").expect("load");

    let restored = Session::load_from(&adapter, "first", dense_config()).expect("restore");
    let mut adapter2 = MemoryAdapter::new();
    restored.save_to(&mut adapter2, "second").expect("save");
    let second = adapter2.load("second").expect("load");

    // Fact order is preserved exactly, so the KB image is byte-identical.
    assert_eq!(first, second);
}

#[test]
fn file_adapter_roundtrip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut session = Session::new(dense_config()).expect("session");
    must_learn(&mut session, "@_ Fido IS_A Dog");

    let mut adapter = FileAdapter::new(Some(dir.path().to_path_buf())).expect("adapter");
    session.save_to(&mut adapter, "session-1").expect("save");

    let mut restored =
        Session::load_from(&adapter, "session-1", dense_config()).expect("restore");
    assert!(restored.prove("@q Fido IS_A Dog").expect("prove runs").valid);
}

#[test]
fn theories_roundtrip_as_text() {
    // Theory sources are opaque bytes to the adapter as well.
    let theory = "@_ Fido IS_A Dog\nrule gp: IF ($x IS_A Dog) THEN ($x CAN bark)\n";
    let mut adapter = MemoryAdapter::new();
    adapter.save("theory-pets", theory.as_bytes()).expect("save");

    let bytes = adapter.load("theory-pets").expect("load");
    let text = String::from_utf8(bytes).expect("utf8");
    let mut session = Session::new(SessionConfig::default()).expect("session");
    must_learn(&mut session, &text);
    assert!(session.prove("@q Fido CAN bark").expect("prove runs").valid);
}

#[test]
fn load_rejects_corrupted_snapshot() {
    let mut session = Session::new(dense_config()).expect("session");
    must_learn(&mut session, "@_ Fido IS_A Dog");
    let mut adapter = MemoryAdapter::new();
    session.save_to(&mut adapter, "snap").expect("save");

    let mut bytes = adapter.load("snap").expect("load");
    bytes[0] = b'X';
    adapter.save("snap", &bytes).expect("save corrupt");
    assert!(Session::load_from(&adapter, "snap", dense_config()).is_err());
}
