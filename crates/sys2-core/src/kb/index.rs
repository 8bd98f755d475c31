//! Fact index
//!
//! Four maps over the append-only fact list, all holding non-owning integer
//! ids: by operator, by (operator, arg0), by (operator, arg1), and by the
//! order-sensitive canonical key. Rebuilt from a fact-slice prefix on
//! rollback.

use super::fact::{Fact, FactId};
use rustc_hash::FxHashMap;

/// O(1)-average retrieval maps over the fact list
#[derive(Debug, Default)]
pub struct FactIndex {
    by_op: FxHashMap<String, Vec<FactId>>,
    by_op_arg0: FxHashMap<(String, String), Vec<FactId>>,
    by_op_arg1: FxHashMap<(String, String), Vec<FactId>>,
    by_key: FxHashMap<String, Vec<FactId>>,
}

impl FactIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one fact in every applicable map
    pub fn insert(&mut self, fact: &Fact) {
        self.by_op
            .entry(fact.operator.clone())
            .or_default()
            .push(fact.id);
        if let Some(arg0) = fact.args.first() {
            self.by_op_arg0
                .entry((fact.operator.clone(), arg0.clone()))
                .or_default()
                .push(fact.id);
        }
        if let Some(arg1) = fact.args.get(1) {
            self.by_op_arg1
                .entry((fact.operator.clone(), arg1.clone()))
                .or_default()
                .push(fact.id);
        }
        self.by_key
            .entry(fact.canonical_key())
            .or_default()
            .push(fact.id);
    }

    /// Discard everything and re-register the given facts (rollback path)
    pub fn rebuild(&mut self, facts: &[Fact]) {
        self.by_op.clear();
        self.by_op_arg0.clear();
        self.by_op_arg1.clear();
        self.by_key.clear();
        for fact in facts {
            self.insert(fact);
        }
    }

    pub fn by_operator(&self, op: &str) -> &[FactId] {
        self.by_op.get(op).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn by_operator_arg0(&self, op: &str, arg0: &str) -> &[FactId] {
        self.by_op_arg0
            .get(&(op.to_string(), arg0.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn by_operator_arg1(&self, op: &str, arg1: &str) -> &[FactId] {
        self.by_op_arg1
            .get(&(op.to_string(), arg1.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn by_canonical_key(&self, key: &str) -> &[FactId] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hdc::Vector;
    use crate::kb::fact::CanonicalMetadata;
    use std::collections::BTreeSet;

    fn fact(id: FactId, op: &str, args: &[&str]) -> Fact {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        Fact {
            id,
            operator: op.to_string(),
            args: args.clone(),
            vector: Vector::Exact {
                products: BTreeSet::new(),
            },
            metadata: CanonicalMetadata::positive(op, args),
            source_rule: None,
            span: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_insert_registers_all_maps() {
        let mut index = FactIndex::new();
        let f = fact(0, "PARENT_OF", &["Ion", "Maria"]);
        index.insert(&f);

        assert_eq!(index.by_operator("PARENT_OF"), &[0]);
        assert_eq!(index.by_operator_arg0("PARENT_OF", "Ion"), &[0]);
        assert_eq!(index.by_operator_arg1("PARENT_OF", "Maria"), &[0]);
        assert_eq!(index.by_canonical_key("PARENT_OF|Ion|Maria"), &[0]);
        assert!(index.by_operator("IS_A").is_empty());
    }

    #[test]
    fn test_rebuild_truncates() {
        let mut index = FactIndex::new();
        let facts = vec![
            fact(0, "IS_A", &["Fido", "Dog"]),
            fact(1, "IS_A", &["Dog", "Mammal"]),
        ];
        for f in &facts {
            index.insert(f);
        }
        index.rebuild(&facts[..1]);
        assert_eq!(index.by_operator("IS_A"), &[0]);
        assert!(index.by_operator_arg0("IS_A", "Dog").is_empty());
    }
}
