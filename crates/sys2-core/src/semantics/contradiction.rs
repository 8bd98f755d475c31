//! Contradiction detector
//!
//! Validates each proposed fact against the declared constraints using the
//! fact index. A hit produces a structured [`Contradiction`] with its own
//! proof steps; the session turns that into a transaction rollback. Explicit
//! `Not` facts are never a reason to reject a compatible positive fact —
//! they are stored and left to the proof engine.

use super::{ConstraintSource, SemanticIndex, TYPE_OPERATOR};
use crate::kb::{CanonicalMetadata, KnowledgeBase};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

// ============================================================================
// CONTRADICTION OBJECT
// ============================================================================

/// Which constraint class fired
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContradictionKind {
    MutuallyExclusive,
    ContradictsSameArgs,
    DisjointType,
}

impl std::fmt::Display for ContradictionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContradictionKind::MutuallyExclusive => write!(f, "mutuallyExclusive"),
            ContradictionKind::ContradictsSameArgs => write!(f, "contradictsSameArgs"),
            ContradictionKind::DisjointType => write!(f, "disjointType"),
        }
    }
}

/// One step of the rejection proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContradictionProofStep {
    pub kind: String,
    pub detail: String,
}

/// Structured rejection emitted when a proposed fact violates a constraint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contradiction {
    pub kind: ContradictionKind,
    /// Always `"reject"`; the insert is blocked and the transaction rolled
    /// back
    pub severity: String,
    pub new_fact: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicting_fact: Option<String>,
    pub constraint: ConstraintSource,
    pub proof: Vec<ContradictionProofStep>,
}

impl Contradiction {
    fn new(
        kind: ContradictionKind,
        new_fact: &CanonicalMetadata,
        conflicting_fact: Option<String>,
        constraint: ConstraintSource,
        mut proof: Vec<ContradictionProofStep>,
    ) -> Self {
        proof.push(ContradictionProofStep {
            kind: "reject".into(),
            detail: format!("'{}' violates {} constraint", new_fact.render(), kind),
        });
        Self {
            kind,
            severity: "reject".into(),
            new_fact: new_fact.render(),
            conflicting_fact,
            constraint,
            proof,
        }
    }
}

// ============================================================================
// DETECTOR
// ============================================================================

/// Stateless constraint validator; borrow it whatever is being learned
#[derive(Debug, Default)]
pub struct ContradictionDetector;

impl ContradictionDetector {
    pub fn new() -> Self {
        Self
    }

    /// Check a canonicalized proposed fact. `Some` means the insert must be
    /// rejected and the surrounding transaction rolled back.
    pub fn check(
        &self,
        kb: &KnowledgeBase,
        semantics: &SemanticIndex,
        proposed: &CanonicalMetadata,
    ) -> Option<Contradiction> {
        // Negations never block positives (nor other negations).
        if proposed.is_negation() {
            return None;
        }

        if let Some(hit) = self.check_mutual_exclusion(kb, semantics, proposed) {
            tracing::warn!(fact = %proposed.render(), kind = %hit.kind, "contradiction rejected");
            return Some(hit);
        }
        if let Some(hit) = self.check_same_args_swap(kb, semantics, proposed) {
            tracing::warn!(fact = %proposed.render(), kind = %hit.kind, "contradiction rejected");
            return Some(hit);
        }
        if let Some(hit) = self.check_type_disjointness(kb, semantics, proposed) {
            tracing::warn!(fact = %proposed.render(), kind = %hit.kind, "contradiction rejected");
            return Some(hit);
        }
        None
    }

    /// `mutuallyExclusive op vA vB`: the same subject cannot hold both
    /// values under `op`.
    fn check_mutual_exclusion(
        &self,
        kb: &KnowledgeBase,
        semantics: &SemanticIndex,
        proposed: &CanonicalMetadata,
    ) -> Option<Contradiction> {
        let [subject, value] = proposed.args.as_slice() else {
            return None;
        };
        for constraint in semantics.mutual_exclusions() {
            if constraint.operator != proposed.operator {
                continue;
            }
            let other = if *value == constraint.value_a {
                &constraint.value_b
            } else if *value == constraint.value_b {
                &constraint.value_a
            } else {
                continue;
            };
            let Some(existing) = kb
                .find_by_operator_and_arg0(&proposed.operator, subject)
                .into_iter()
                .find(|f| f.args.get(1) == Some(other))
            else {
                continue;
            };
            return Some(Contradiction::new(
                ContradictionKind::MutuallyExclusive,
                proposed,
                Some(existing.render()),
                constraint.source.clone(),
                vec![
                    ContradictionProofStep {
                        kind: "constraint".into(),
                        detail: constraint.source.text.clone(),
                    },
                    ContradictionProofStep {
                        kind: "fact".into(),
                        detail: existing.render(),
                    },
                ],
            ));
        }
        None
    }

    /// `contradictsSameArgs op`: the swapped form of an ordering operator
    /// conflicts (e.g. `before A B` vs `before B A`).
    fn check_same_args_swap(
        &self,
        kb: &KnowledgeBase,
        semantics: &SemanticIndex,
        proposed: &CanonicalMetadata,
    ) -> Option<Contradiction> {
        let source = semantics.contradicts_same_args(&proposed.operator)?;
        let [a, b] = proposed.args.as_slice() else {
            return None;
        };
        let swapped = CanonicalMetadata::positive(
            proposed.operator.clone(),
            vec![b.clone(), a.clone()],
        );
        let existing = kb.find_canonical(&swapped)?;
        Some(Contradiction::new(
            ContradictionKind::ContradictsSameArgs,
            proposed,
            Some(existing.render()),
            source.clone(),
            vec![
                ContradictionProofStep {
                    kind: "constraint".into(),
                    detail: source.text.clone(),
                },
                ContradictionProofStep {
                    kind: "fact".into(),
                    detail: existing.render(),
                },
            ],
        ))
    }

    /// Taxonomic disjointness: `isA(x, B)` is rejected when `isA(x, A)`
    /// already holds (directly or transitively) and `disjointWith(A, B)`.
    fn check_type_disjointness(
        &self,
        kb: &KnowledgeBase,
        semantics: &SemanticIndex,
        proposed: &CanonicalMetadata,
    ) -> Option<Contradiction> {
        if proposed.operator != TYPE_OPERATOR {
            return None;
        }
        let [entity, new_type] = proposed.args.as_slice() else {
            return None;
        };
        for existing_type in type_closure(kb, entity) {
            if let Some(constraint) = semantics.are_disjoint(&existing_type, new_type) {
                let direct = kb
                    .find_by_operator_and_arg0(TYPE_OPERATOR, entity)
                    .first()
                    .map(|f| f.render());
                return Some(Contradiction::new(
                    ContradictionKind::DisjointType,
                    proposed,
                    direct,
                    constraint.source.clone(),
                    vec![
                        ContradictionProofStep {
                            kind: "constraint".into(),
                            detail: constraint.source.text.clone(),
                        },
                        ContradictionProofStep {
                            kind: "taxonomy".into(),
                            detail: format!("{} {} {}", entity, TYPE_OPERATOR, existing_type),
                        },
                    ],
                ));
            }
        }
        None
    }
}

/// All types reachable from `entity` over stored `IS_A` facts (BFS with a
/// visited set; the taxonomy may be a DAG).
pub(crate) fn type_closure(kb: &KnowledgeBase, entity: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut frontier = vec![entity.to_string()];
    while let Some(current) = frontier.pop() {
        for fact in kb.find_by_operator_and_arg0(TYPE_OPERATOR, &current) {
            if let Some(parent) = fact.args.get(1) {
                if seen.insert(parent.clone()) {
                    out.push(parent.clone());
                    frontier.push(parent.clone());
                }
            }
        }
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hdc::{strategy_for, STRATEGY_EXACT};
    use crate::kb::DEFAULT_MAX_FACTS;

    fn kb_with(facts: &[(&str, &[&str])]) -> (KnowledgeBase, SemanticIndex) {
        let strategy = strategy_for(STRATEGY_EXACT).unwrap();
        let mut kb = KnowledgeBase::new(strategy.clone(), DEFAULT_MAX_FACTS);
        for (op, args) in facts {
            let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
            let vector = strategy.create_from_name(&format!("{}|{}", op, args.join("|")), 0);
            kb.add_fact(vector, CanonicalMetadata::positive(*op, args), None, None)
                .unwrap();
        }
        let semantics = SemanticIndex::derive(&kb);
        (kb, semantics)
    }

    fn meta(op: &str, args: &[&str]) -> CanonicalMetadata {
        CanonicalMetadata::positive(op, args.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_mutually_exclusive_rejects() {
        let (kb, semantics) = kb_with(&[
            ("mutuallyExclusive", &["hasState", "Open", "Closed"]),
            ("hasState", &["Door", "Open"]),
        ]);
        let detector = ContradictionDetector::new();
        let hit = detector
            .check(&kb, &semantics, &meta("hasState", &["Door", "Closed"]))
            .expect("must reject");
        assert_eq!(hit.kind, ContradictionKind::MutuallyExclusive);
        assert_eq!(hit.severity, "reject");
        assert_eq!(hit.conflicting_fact.as_deref(), Some("hasState Door Open"));
        assert!(hit.proof.len() >= 3);
        assert_eq!(hit.proof.last().map(|s| s.kind.as_str()), Some("reject"));
    }

    #[test]
    fn test_mutually_exclusive_other_subject_ok() {
        let (kb, semantics) = kb_with(&[
            ("mutuallyExclusive", &["hasState", "Open", "Closed"]),
            ("hasState", &["Door", "Open"]),
        ]);
        let detector = ContradictionDetector::new();
        assert!(detector
            .check(&kb, &semantics, &meta("hasState", &["Window", "Closed"]))
            .is_none());
    }

    #[test]
    fn test_same_args_swap_rejects() {
        let (kb, semantics) = kb_with(&[
            ("contradictsSameArgs", &["before"]),
            ("before", &["Breakfast", "Lunch"]),
        ]);
        let detector = ContradictionDetector::new();
        let hit = detector
            .check(&kb, &semantics, &meta("before", &["Lunch", "Breakfast"]))
            .expect("must reject");
        assert_eq!(hit.kind, ContradictionKind::ContradictsSameArgs);
    }

    #[test]
    fn test_transitive_type_disjointness_rejects() {
        let (kb, semantics) = kb_with(&[
            ("disjointWith", &["plant", "animal"]),
            ("IS_A", &["Fido", "dog"]),
            ("IS_A", &["dog", "animal"]),
        ]);
        let detector = ContradictionDetector::new();
        let hit = detector
            .check(&kb, &semantics, &meta("IS_A", &["Fido", "plant"]))
            .expect("must reject");
        assert_eq!(hit.kind, ContradictionKind::DisjointType);
    }

    #[test]
    fn test_negation_never_blocks() {
        let (kb, semantics) = kb_with(&[
            ("mutuallyExclusive", &["hasState", "Open", "Closed"]),
            ("hasState", &["Door", "Open"]),
        ]);
        let detector = ContradictionDetector::new();
        let negated =
            CanonicalMetadata::negation("hasState", vec!["Door".into(), "Closed".into()]);
        assert!(detector.check(&kb, &semantics, &negated).is_none());
    }
}
