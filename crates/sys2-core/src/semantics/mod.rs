//! Semantic index and canonicalization
//!
//! A read-mostly table derived from the currently loaded theory: operator
//! property sets (transitive, symmetric, reflexive, inheritable), the
//! inverse-relation map, the synonym/canonical alias map, negation operator
//! pairs, and the constraint declarations the contradiction detector
//! enforces. The index is a deterministic function of the stored facts and
//! is re-derived on every theory change, never edited ad-hoc.
//!
//! Canonicalization happens at metadata-build time: aliases are replaced by
//! their canonical representative and negation-paired operators (`CANNOT`)
//! are rewritten into explicit `Not` form, so two formulations of the same
//! statement index identically.

mod contradiction;

pub use contradiction::{
    Contradiction, ContradictionDetector, ContradictionKind, ContradictionProofStep,
};
pub(crate) use contradiction::type_closure;

use crate::kb::{CanonicalMetadata, KnowledgeBase};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

// ============================================================================
// DECLARATION VOCABULARY
// ============================================================================

/// Taxonomy operator every structural walk keys on (after canonicalization)
pub const TYPE_OPERATOR: &str = "IS_A";

/// Explicit negation operator
pub const NOT_OPERATOR: &str = "Not";

const TRANSITIVE_MARKERS: [&str; 2] = ["transitive_relation", "__TransitiveRelation"];
const SYMMETRIC_MARKERS: [&str; 2] = ["symmetric_relation", "__SymmetricRelation"];
const REFLEXIVE_MARKERS: [&str; 2] = ["reflexive_relation", "__ReflexiveRelation"];
const INHERITABLE_MARKERS: [&str; 2] = ["inheritable_property", "__InheritableProperty"];

// ============================================================================
// CONSTRAINT RECORDS
// ============================================================================

/// Where a constraint declaration came from, for proof rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintSource {
    /// Rendered declaration text
    pub text: String,
    /// Declaring line, when the declaration came from parsed source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// `mutuallyExclusive op valueA valueB`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutualExclusion {
    pub operator: String,
    pub value_a: String,
    pub value_b: String,
    pub source: ConstraintSource,
}

/// `disjointWith typeA typeB` (symmetric)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disjointness {
    pub type_a: String,
    pub type_b: String,
    pub source: ConstraintSource,
}

// ============================================================================
// SEMANTIC INDEX
// ============================================================================

/// Derived operator properties, aliases, and constraints
#[derive(Debug, Default)]
pub struct SemanticIndex {
    transitive_ops: FxHashSet<String>,
    symmetric_ops: FxHashSet<String>,
    reflexive_ops: FxHashSet<String>,
    inheritable_ops: FxHashSet<String>,
    inverse_of: FxHashMap<String, String>,
    /// alias -> canonical representative (fully resolved, no chains)
    canonical_of: FxHashMap<String, String>,
    /// negated operator -> its positive counterpart (e.g. CANNOT -> CAN)
    negation_of: FxHashMap<String, String>,
    mutual_exclusions: Vec<MutualExclusion>,
    contradicts_same_args: FxHashMap<String, ConstraintSource>,
    disjointness: Vec<Disjointness>,
}

impl SemanticIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-derive the whole index from the stored facts. Called after every
    /// learn/load that changed the theory.
    pub fn derive(kb: &KnowledgeBase) -> Self {
        let mut index = Self::new();
        // Alias pairs are collected first so every other declaration can be
        // read through them.
        let mut raw_alias: FxHashMap<String, String> = FxHashMap::default();
        for fact in kb.facts() {
            match (fact.operator.as_str(), fact.args.as_slice()) {
                ("synonym", [alias, canonical]) => {
                    raw_alias.insert(alias.clone(), canonical.clone());
                }
                ("canonical", [canonical, alias]) => {
                    raw_alias.insert(alias.clone(), canonical.clone());
                }
                _ => {}
            }
        }
        index.canonical_of = resolve_alias_chains(raw_alias);

        for fact in kb.facts() {
            let line = fact.span.map(|s| s.line);
            let source = ConstraintSource {
                text: fact.render(),
                line,
            };
            let op = index.canonical_atom(&fact.operator);
            let args: Vec<String> = fact.args.iter().map(|a| index.canonical_atom(a)).collect();
            match (op.as_str(), args.as_slice()) {
                (TYPE_OPERATOR, [subject, marker]) => {
                    let subject = subject.clone();
                    if TRANSITIVE_MARKERS.contains(&marker.as_str()) {
                        index.transitive_ops.insert(subject);
                    } else if SYMMETRIC_MARKERS.contains(&marker.as_str()) {
                        index.symmetric_ops.insert(subject);
                    } else if REFLEXIVE_MARKERS.contains(&marker.as_str()) {
                        index.reflexive_ops.insert(subject);
                    } else if INHERITABLE_MARKERS.contains(&marker.as_str()) {
                        index.inheritable_ops.insert(subject);
                    }
                }
                ("inverseOf", [a, b]) => {
                    index.inverse_of.insert(a.clone(), b.clone());
                    index.inverse_of.insert(b.clone(), a.clone());
                }
                ("negationOf", [negated, positive]) => {
                    index.negation_of.insert(negated.clone(), positive.clone());
                }
                ("mutuallyExclusive", [operator, value_a, value_b]) => {
                    index.mutual_exclusions.push(MutualExclusion {
                        operator: operator.clone(),
                        value_a: value_a.clone(),
                        value_b: value_b.clone(),
                        source,
                    });
                }
                ("contradictsSameArgs", [operator]) => {
                    index
                        .contradicts_same_args
                        .insert(operator.clone(), source);
                }
                ("disjointWith", [type_a, type_b]) => {
                    index.disjointness.push(Disjointness {
                        type_a: type_a.clone(),
                        type_b: type_b.clone(),
                        source,
                    });
                }
                _ => {}
            }
        }
        index
    }

    // ------------------------------------------------------------------
    // Property queries
    // ------------------------------------------------------------------

    pub fn is_transitive(&self, op: &str) -> bool {
        self.transitive_ops.contains(op)
    }

    pub fn is_symmetric(&self, op: &str) -> bool {
        self.symmetric_ops.contains(op)
    }

    pub fn is_reflexive(&self, op: &str) -> bool {
        self.reflexive_ops.contains(op)
    }

    pub fn is_inheritable(&self, op: &str) -> bool {
        self.inheritable_ops.contains(op)
    }

    pub fn inverse_of(&self, op: &str) -> Option<&str> {
        self.inverse_of.get(op).map(String::as_str)
    }

    /// Positive counterpart of a negation-paired operator
    pub fn negation_target(&self, op: &str) -> Option<&str> {
        self.negation_of.get(op).map(String::as_str)
    }

    pub fn mutual_exclusions(&self) -> &[MutualExclusion] {
        &self.mutual_exclusions
    }

    pub fn contradicts_same_args(&self, op: &str) -> Option<&ConstraintSource> {
        self.contradicts_same_args.get(op)
    }

    pub fn disjointness(&self) -> &[Disjointness] {
        &self.disjointness
    }

    /// True when the two types are declared disjoint (in either order)
    pub fn are_disjoint(&self, a: &str, b: &str) -> Option<&Disjointness> {
        self.disjointness.iter().find(|d| {
            (d.type_a == a && d.type_b == b) || (d.type_a == b && d.type_b == a)
        })
    }

    // ------------------------------------------------------------------
    // Canonicalization
    // ------------------------------------------------------------------

    /// Canonical representative of an atom name (identity when unaliased)
    pub fn canonical_atom(&self, name: &str) -> String {
        self.canonical_of
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Every alias that resolves to `canonical`, plus the name itself
    pub fn aliases_of(&self, canonical: &str) -> Vec<String> {
        let mut out = vec![canonical.to_string()];
        for (alias, target) in &self.canonical_of {
            if target == canonical {
                out.push(alias.clone());
            }
        }
        out.sort();
        out.dedup();
        out
    }

    /// Normalize metadata: resolve aliases everywhere and rewrite
    /// negation-paired operators into explicit `Not` form. Idempotent.
    pub fn canonicalize(&self, metadata: &CanonicalMetadata) -> CanonicalMetadata {
        let operator = self.canonical_atom(&metadata.operator);
        let args: Vec<String> = metadata.args.iter().map(|a| self.canonical_atom(a)).collect();

        // CANNOT-style operators become Not(CAN ...) so exception blocking
        // and explicit-negation matching key on one form.
        if let Some(positive) = self.negation_target(&operator) {
            let mut normalized = CanonicalMetadata::negation(positive.to_string(), args);
            normalized.level = metadata.level;
            return normalized;
        }

        if operator == NOT_OPERATOR {
            if let (Some(inner_op), Some(inner_args)) =
                (&metadata.inner_operator, &metadata.inner_args)
            {
                let inner_op = self.canonical_atom(inner_op);
                let inner_args: Vec<String> =
                    inner_args.iter().map(|a| self.canonical_atom(a)).collect();
                // The inner side may itself be negation-paired.
                let mut normalized = if let Some(positive) = self.negation_target(&inner_op) {
                    CanonicalMetadata::positive(positive.to_string(), inner_args)
                } else {
                    CanonicalMetadata::negation(inner_op, inner_args)
                };
                normalized.level = metadata.level;
                return normalized;
            }
            // Bare `Not op arg...` without structured inner metadata: the
            // argument tokens spell the negated statement.
            let tokens: Vec<String> = args
                .iter()
                .flat_map(|a| a.split_whitespace())
                .map(|t| self.canonical_atom(t))
                .collect();
            if let Some((inner_op, inner_args)) = tokens.split_first() {
                let mut normalized = if let Some(positive) = self.negation_target(inner_op) {
                    CanonicalMetadata::positive(positive.to_string(), inner_args.to_vec())
                } else {
                    CanonicalMetadata::negation(inner_op.clone(), inner_args.to_vec())
                };
                normalized.level = metadata.level;
                return normalized;
            }
        }

        let mut normalized = CanonicalMetadata::positive(operator, args);
        normalized.inner_operator = metadata.inner_operator.clone();
        normalized.inner_args = metadata.inner_args.clone();
        normalized.level = metadata.level;
        normalized
    }
}

/// True when a fact feeds the derived semantic index, meaning the index
/// must be re-derived after storing it
pub fn is_declaration(metadata: &CanonicalMetadata) -> bool {
    matches!(
        metadata.operator.as_str(),
        "synonym"
            | "canonical"
            | "inverseOf"
            | "negationOf"
            | "mutuallyExclusive"
            | "contradictsSameArgs"
            | "disjointWith"
    ) || (metadata.operator == TYPE_OPERATOR
        && metadata
            .args
            .get(1)
            .map(|marker| {
                let marker = marker.as_str();
                TRANSITIVE_MARKERS.contains(&marker)
                    || SYMMETRIC_MARKERS.contains(&marker)
                    || REFLEXIVE_MARKERS.contains(&marker)
                    || INHERITABLE_MARKERS.contains(&marker)
            })
            .unwrap_or(false))
}

/// Resolve alias chains to their final representative; cycles collapse onto
/// the lexicographically smallest member so resolution stays deterministic.
fn resolve_alias_chains(raw: FxHashMap<String, String>) -> FxHashMap<String, String> {
    let mut resolved = FxHashMap::default();
    for alias in raw.keys() {
        let mut seen = vec![alias.clone()];
        let mut current = alias.clone();
        while let Some(next) = raw.get(&current) {
            if seen.contains(next) {
                // Cycle: pick a stable representative.
                seen.push(next.clone());
                current = seen.iter().min().cloned().unwrap_or(current);
                break;
            }
            seen.push(next.clone());
            current = next.clone();
        }
        if &current != alias {
            resolved.insert(alias.clone(), current);
        }
    }
    resolved
}

// ============================================================================
// TESTS
// ============================================================================
