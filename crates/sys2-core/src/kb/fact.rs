//! Fact records and canonical metadata

use crate::dsl::Span;
use crate::hdc::Vector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Non-owning fact reference used by every index
pub type FactId = usize;

/// Normalized (operator, args, optional inner) record attached to every fact
/// and goal after alias and Not-form normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalMetadata {
    pub operator: String,
    pub args: Vec<String>,
    /// For `Not`: the negated operator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_operator: Option<String>,
    /// For `Not`: the negated operator's arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_args: Option<Vec<String>>,
    /// Constructivist level: leaves are 0, a derived statement is one above
    /// its highest premise
    pub level: u32,
}

impl CanonicalMetadata {
    /// Plain positive statement at leaf level
    pub fn positive(operator: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            operator: operator.into(),
            args,
            inner_operator: None,
            inner_args: None,
            level: 0,
        }
    }

    /// Negation of `(inner_operator, inner_args)`
    pub fn negation(inner_operator: impl Into<String>, inner_args: Vec<String>) -> Self {
        let inner_operator = inner_operator.into();
        let rendered = std::iter::once(inner_operator.clone())
            .chain(inner_args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            operator: "Not".to_string(),
            args: vec![rendered],
            inner_operator: Some(inner_operator),
            inner_args: Some(inner_args),
            level: 0,
        }
    }

    pub fn is_negation(&self) -> bool {
        self.inner_operator.is_some()
    }

    /// Order-sensitive canonical key: `op|arg1|arg2|…`.
    ///
    /// Doubles as the proof-engine cycle key; vector hashes are unusable for
    /// that because commutative binding equates permuted-argument goals.
    pub fn canonical_key(&self) -> String {
        let mut key = self.operator.clone();
        for arg in &self.args {
            key.push('|');
            key.push_str(arg);
        }
        key
    }

    /// Human-readable rendering, `op arg1 arg2 …`
    pub fn render(&self) -> String {
        std::iter::once(self.operator.clone())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for CanonicalMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// An immutable stored statement.
///
/// Changes happen by appending new facts or by transaction rollback; a fact
/// is never edited in place.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fact {
    pub id: FactId,
    pub operator: String,
    pub args: Vec<String>,
    /// Statement vector; owned by this fact
    #[serde(skip)]
    pub vector: Vector,
    pub metadata: CanonicalMetadata,
    /// Label of the rule (or solver) that derived this fact, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_rule: Option<String>,
    /// Source position of the declaring statement, kept for constraint
    /// provenance in contradiction reports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    pub created_at: DateTime<Utc>,
}

impl Fact {
    /// Order-sensitive canonical key of the stored statement
    pub fn canonical_key(&self) -> String {
        self.metadata.canonical_key()
    }

    pub fn render(&self) -> String {
        self.metadata.render()
    }
}

// ============================================================================
// TESTS
// ============================================================================
