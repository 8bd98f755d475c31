//! Knowledge base
//!
//! The bundled KB vector plus the indexed, append-only fact list. The bundle
//! invariant: `kb_vector` always equals the strategy bundle of every indexed
//! fact's vector, recomputed deterministically on each insert so no fact
//! fades with age.
//!
//! Contradiction checking happens one layer up (the session runs the
//! detector against this index before committing an insert); the knowledge
//! base itself only enforces capacity and structural invariants.

mod fact;
mod index;

pub use fact::{CanonicalMetadata, Fact, FactId};
pub use index::FactIndex;

use crate::hdc::{Strategy, StrategyError, Vector};
use chrono::Utc;
use std::sync::Arc;

/// Default fact-list ceiling
pub const DEFAULT_MAX_FACTS: usize = 1_000_000;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Knowledge base error type
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum KbError {
    /// Fact list is full
    #[error("Knowledge base capacity reached: {count}/{limit}")]
    Capacity { count: usize, limit: usize },
    /// Underlying codec failure
    #[error(transparent)]
    Strategy(#[from] StrategyError),
}

/// Knowledge base result type
pub type Result<T> = std::result::Result<T, KbError>;

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Minimal captured state permitting a full rollback of the fact list
#[derive(Debug, Clone)]
pub struct KbSnapshot {
    fact_count: usize,
    kb_vector: Option<Vector>,
}

// ============================================================================
// KNOWLEDGE BASE
// ============================================================================

/// Bundled KB vector plus indexed fact records
pub struct KnowledgeBase {
    strategy: Arc<dyn Strategy>,
    max_facts: usize,
    kb_vector: Option<Vector>,
    facts: Vec<Fact>,
    index: FactIndex,
}

impl KnowledgeBase {
    pub fn new(strategy: Arc<dyn Strategy>, max_facts: usize) -> Self {
        Self {
            strategy,
            max_facts,
            kb_vector: None,
            facts: Vec::new(),
            index: FactIndex::new(),
        }
    }

    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// The bundle of every stored fact vector; `None` while empty
    pub fn kb_vector(&self) -> Option<&Vector> {
        self.kb_vector.as_ref()
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn fact(&self, id: FactId) -> Option<&Fact> {
        self.facts.get(id)
    }

    pub fn index(&self) -> &FactIndex {
        &self.index
    }

    /// Append a fact and refresh the bundle. The id is assigned here.
    ///
    /// Callers are expected to have run contradiction detection already; a
    /// rejected statement must never reach this method.
    pub fn add_fact(
        &mut self,
        vector: Vector,
        metadata: CanonicalMetadata,
        source_rule: Option<String>,
        span: Option<crate::dsl::Span>,
    ) -> Result<FactId> {
        self.restore_fact(vector, metadata, source_rule, span, Utc::now())
    }

    /// Append a fact with an explicit creation timestamp (snapshot restore
    /// path; `add_fact` stamps the current time)
    pub fn restore_fact(
        &mut self,
        vector: Vector,
        metadata: CanonicalMetadata,
        source_rule: Option<String>,
        span: Option<crate::dsl::Span>,
        created_at: chrono::DateTime<Utc>,
    ) -> Result<FactId> {
        if self.facts.len() >= self.max_facts {
            return Err(KbError::Capacity {
                count: self.facts.len(),
                limit: self.max_facts,
            });
        }
        let id = self.facts.len();
        let fact = Fact {
            id,
            operator: metadata.operator.clone(),
            args: metadata.args.clone(),
            vector,
            metadata,
            source_rule,
            span,
            created_at,
        };
        self.index.insert(&fact);
        self.facts.push(fact);
        self.rebundle()?;
        Ok(id)
    }

    /// Recompute the bundle over every stored fact vector. Full recompute
    /// keeps all facts at equal weight, which the post-insert similarity
    /// invariant depends on.
    fn rebundle(&mut self) -> Result<()> {
        if self.facts.is_empty() {
            self.kb_vector = None;
            return Ok(());
        }
        let vectors: Vec<Vector> = self.facts.iter().map(|f| f.vector.clone()).collect();
        self.kb_vector = Some(self.strategy.bundle(&vectors)?);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn find_by_operator(&self, op: &str) -> Vec<&Fact> {
        self.resolve(self.index.by_operator(op))
    }

    pub fn find_by_operator_and_arg0(&self, op: &str, arg0: &str) -> Vec<&Fact> {
        self.resolve(self.index.by_operator_arg0(op, arg0))
    }

    pub fn find_by_operator_and_arg1(&self, op: &str, arg1: &str) -> Vec<&Fact> {
        self.resolve(self.index.by_operator_arg1(op, arg1))
    }

    /// Exact stored statement matching the canonical key, if any
    pub fn find_canonical(&self, metadata: &CanonicalMetadata) -> Option<&Fact> {
        self.index
            .by_canonical_key(&metadata.canonical_key())
            .first()
            .and_then(|id| self.facts.get(*id))
    }

    pub fn contains(&self, metadata: &CanonicalMetadata) -> bool {
        self.find_canonical(metadata).is_some()
    }

    fn resolve(&self, ids: &[FactId]) -> Vec<&Fact> {
        ids.iter().filter_map(|id| self.facts.get(*id)).collect()
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Capture the state needed to undo any number of subsequent inserts
    pub fn snapshot(&self) -> KbSnapshot {
        KbSnapshot {
            fact_count: self.facts.len(),
            kb_vector: self.kb_vector.clone(),
        }
    }

    /// Truncate to the snapshot prefix, restore the bundle, rebuild indices
    pub fn rollback(&mut self, snapshot: &KbSnapshot) {
        self.facts.truncate(snapshot.fact_count);
        self.kb_vector = snapshot.kb_vector.clone();
        self.index.rebuild(&self.facts);
    }
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("strategy", &self.strategy.id())
            .field("facts", &self.facts.len())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
