//! Vocabulary - the atom table
//!
//! Maps atom names to their deterministic vectors and back. Atoms are
//! insertion-ordered so a transaction rollback can truncate the table to its
//! snapshot size; an atom's vector is never mutated after insertion.

use crate::hdc::{Strategy, StrategyError, Vector, VectorHash};
use rustc_hash::FxHashMap;
use std::sync::Arc;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Highest argument position encodable in a statement vector
pub const MAX_POSITIONS: usize = 20;

/// Default atom-table ceiling
pub const DEFAULT_MAX_ATOMS: usize = 100_000;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Vocabulary error type
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum VocabularyError {
    /// Atom table is full
    #[error("Vocabulary capacity reached: {count}/{limit}")]
    Capacity { count: usize, limit: usize },
    /// Position index outside `1..=MAX_POSITIONS`
    #[error("Position {0} outside supported range 1..={MAX_POSITIONS}")]
    Position(usize),
    /// Underlying codec failure
    #[error(transparent)]
    Strategy(#[from] StrategyError),
}

/// Vocabulary result type
pub type Result<T> = std::result::Result<T, VocabularyError>;

// ============================================================================
// VOCABULARY
// ============================================================================

/// Atom table owned by one session
pub struct Vocabulary {
    strategy: Arc<dyn Strategy>,
    geometry: usize,
    max_atoms: usize,
    atoms: FxHashMap<String, Vector>,
    by_hash: FxHashMap<VectorHash, String>,
    /// Insertion order; rollback truncates to a snapshot length
    order: Vec<String>,
    /// Pos1..Pos20, created eagerly so argument encoding never allocates names
    positions: Vec<Vector>,
}

impl Vocabulary {
    /// Create an empty vocabulary for a validated geometry
    pub fn new(strategy: Arc<dyn Strategy>, geometry: usize, max_atoms: usize) -> Result<Self> {
        strategy.validate(geometry)?;
        let positions = (1..=MAX_POSITIONS)
            .map(|i| strategy.create_from_name(&format!("Pos{}", i), geometry))
            .collect();
        Ok(Self {
            strategy,
            geometry,
            max_atoms,
            atoms: FxHashMap::default(),
            by_hash: FxHashMap::default(),
            order: Vec::new(),
            positions,
        })
    }

    pub fn geometry(&self) -> usize {
        self.geometry
    }

    pub fn strategy(&self) -> &Arc<dyn Strategy> {
        &self.strategy
    }

    /// Number of named atoms (position vectors excluded)
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.atoms.contains_key(name)
    }

    /// Idempotent lookup-or-create; the same name always yields the same
    /// vector within a session and across runs
    pub fn get_or_create(&mut self, name: &str) -> Result<Vector> {
        if let Some(v) = self.atoms.get(name) {
            return Ok(v.clone());
        }
        if self.order.len() >= self.max_atoms {
            return Err(VocabularyError::Capacity {
                count: self.order.len(),
                limit: self.max_atoms,
            });
        }
        let vector = self.strategy.create_from_name(name, self.geometry);
        self.by_hash
            .insert(self.strategy.hash_vector(&vector), name.to_string());
        self.atoms.insert(name.to_string(), vector.clone());
        self.order.push(name.to_string());
        Ok(vector)
    }

    /// Vector for an already-known atom
    pub fn get(&self, name: &str) -> Option<&Vector> {
        self.atoms.get(name)
    }

    /// Stable content hash used for reverse lookup and memo keys
    pub fn hash_vector(&self, v: &Vector) -> VectorHash {
        self.strategy.hash_vector(v)
    }

    /// Exact reverse lookup by content hash
    pub fn name_of(&self, v: &Vector) -> Option<&str> {
        self.by_hash
            .get(&self.strategy.hash_vector(v))
            .map(String::as_str)
    }

    /// Top-k known atoms by similarity, floored at the strategy's
    /// orthogonality threshold. Returns `(name, similarity)` pairs sorted by
    /// descending similarity with name as the deterministic tie-break.
    pub fn reverse_lookup(&self, v: &Vector, top_k: usize) -> Vec<(String, f64)> {
        let floor = self.strategy.thresholds().orthogonality;
        let mut scored: Vec<(String, f64)> = self
            .order
            .iter()
            .filter_map(|name| {
                let atom = self.atoms.get(name)?;
                let sim = self.strategy.similarity(v, atom);
                (sim >= floor).then(|| (name.clone(), sim))
            })
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(top_k);
        scored
    }

    /// Position vector for `i in 1..=MAX_POSITIONS`
    pub fn position_vector(&self, i: usize) -> Result<&Vector> {
        if i == 0 || i > MAX_POSITIONS {
            return Err(VocabularyError::Position(i));
        }
        Ok(&self.positions[i - 1])
    }

    /// Atom names in insertion order (serialization walks this)
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Rollback support: drop every atom inserted after `len`
    pub fn truncate(&mut self, len: usize) {
        while self.order.len() > len {
            if let Some(name) = self.order.pop() {
                if let Some(vector) = self.atoms.remove(&name) {
                    self.by_hash.remove(&self.strategy.hash_vector(&vector));
                }
            }
        }
    }
}

impl std::fmt::Debug for Vocabulary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vocabulary")
            .field("strategy", &self.strategy.id())
            .field("geometry", &self.geometry)
            .field("atoms", &self.order.len())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
