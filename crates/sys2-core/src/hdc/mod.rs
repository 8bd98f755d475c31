//! Hyperdimensional Computing (HDC) strategy layer
//!
//! Pluggable vector codecs supplying the algebra the rest of the engine is
//! built on:
//!
//! - **bind**: attach a role/position to a value; an involution, so binding
//!   twice with the same operand recovers the original
//! - **bundle**: superpose many vectors into one that stays similar to each
//! - **similarity**: normalized score in `[0, 1]`
//! - **create_from_name**: deterministic seeding — same name and geometry
//!   produce the identical vector on every run and machine
//!
//! Strategies are registered in a table keyed by a stable string id and
//! selected at session construction. Each strategy carries its own
//! [`Thresholds`] record; match levels are never hardcoded at call sites.

mod dense;
mod exact;
mod metric;
mod sparse;

pub use dense::DenseBinaryStrategy;
pub use exact::ExactStrategy;
pub use metric::MetricAffineStrategy;
pub use sparse::SparsePolynomialStrategy;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Strategy id of the structural codec (the default)
pub const STRATEGY_EXACT: &str = "exact";

/// Strategy id of the packed-bit codec (production default for stress runs)
pub const STRATEGY_DENSE_BINARY: &str = "dense-binary";

/// Strategy id of the exponent-set codec
pub const STRATEGY_SPARSE_POLYNOMIAL: &str = "sparse-polynomial";

/// Strategy id of the clamped numeric codec
pub const STRATEGY_METRIC_AFFINE: &str = "metric-affine";

/// Production geometry for dense-binary stress and evaluation runs
pub const DEFAULT_DENSE_GEOMETRY: usize = 32_768;

/// Metric-affine component range (mandatory clamping)
pub const METRIC_VALUE_MIN: i8 = -127;

/// Metric-affine component range (mandatory clamping)
pub const METRIC_VALUE_MAX: i8 = 127;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Strategy layer error type
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum StrategyError {
    /// No strategy registered under this id
    #[error("Unknown strategy id: {0}")]
    UnknownStrategy(String),
    /// Geometry rejected by the strategy's `validate`
    #[error("Invalid geometry {geometry} for {strategy}: {reason}")]
    InvalidGeometry {
        strategy: &'static str,
        geometry: usize,
        reason: String,
    },
    /// Two operands with different geometries
    #[error("Geometry mismatch: {left} vs {right}")]
    GeometryMismatch { left: usize, right: usize },
    /// A vector produced by a different codec was passed in
    #[error("Vector kind mismatch: {strategy} cannot operate on a {got} vector")]
    KindMismatch { strategy: &'static str, got: &'static str },
    /// Operation not provided by this strategy
    #[error("Operation '{operation}' is not supported by strategy {strategy}")]
    Unsupported {
        strategy: &'static str,
        operation: &'static str,
    },
    /// Byte payload failed structural validation
    #[error("Malformed vector bytes: {0}")]
    Malformed(String),
    /// Empty input where at least one vector is required
    #[error("Bundle requires at least one input vector")]
    EmptyBundle,
}

/// Strategy layer result type
pub type Result<T> = std::result::Result<T, StrategyError>;

// ============================================================================
// VECTOR
// ============================================================================

/// Opaque hyperdimensional vector.
///
/// Carries its own geometry and representation; only [`Strategy`] operations
/// observe the internals. Higher layers treat vectors as values with a
/// stable content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Vector {
    /// Packed bit buffer, geometry in bits (multiple of 32)
    Dense { geometry: usize, limbs: Vec<u32> },
    /// Set of active exponents below `geometry`
    Sparse {
        geometry: usize,
        exponents: BTreeSet<u32>,
    },
    /// Fixed-length clamped numeric buffer
    Metric { values: Vec<i8> },
    /// Superposition of bound atom products (structural codec)
    ///
    /// Each product is the symmetric-difference set of the atom names bound
    /// into it, so binding is exactly involutive.
    Exact { products: BTreeSet<BTreeSet<String>> },
}

impl Vector {
    /// Geometry (bit length or dimension); 0 for the structural codec
    pub fn geometry(&self) -> usize {
        match self {
            Vector::Dense { geometry, .. } => *geometry,
            Vector::Sparse { geometry, .. } => *geometry,
            Vector::Metric { values } => values.len(),
            Vector::Exact { .. } => 0,
        }
    }

    /// Short name of the representation, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Vector::Dense { .. } => "dense",
            Vector::Sparse { .. } => "sparse",
            Vector::Metric { .. } => "metric",
            Vector::Exact { .. } => "exact",
        }
    }
}

/// Stable content hash of a vector.
///
/// Computed over the strategy id and the serialized representation, so two
/// strategies can never accidentally produce colliding hashes for unrelated
/// vectors. Used for vocabulary reverse lookup and memoization keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VectorHash(pub u64);

impl std::fmt::Display for VectorHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

// ============================================================================
// THRESHOLDS
// ============================================================================

/// Strategy-scoped match thresholds.
///
/// Every similarity comparison in the engine reads these through
/// [`Strategy::thresholds`]; the numbers differ per codec because the noise
/// floor of each representation differs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    /// Direct-match level: a fact vector found inside the KB bundle
    pub very_strong_match: f64,
    /// Weak-match level: last-resort heuristic floor
    pub strong_match: f64,
    /// Minimum confidence for accepting a rule application
    pub rule_confidence: f64,
    /// Minimum confidence for each proved premise
    pub condition_confidence: f64,
    /// Multiplicative decay applied per rule application
    pub confidence_decay: f64,
    /// Reverse-lookup floor: below this two vectors count as orthogonal
    pub orthogonality: f64,
    /// Default number of candidates extracted per query hole
    pub decode_top_k: usize,
    /// Whether decode keeps candidates that fail symbolic verification
    pub keep_unverified: bool,
}

// ============================================================================
// STRATEGY TRAIT
// ============================================================================

/// Pluggable HDC codec.
///
/// Contracts every implementation must honor:
///
/// - `create_from_name(n, g)` is deterministic across runs and machines
/// - `similarity(create_from_name(n), create_from_name(n)) == 1.0`
/// - `similarity(bind(bind(a, b), b), a) >= 1 - epsilon` (involution)
/// - `bundle` is commutative and associative up to deterministic tie-breaks
/// - `serialize`/`deserialize` round-trip byte-identically
pub trait Strategy: std::fmt::Debug + Send + Sync {
    /// Stable registry id
    fn id(&self) -> &'static str;

    /// Validate a geometry before any vector is created with it
    fn validate(&self, geometry: usize) -> Result<()>;

    /// Deterministic seed vector for a named atom
    fn create_from_name(&self, name: &str, geometry: usize) -> Vector;

    /// Role-binding; an involution up to the strategy similarity threshold
    fn bind(&self, a: &Vector, b: &Vector) -> Result<Vector>;

    /// Superposition of one or more vectors
    fn bundle(&self, vectors: &[Vector]) -> Result<Vector>;

    /// Normalized similarity in `[0, 1]`; 1.0 for identical vectors
    fn similarity(&self, a: &Vector, b: &Vector) -> f64;

    /// Lossless upsizing to a larger geometry.
    ///
    /// Strategy-optional; codecs without a meaningful upsizing return
    /// [`StrategyError::Unsupported`].
    fn extend(&self, v: &Vector, new_geometry: usize) -> Result<Vector>;

    /// Match thresholds scoped to this codec
    fn thresholds(&self) -> &Thresholds;

    /// Byte-stable serialization
    fn serialize(&self, v: &Vector) -> Vec<u8>;

    /// Inverse of [`Strategy::serialize`]
    fn deserialize(&self, bytes: &[u8]) -> Result<Vector>;

    /// Stable content hash; mixes the strategy id so hashes never collide
    /// across codecs
    fn hash_vector(&self, v: &Vector) -> VectorHash {
        let mut h = fnv1a64(self.id().as_bytes(), FNV_OFFSET);
        h = fnv1a64(&self.serialize(v), h);
        VectorHash(h)
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

type Registry = Vec<(&'static str, Arc<dyn Strategy>)>;

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| {
        vec![
            (STRATEGY_EXACT, Arc::new(ExactStrategy::new()) as Arc<dyn Strategy>),
            (STRATEGY_DENSE_BINARY, Arc::new(DenseBinaryStrategy::new())),
            (STRATEGY_SPARSE_POLYNOMIAL, Arc::new(SparsePolynomialStrategy::new())),
            (STRATEGY_METRIC_AFFINE, Arc::new(MetricAffineStrategy::new())),
        ]
    })
}

/// Look up a strategy by its stable id
pub fn strategy_for(id: &str) -> Result<Arc<dyn Strategy>> {
    registry()
        .iter()
        .find(|(key, _)| *key == id)
        .map(|(_, s)| Arc::clone(s))
        .ok_or_else(|| StrategyError::UnknownStrategy(id.to_string()))
}

/// All registered strategy ids, in registration order
pub fn registered_ids() -> Vec<&'static str> {
    registry().iter().map(|(key, _)| *key).collect()
}

/// Thresholds for a strategy id without constructing vectors
pub fn get_thresholds(strategy_id: &str) -> Result<Thresholds> {
    Ok(*strategy_for(strategy_id)?.thresholds())
}

// ============================================================================
// DETERMINISTIC SEEDING
// ============================================================================

pub(crate) const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over a byte slice, chainable through `state`
pub(crate) fn fnv1a64(bytes: &[u8], state: u64) -> u64 {
    let mut hash = state;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// SplitMix64 stream used to expand a name seed into vector content.
///
/// Chosen over an RNG crate on purpose: the output is fully specified, so
/// `create_from_name` is reproducible across platforms and releases.
#[derive(Debug, Clone)]
pub(crate) struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub(crate) fn from_name(name: &str) -> Self {
        Self {
            state: fnv1a64(name.as_bytes(), FNV_OFFSET),
        }
    }

    pub(crate) fn from_seed(seed: u64) -> Self {
        Self { state: seed }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }
}

// ============================================================================
// SHARED BYTE HELPERS
// ============================================================================

pub(crate) fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn read_u32(bytes: &[u8], at: usize) -> Result<u32> {
    let slice = bytes
        .get(at..at + 4)
        .ok_or_else(|| StrategyError::Malformed(format!("Truncated at offset {}", at)))?;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

// ============================================================================
// TESTS
// ============================================================================
