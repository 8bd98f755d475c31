//! Sparse polynomial codec
//!
//! Vectors are small sets of active exponents below the geometry, read as
//! sparse polynomials over GF(2). Binding is the symmetric difference of
//! exponent sets (XOR in sparse form, exactly self-inverse) and bundling is
//! set union, so a bundle literally contains each member's exponents.

use super::{
    push_u32, read_u32, Result, SplitMix64, Strategy, StrategyError, Thresholds, Vector,
    STRATEGY_SPARSE_POLYNOMIAL,
};
use std::collections::BTreeSet;

/// Active exponents seeded per atom name
const SEED_SPARSITY: usize = 32;

/// Smallest geometry that keeps seeded atoms reliably disjoint
const MIN_GEOMETRY: usize = 64;

/// Jaccard similarity over exponent sets: a member of an N-fact union
/// bundle scores roughly 1/N, so match levels sit near the bundle-capacity
/// floor rather than near 1.0.
const SPARSE_THRESHOLDS: Thresholds = Thresholds {
    very_strong_match: 0.10,
    strong_match: 0.04,
    rule_confidence: 0.5,
    condition_confidence: 0.4,
    confidence_decay: 0.9,
    orthogonality: 0.15,
    decode_top_k: 5,
    keep_unverified: false,
};

/// Sparse polynomial strategy (exponent sets)
#[derive(Debug, Default)]
pub struct SparsePolynomialStrategy;

impl SparsePolynomialStrategy {
    pub fn new() -> Self {
        Self
    }

    fn exponents_of<'a>(&self, v: &'a Vector) -> Result<(usize, &'a BTreeSet<u32>)> {
        match v {
            Vector::Sparse { geometry, exponents } => Ok((*geometry, exponents)),
            other => Err(StrategyError::KindMismatch {
                strategy: STRATEGY_SPARSE_POLYNOMIAL,
                got: other.kind(),
            }),
        }
    }
}

impl Strategy for SparsePolynomialStrategy {
    fn id(&self) -> &'static str {
        STRATEGY_SPARSE_POLYNOMIAL
    }

    fn validate(&self, geometry: usize) -> Result<()> {
        if geometry < MIN_GEOMETRY {
            return Err(StrategyError::InvalidGeometry {
                strategy: STRATEGY_SPARSE_POLYNOMIAL,
                geometry,
                reason: format!("must be at least {}", MIN_GEOMETRY),
            });
        }
        Ok(())
    }

    fn create_from_name(&self, name: &str, geometry: usize) -> Vector {
        let mut stream = SplitMix64::from_name(name);
        let target = SEED_SPARSITY.min(geometry / 2);
        let mut exponents = BTreeSet::new();
        while exponents.len() < target {
            exponents.insert((stream.next_u64() % geometry as u64) as u32);
        }
        Vector::Sparse { geometry, exponents }
    }

    fn bind(&self, a: &Vector, b: &Vector) -> Result<Vector> {
        let (ga, ea) = self.exponents_of(a)?;
        let (gb, eb) = self.exponents_of(b)?;
        if ga != gb {
            return Err(StrategyError::GeometryMismatch { left: ga, right: gb });
        }
        let exponents = ea.symmetric_difference(eb).copied().collect();
        Ok(Vector::Sparse { geometry: ga, exponents })
    }

    fn bundle(&self, vectors: &[Vector]) -> Result<Vector> {
        let first = vectors.first().ok_or(StrategyError::EmptyBundle)?;
        let (geometry, _) = self.exponents_of(first)?;
        let mut exponents = BTreeSet::new();
        for v in vectors {
            let (g, e) = self.exponents_of(v)?;
            if g != geometry {
                return Err(StrategyError::GeometryMismatch { left: geometry, right: g });
            }
            exponents.extend(e.iter().copied());
        }
        Ok(Vector::Sparse { geometry, exponents })
    }

    fn similarity(&self, a: &Vector, b: &Vector) -> f64 {
        let (Ok((ga, ea)), Ok((gb, eb))) = (self.exponents_of(a), self.exponents_of(b)) else {
            return 0.0;
        };
        if ga != gb {
            return 0.0;
        }
        // Jaccard index over exponent sets. Identical sets score 1.0,
        // disjoint seeds 0.0, a member of an N-fact union bundle about 1/N.
        match (ea.len(), eb.len()) {
            (0, 0) => 1.0,
            (0, _) | (_, 0) => 0.0,
            _ => {
                let shared = ea.intersection(eb).count();
                let total = ea.union(eb).count();
                shared as f64 / total as f64
            }
        }
    }

    fn extend(&self, v: &Vector, new_geometry: usize) -> Result<Vector> {
        let (geometry, exponents) = self.exponents_of(v)?;
        self.validate(new_geometry)?;
        if new_geometry < geometry {
            return Err(StrategyError::InvalidGeometry {
                strategy: STRATEGY_SPARSE_POLYNOMIAL,
                geometry: new_geometry,
                reason: format!("extend cannot shrink below {}", geometry),
            });
        }
        // Exponents stay valid under a larger modulus; nothing is lost.
        Ok(Vector::Sparse {
            geometry: new_geometry,
            exponents: exponents.clone(),
        })
    }

    fn thresholds(&self) -> &Thresholds {
        &SPARSE_THRESHOLDS
    }

    fn serialize(&self, v: &Vector) -> Vec<u8> {
        let Vector::Sparse { geometry, exponents } = v else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(9 + exponents.len() * 4);
        out.push(b'S');
        push_u32(&mut out, *geometry as u32);
        push_u32(&mut out, exponents.len() as u32);
        for e in exponents {
            push_u32(&mut out, *e);
        }
        out
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Vector> {
        if bytes.first() != Some(&b'S') {
            return Err(StrategyError::Malformed("missing sparse tag".into()));
        }
        let geometry = read_u32(bytes, 1)? as usize;
        self.validate(geometry)?;
        let count = read_u32(bytes, 5)? as usize;
        if bytes.len() != 9 + count * 4 {
            return Err(StrategyError::Malformed(format!(
                "expected {} exponent bytes, got {}",
                count * 4,
                bytes.len().saturating_sub(9)
            )));
        }
        let mut exponents = BTreeSet::new();
        for i in 0..count {
            let e = read_u32(bytes, 9 + i * 4)?;
            if e as usize >= geometry {
                return Err(StrategyError::Malformed(format!(
                    "exponent {} outside geometry {}",
                    e, geometry
                )));
            }
            exponents.insert(e);
        }
        Ok(Vector::Sparse { geometry, exponents })
    }
}

// ============================================================================
// TESTS
// ============================================================================
