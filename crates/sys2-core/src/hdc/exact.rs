//! Exact structural codec (default)
//!
//! Instead of approximating the bind/bundle algebra with noise-tolerant
//! geometry, this codec carries it symbolically: a vector is a superposition
//! of *products*, and each product is the symmetric-difference set of the
//! atom names bound into it. Binding distributes over superpositions, so
//! unbinding a partial query from a bundled knowledge base yields exactly
//! the residual atoms — which is what makes this the reference codec for
//! correctness runs.

use super::{push_u32, read_u32, Result, Strategy, StrategyError, Thresholds, Vector, STRATEGY_EXACT};
use std::collections::BTreeSet;

/// Membership is exact, so the match levels are effectively boolean.
const EXACT_THRESHOLDS: Thresholds = Thresholds {
    very_strong_match: 0.999,
    strong_match: 0.5,
    rule_confidence: 0.6,
    condition_confidence: 0.5,
    confidence_decay: 0.9,
    orthogonality: 0.5,
    decode_top_k: 5,
    keep_unverified: false,
};

type Product = BTreeSet<String>;

/// Exact structural strategy
#[derive(Debug, Default)]
pub struct ExactStrategy;

impl ExactStrategy {
    pub fn new() -> Self {
        Self
    }

    fn products_of<'a>(&self, v: &'a Vector) -> Result<&'a BTreeSet<Product>> {
        match v {
            Vector::Exact { products } => Ok(products),
            other => Err(StrategyError::KindMismatch {
                strategy: STRATEGY_EXACT,
                got: other.kind(),
            }),
        }
    }
}

impl Strategy for ExactStrategy {
    fn id(&self) -> &'static str {
        STRATEGY_EXACT
    }

    fn validate(&self, _geometry: usize) -> Result<()> {
        // The structural codec has no geometry; any requested size is fine.
        Ok(())
    }

    fn create_from_name(&self, name: &str, _geometry: usize) -> Vector {
        let mut product = BTreeSet::new();
        product.insert(name.to_string());
        let mut products = BTreeSet::new();
        products.insert(product);
        Vector::Exact { products }
    }

    fn bind(&self, a: &Vector, b: &Vector) -> Result<Vector> {
        let pa = self.products_of(a)?;
        let pb = self.products_of(b)?;
        // Bind distributes over superpositions; each pairing is a symmetric
        // difference, so binding twice with the same operand cancels.
        let mut products = BTreeSet::new();
        for p in pa {
            for q in pb {
                products.insert(p.symmetric_difference(q).cloned().collect());
            }
        }
        Ok(Vector::Exact { products })
    }

    fn bundle(&self, vectors: &[Vector]) -> Result<Vector> {
        if vectors.is_empty() {
            return Err(StrategyError::EmptyBundle);
        }
        let mut products = BTreeSet::new();
        for v in vectors {
            products.extend(self.products_of(v)?.iter().cloned());
        }
        Ok(Vector::Exact { products })
    }

    fn similarity(&self, a: &Vector, b: &Vector) -> f64 {
        let (Ok(pa), Ok(pb)) = (self.products_of(a), self.products_of(b)) else {
            return 0.0;
        };
        // Whole-product overlap normalized by the smaller superposition:
        // a fact inside a KB bundle scores 1.0, unrelated atoms 0.0.
        match (pa.len(), pb.len()) {
            (0, 0) => 1.0,
            (0, _) | (_, 0) => 0.0,
            (la, lb) => {
                let shared = pa.intersection(pb).count();
                shared as f64 / la.min(lb) as f64
            }
        }
    }

    fn extend(&self, _v: &Vector, _new_geometry: usize) -> Result<Vector> {
        Err(StrategyError::Unsupported {
            strategy: STRATEGY_EXACT,
            operation: "extend",
        })
    }

    fn thresholds(&self) -> &Thresholds {
        &EXACT_THRESHOLDS
    }

    fn serialize(&self, v: &Vector) -> Vec<u8> {
        let Vector::Exact { products } = v else {
            return Vec::new();
        };
        let mut out = vec![b'E'];
        push_u32(&mut out, products.len() as u32);
        for product in products {
            push_u32(&mut out, product.len() as u32);
            for atom in product {
                push_u32(&mut out, atom.len() as u32);
                out.extend_from_slice(atom.as_bytes());
            }
        }
        out
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Vector> {
        if bytes.first() != Some(&b'E') {
            return Err(StrategyError::Malformed("missing exact tag".into()));
        }
        let mut at = 1usize;
        let product_count = read_u32(bytes, at)? as usize;
        at += 4;
        let mut products = BTreeSet::new();
        for _ in 0..product_count {
            let atom_count = read_u32(bytes, at)? as usize;
            at += 4;
            let mut product = BTreeSet::new();
            for _ in 0..atom_count {
                let len = read_u32(bytes, at)? as usize;
                at += 4;
                let slice = bytes
                    .get(at..at + len)
                    .ok_or_else(|| StrategyError::Malformed("truncated atom name".into()))?;
                let atom = std::str::from_utf8(slice)
                    .map_err(|_| StrategyError::Malformed("atom name is not UTF-8".into()))?;
                product.insert(atom.to_string());
                at += len;
            }
            products.insert(product);
        }
        if at != bytes.len() {
            return Err(StrategyError::Malformed("trailing bytes".into()));
        }
        Ok(Vector::Exact { products })
    }
}

// ============================================================================
// TESTS
// ============================================================================
