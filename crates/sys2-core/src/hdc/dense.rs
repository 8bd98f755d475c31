//! Dense binary codec
//!
//! Packed-bit vectors with XOR binding and bitwise-majority bundling. This
//! is the production codec for stress and evaluation runs, typically at
//! geometry 32768.
//!
//! Algebra:
//! - bind = bitwise XOR (exactly self-inverse)
//! - bundle = per-bit majority vote with a deterministic tie-break stream
//! - similarity = `max(0, 1 - 2 * hamming / geometry)` so identical vectors
//!   score 1.0 and uncorrelated vectors score near 0.0

use super::{
    fnv1a64, push_u32, read_u32, Result, SplitMix64, Strategy, StrategyError, Thresholds, Vector,
    FNV_OFFSET, STRATEGY_DENSE_BINARY,
};

/// Bits per storage limb
const LIMB_BITS: usize = 32;

/// Thresholds calibrated for majority bundles of a few thousand facts: the
/// agreement signal of one member inside an N-fact bundle scales with
/// 1/sqrt(N), so match levels sit just above the geometry noise floor.
const DENSE_THRESHOLDS: Thresholds = Thresholds {
    very_strong_match: 0.05,
    strong_match: 0.02,
    rule_confidence: 0.4,
    condition_confidence: 0.3,
    confidence_decay: 0.9,
    orthogonality: 0.02,
    decode_top_k: 5,
    keep_unverified: false,
};

/// Dense binary strategy (bitwise XOR / majority)
#[derive(Debug, Default)]
pub struct DenseBinaryStrategy;

impl DenseBinaryStrategy {
    pub fn new() -> Self {
        Self
    }

    fn limbs_of<'a>(&self, v: &'a Vector) -> Result<(usize, &'a [u32])> {
        match v {
            Vector::Dense { geometry, limbs } => Ok((*geometry, limbs)),
            other => Err(StrategyError::KindMismatch {
                strategy: STRATEGY_DENSE_BINARY,
                got: other.kind(),
            }),
        }
    }
}

/// Deterministic tie-break bit stream for even-split majority votes.
///
/// Seeded from the geometry only, so bundling the same multiset of vectors
/// always resolves ties identically.
fn tiebreak_stream(geometry: usize) -> SplitMix64 {
    let seed = fnv1a64(b"__bundle_tiebreak__", FNV_OFFSET) ^ geometry as u64;
    SplitMix64::from_seed(seed)
}

impl Strategy for DenseBinaryStrategy {
    fn id(&self) -> &'static str {
        STRATEGY_DENSE_BINARY
    }

    fn validate(&self, geometry: usize) -> Result<()> {
        if geometry == 0 || geometry % LIMB_BITS != 0 {
            return Err(StrategyError::InvalidGeometry {
                strategy: STRATEGY_DENSE_BINARY,
                geometry,
                reason: format!("must be a positive multiple of {}", LIMB_BITS),
            });
        }
        Ok(())
    }

    fn create_from_name(&self, name: &str, geometry: usize) -> Vector {
        let mut stream = SplitMix64::from_name(name);
        let limb_count = geometry / LIMB_BITS;
        let mut limbs = Vec::with_capacity(limb_count);
        while limbs.len() < limb_count {
            let word = stream.next_u64();
            limbs.push(word as u32);
            if limbs.len() < limb_count {
                limbs.push((word >> 32) as u32);
            }
        }
        Vector::Dense { geometry, limbs }
    }

    fn bind(&self, a: &Vector, b: &Vector) -> Result<Vector> {
        let (ga, la) = self.limbs_of(a)?;
        let (gb, lb) = self.limbs_of(b)?;
        if ga != gb {
            return Err(StrategyError::GeometryMismatch { left: ga, right: gb });
        }
        let limbs = la.iter().zip(lb.iter()).map(|(x, y)| x ^ y).collect();
        Ok(Vector::Dense { geometry: ga, limbs })
    }

    fn bundle(&self, vectors: &[Vector]) -> Result<Vector> {
        let first = vectors.first().ok_or(StrategyError::EmptyBundle)?;
        let (geometry, _) = self.limbs_of(first)?;
        if vectors.len() == 1 {
            return Ok(first.clone());
        }

        // Per-bit vote counts, then majority with tie-break on even splits.
        let mut counts = vec![0u32; geometry];
        for v in vectors {
            let (g, limbs) = self.limbs_of(v)?;
            if g != geometry {
                return Err(StrategyError::GeometryMismatch { left: geometry, right: g });
            }
            for (i, count) in counts.iter_mut().enumerate() {
                if limbs[i / LIMB_BITS] >> (i % LIMB_BITS) & 1 == 1 {
                    *count += 1;
                }
            }
        }

        let n = vectors.len() as u32;
        let mut ties = tiebreak_stream(geometry);
        let mut tie_word = 0u64;
        let mut tie_bits = 0usize;
        let mut limbs = vec![0u32; geometry / LIMB_BITS];
        for (i, count) in counts.iter().enumerate() {
            let set = if count * 2 == n {
                if tie_bits == 0 {
                    tie_word = ties.next_u64();
                    tie_bits = 64;
                }
                let bit = tie_word & 1 == 1;
                tie_word >>= 1;
                tie_bits -= 1;
                bit
            } else {
                count * 2 > n
            };
            if set {
                limbs[i / LIMB_BITS] |= 1 << (i % LIMB_BITS);
            }
        }
        Ok(Vector::Dense { geometry, limbs })
    }

    fn similarity(&self, a: &Vector, b: &Vector) -> f64 {
        let (Ok((ga, la)), Ok((gb, lb))) = (self.limbs_of(a), self.limbs_of(b)) else {
            return 0.0;
        };
        if ga != gb {
            return 0.0;
        }
        let hamming: u32 = la
            .iter()
            .zip(lb.iter())
            .map(|(x, y)| (x ^ y).count_ones())
            .sum();
        (1.0 - 2.0 * f64::from(hamming) / ga as f64).max(0.0)
    }

    fn extend(&self, v: &Vector, new_geometry: usize) -> Result<Vector> {
        let (geometry, limbs) = self.limbs_of(v)?;
        self.validate(new_geometry)?;
        if new_geometry < geometry {
            return Err(StrategyError::InvalidGeometry {
                strategy: STRATEGY_DENSE_BINARY,
                geometry: new_geometry,
                reason: format!("extend cannot shrink below {}", geometry),
            });
        }
        // Existing limbs are preserved verbatim; the continuation is seeded
        // from the existing content so extension stays deterministic.
        let mut extended = limbs.to_vec();
        let mut seed = FNV_OFFSET;
        for limb in limbs {
            seed = fnv1a64(&limb.to_le_bytes(), seed);
        }
        let mut stream = SplitMix64::from_seed(seed);
        while extended.len() < new_geometry / LIMB_BITS {
            let word = stream.next_u64();
            extended.push(word as u32);
            if extended.len() < new_geometry / LIMB_BITS {
                extended.push((word >> 32) as u32);
            }
        }
        Ok(Vector::Dense {
            geometry: new_geometry,
            limbs: extended,
        })
    }

    fn thresholds(&self) -> &Thresholds {
        &DENSE_THRESHOLDS
    }

    fn serialize(&self, v: &Vector) -> Vec<u8> {
        let Vector::Dense { geometry, limbs } = v else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(8 + limbs.len() * 4);
        out.push(b'D');
        push_u32(&mut out, *geometry as u32);
        for limb in limbs {
            push_u32(&mut out, *limb);
        }
        out
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Vector> {
        if bytes.first() != Some(&b'D') {
            return Err(StrategyError::Malformed("missing dense tag".into()));
        }
        let geometry = read_u32(bytes, 1)? as usize;
        self.validate(geometry)?;
        let limb_count = geometry / LIMB_BITS;
        if bytes.len() != 5 + limb_count * 4 {
            return Err(StrategyError::Malformed(format!(
                "expected {} payload bytes, got {}",
                limb_count * 4,
                bytes.len().saturating_sub(5)
            )));
        }
        let mut limbs = Vec::with_capacity(limb_count);
        for i in 0..limb_count {
            limbs.push(read_u32(bytes, 5 + i * 4)?);
        }
        Ok(Vector::Dense { geometry, limbs })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const GEOMETRY: usize = 2048;

    fn strategy() -> DenseBinaryStrategy {
        DenseBinaryStrategy::new()
    }

    #[test]
    fn test_geometry_must_be_multiple_of_32() {
        assert!(strategy().validate(2048).is_ok());
        assert!(strategy().validate(100).is_err());
        assert!(strategy().validate(0).is_err());
    }

    #[test]
    fn test_create_is_deterministic() {
        let s = strategy();
        assert_eq!(
            s.create_from_name("Fido", GEOMETRY),
            s.create_from_name("Fido", GEOMETRY)
        );
        assert_ne!(
            s.create_from_name("Fido", GEOMETRY),
            s.create_from_name("Rex", GEOMETRY)
        );
    }

    #[test]
    fn test_xor_bind_is_self_inverse() {
        let s = strategy();
        let a = s.create_from_name("role", GEOMETRY);
        let b = s.create_from_name("value", GEOMETRY);
        let bound = s.bind(&a, &b).unwrap();
        assert_eq!(s.bind(&bound, &b).unwrap(), a);
        assert_eq!(s.bind(&bound, &a).unwrap(), b);
    }

    #[test]
    fn test_bundle_similar_to_members() {
        let s = strategy();
        let members: Vec<Vector> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|n| s.create_from_name(n, GEOMETRY))
            .collect();
        let bundled = s.bundle(&members).unwrap();
        let outsider = s.create_from_name("zzz", GEOMETRY);
        for m in &members {
            assert!(s.similarity(&bundled, m) > s.similarity(&bundled, &outsider));
            assert!(s.similarity(&bundled, m) > DENSE_THRESHOLDS.very_strong_match);
        }
    }

    #[test]
    fn test_bundle_is_commutative() {
        let s = strategy();
        let a = s.create_from_name("a", GEOMETRY);
        let b = s.create_from_name("b", GEOMETRY);
        let c = s.create_from_name("c", GEOMETRY);
        let x = s.bundle(&[a.clone(), b.clone(), c.clone()]).unwrap();
        let y = s.bundle(&[c, a, b]).unwrap();
        assert_eq!(x, y);
    }

    #[test]
    fn test_bundle_even_split_is_deterministic() {
        let s = strategy();
        let a = s.create_from_name("a", GEOMETRY);
        let b = s.create_from_name("b", GEOMETRY);
        let x = s.bundle(&[a.clone(), b.clone()]).unwrap();
        let y = s.bundle(&[b, a]).unwrap();
        assert_eq!(x, y);
    }

    #[test]
    fn test_geometry_mismatch_rejected() {
        let s = strategy();
        let a = s.create_from_name("a", 1024);
        let b = s.create_from_name("b", 2048);
        assert!(matches!(
            s.bind(&a, &b),
            Err(StrategyError::GeometryMismatch { .. })
        ));
    }

    #[test]
    fn test_extend_preserves_prefix() {
        let s = strategy();
        let v = s.create_from_name("dog", 1024);
        let extended = s.extend(&v, 4096).unwrap();
        let Vector::Dense { limbs: small, .. } = &v else { unreachable!() };
        let Vector::Dense { limbs: big, geometry } = &extended else { unreachable!() };
        assert_eq!(*geometry, 4096);
        assert_eq!(&big[..small.len()], &small[..]);
        // Extension of the same vector is reproducible
        assert_eq!(s.extend(&v, 4096).unwrap(), extended);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let s = strategy();
        let v = s.create_from_name("serial", GEOMETRY);
        let bytes = s.serialize(&v);
        assert_eq!(s.deserialize(&bytes).unwrap(), v);
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        let s = strategy();
        assert!(s.deserialize(b"").is_err());
        assert!(s.deserialize(b"Xabcd").is_err());
        assert!(s.deserialize(&[b'D', 0, 8, 0, 0, 1]).is_err());
    }
}
