//! Metric affine codec
//!
//! Fixed-length numeric vectors with components clamped to `[-127, 127]`.
//! Binding is the affine reflection `bind(a, b) = b - a`, which is exactly
//! involutive wherever clamping does not saturate; bundling is the
//! element-wise mean; similarity is clamped cosine.

use super::{
    Result, SplitMix64, Strategy, StrategyError, Thresholds, Vector, METRIC_VALUE_MAX,
    METRIC_VALUE_MIN, STRATEGY_METRIC_AFFINE,
};

const METRIC_THRESHOLDS: Thresholds = Thresholds {
    very_strong_match: 0.35,
    strong_match: 0.15,
    rule_confidence: 0.5,
    condition_confidence: 0.4,
    confidence_decay: 0.9,
    orthogonality: 0.12,
    decode_top_k: 5,
    keep_unverified: false,
};

/// Mandatory component clamp
fn clamp(v: i64) -> i8 {
    v.clamp(i64::from(METRIC_VALUE_MIN), i64::from(METRIC_VALUE_MAX)) as i8
}

/// Metric affine strategy (clamped numeric buffers)
#[derive(Debug, Default)]
pub struct MetricAffineStrategy;

impl MetricAffineStrategy {
    pub fn new() -> Self {
        Self
    }

    fn values_of<'a>(&self, v: &'a Vector) -> Result<&'a [i8]> {
        match v {
            Vector::Metric { values } => Ok(values),
            other => Err(StrategyError::KindMismatch {
                strategy: STRATEGY_METRIC_AFFINE,
                got: other.kind(),
            }),
        }
    }
}

impl Strategy for MetricAffineStrategy {
    fn id(&self) -> &'static str {
        STRATEGY_METRIC_AFFINE
    }

    fn validate(&self, geometry: usize) -> Result<()> {
        if geometry == 0 {
            return Err(StrategyError::InvalidGeometry {
                strategy: STRATEGY_METRIC_AFFINE,
                geometry,
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    fn create_from_name(&self, name: &str, geometry: usize) -> Vector {
        let mut stream = SplitMix64::from_name(name);
        // Seed components in [-63, 63]: the difference of two seeded values
        // then stays inside the clamp, keeping the reflection bind exact for
        // atom pairs. Saturation only appears in deep bind chains.
        let values = (0..geometry)
            .map(|_| clamp((stream.next_u64() % 127) as i64 - 63))
            .collect();
        Vector::Metric { values }
    }

    fn bind(&self, a: &Vector, b: &Vector) -> Result<Vector> {
        let va = self.values_of(a)?;
        let vb = self.values_of(b)?;
        if va.len() != vb.len() {
            return Err(StrategyError::GeometryMismatch {
                left: va.len(),
                right: vb.len(),
            });
        }
        // Reflection through b: involutive because b - (b - a) = a.
        let values = va
            .iter()
            .zip(vb.iter())
            .map(|(x, y)| clamp(i64::from(*y) - i64::from(*x)))
            .collect();
        Ok(Vector::Metric { values })
    }

    fn bundle(&self, vectors: &[Vector]) -> Result<Vector> {
        let first = vectors.first().ok_or(StrategyError::EmptyBundle)?;
        let geometry = self.values_of(first)?.len();
        let mut sums = vec![0i64; geometry];
        for v in vectors {
            let values = self.values_of(v)?;
            if values.len() != geometry {
                return Err(StrategyError::GeometryMismatch {
                    left: geometry,
                    right: values.len(),
                });
            }
            for (sum, x) in sums.iter_mut().zip(values.iter()) {
                *sum += i64::from(*x);
            }
        }
        let n = vectors.len() as i64;
        // Integer mean truncated toward zero keeps bundling deterministic
        // and order-independent.
        let values = sums.iter().map(|sum| clamp(sum / n)).collect();
        Ok(Vector::Metric { values })
    }

    fn similarity(&self, a: &Vector, b: &Vector) -> f64 {
        let (Ok(va), Ok(vb)) = (self.values_of(a), self.values_of(b)) else {
            return 0.0;
        };
        if va.len() != vb.len() {
            return 0.0;
        }
        // Identical buffers score exactly 1.0; the cosine below can land one
        // ulp under it.
        if va == vb {
            return 1.0;
        }
        let mut dot = 0.0f64;
        let mut norm_a = 0.0f64;
        let mut norm_b = 0.0f64;
        for (x, y) in va.iter().zip(vb.iter()) {
            let (x, y) = (f64::from(*x), f64::from(*y));
            dot += x * y;
            norm_a += x * x;
            norm_b += y * y;
        }
        if norm_a == 0.0 || norm_b == 0.0 {
            return if va == vb { 1.0 } else { 0.0 };
        }
        (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
    }

    fn extend(&self, _v: &Vector, _new_geometry: usize) -> Result<Vector> {
        Err(StrategyError::Unsupported {
            strategy: STRATEGY_METRIC_AFFINE,
            operation: "extend",
        })
    }

    fn thresholds(&self) -> &Thresholds {
        &METRIC_THRESHOLDS
    }

    fn serialize(&self, v: &Vector) -> Vec<u8> {
        let Vector::Metric { values } = v else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(5 + values.len());
        out.push(b'M');
        out.extend_from_slice(&(values.len() as u32).to_le_bytes());
        out.extend(values.iter().map(|x| *x as u8));
        out
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Vector> {
        if bytes.first() != Some(&b'M') {
            return Err(StrategyError::Malformed("missing metric tag".into()));
        }
        let geometry = super::read_u32(bytes, 1)? as usize;
        self.validate(geometry)?;
        if bytes.len() != 5 + geometry {
            return Err(StrategyError::Malformed(format!(
                "expected {} value bytes, got {}",
                geometry,
                bytes.len().saturating_sub(5)
            )));
        }
        let values: Vec<i8> = bytes[5..].iter().map(|b| *b as i8).collect();
        if values.iter().any(|x| *x < METRIC_VALUE_MIN) {
            return Err(StrategyError::Malformed(
                "component below the clamped range".into(),
            ));
        }
        Ok(Vector::Metric { values })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const GEOMETRY: usize = 512;

    fn strategy() -> MetricAffineStrategy {
        MetricAffineStrategy::new()
    }

    #[test]
    fn test_components_stay_clamped() {
        let s = strategy();
        let v = s.create_from_name("range", GEOMETRY);
        let Vector::Metric { values } = &v else { unreachable!() };
        assert!(values
            .iter()
            .all(|x| (METRIC_VALUE_MIN..=METRIC_VALUE_MAX).contains(x)));
    }

    #[test]
    fn test_reflection_bind_is_involutive() {
        let s = strategy();
        let a = s.create_from_name("a", GEOMETRY);
        let b = s.create_from_name("b", GEOMETRY);
        let bound = s.bind(&a, &b).unwrap();
        let back = s.bind(&bound, &b).unwrap();
        assert!(s.similarity(&back, &a) >= 1.0 - 1e-9);
    }

    #[test]
    fn test_mean_bundle_similar_to_members() {
        let s = strategy();
        let members: Vec<Vector> = ["p", "q", "r"]
            .iter()
            .map(|n| s.create_from_name(n, GEOMETRY))
            .collect();
        let bundled = s.bundle(&members).unwrap();
        let outsider = s.create_from_name("outsider", GEOMETRY);
        for m in &members {
            assert!(s.similarity(&bundled, m) > s.similarity(&bundled, &outsider));
            assert!(s.similarity(&bundled, m) >= METRIC_THRESHOLDS.very_strong_match);
        }
    }

    #[test]
    fn test_bundle_order_independent() {
        let s = strategy();
        let a = s.create_from_name("a", GEOMETRY);
        let b = s.create_from_name("b", GEOMETRY);
        let c = s.create_from_name("c", GEOMETRY);
        assert_eq!(
            s.bundle(&[a.clone(), b.clone(), c.clone()]).unwrap(),
            s.bundle(&[c, b, a]).unwrap()
        );
    }

    #[test]
    fn test_extend_unsupported() {
        let s = strategy();
        let v = s.create_from_name("x", GEOMETRY);
        assert!(matches!(
            s.extend(&v, 1024),
            Err(StrategyError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let s = strategy();
        let v = s.create_from_name("serial", GEOMETRY);
        assert_eq!(s.deserialize(&s.serialize(&v)).unwrap(), v);
    }
}
