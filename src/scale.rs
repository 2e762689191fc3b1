//! Scale resolution for reduced-precision tensors.
//!
//! Several incompatible metadata conventions coexist in the wild; the
//! resolver tries them in strict priority order and reports the
//! multiplicative correction factor to apply, or that nothing matched.
//! "Unresolved" is an explicit variant rather than a sentinel value,
//! because 0.0 and 1.0 are both legitimate resolved values.

use crate::error::{RecuperarError, Result};
use crate::store::CheckpointDictionary;

/// Divisor-convention suffixes, tried in order. The stored value divides
/// the weight, so the resolved multiplier is its reciprocal.
pub const DIVISOR_SUFFIXES: &[&str] = &["scale", "scale_weight", "scale_reciprocal"];

/// Every scale-role suffix the dequantization engine strips for a base
/// key, across all known conventions, including producer-specific
/// artifacts that carry no value.
pub const STRIP_SUFFIXES: &[&str] = &[
    "weight_scale",
    "scale_weight",
    "scale_reciprocal",
    "scale_input",
    "scale",
    "scale_inv",
    "comfy_quant",
];

/// Outcome of scale resolution for a base key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleResolution {
    /// A convention matched; multiply the weight by this factor.
    Resolved(f64),
    /// No convention matched. Callers decide whether defaulting the
    /// multiplier to 1.0 is acceptable (it is fatal in strict mode).
    Unresolved,
}

impl ScaleResolution {
    /// The multiplier, defaulting to 1.0 when unresolved.
    #[must_use]
    pub fn multiplier_or_default(self) -> f64 {
        match self {
            Self::Resolved(m) => m,
            Self::Unresolved => 1.0,
        }
    }

    /// True when a convention matched.
    #[must_use]
    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Resolve the multiplicative correction factor for `base`.
///
/// Strategies, in strict priority order:
/// 1. `base.weight_scale` — direct multiplier, returned as-is.
/// 2. `base.scale` / `base.scale_weight` / `base.scale_reciprocal` —
///    divisor convention, returns the reciprocal. A stored value of
///    exactly zero resolves to 1.0, never a division by zero.
/// 3. `base.scale_inv` — explicit inverse, returned as-is.
/// 4. Nothing present — [`ScaleResolution::Unresolved`].
///
/// # Errors
///
/// Returns `ScaleNotScalar` if a matching source tensor holds more than
/// one element, and `FormatError` if it is not a float tensor. Resolving
/// against a non-scalar is a contract violation, not a soft miss.
pub fn resolve_scale(dict: &CheckpointDictionary, base: &str) -> Result<ScaleResolution> {
    if let Some(value) = read_scale_source(dict, &format!("{base}.weight_scale"))? {
        return Ok(ScaleResolution::Resolved(value));
    }

    for suffix in DIVISOR_SUFFIXES {
        if let Some(value) = read_scale_source(dict, &format!("{base}.{suffix}"))? {
            if value == 0.0 {
                return Ok(ScaleResolution::Resolved(1.0));
            }
            return Ok(ScaleResolution::Resolved(1.0 / value));
        }
    }

    if let Some(value) = read_scale_source(dict, &format!("{base}.scale_inv"))? {
        return Ok(ScaleResolution::Resolved(value));
    }

    Ok(ScaleResolution::Unresolved)
}

/// Read a scale source value, enforcing the single-element contract.
fn read_scale_source(dict: &CheckpointDictionary, key: &str) -> Result<Option<f64>> {
    let Some(record) = dict.get(key) else {
        return Ok(None);
    };
    if record.num_elements() != 1 {
        return Err(RecuperarError::ScaleNotScalar {
            key: key.to_string(),
            elements: record.num_elements(),
        });
    }
    Ok(Some(record.scalar_f64()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DType, TensorRecord};

    fn scalar(value: f32) -> TensorRecord {
        TensorRecord::from_f32(DType::F32, vec![], &[value]).expect("scalar")
    }

    fn dict_with(entries: &[(&str, f32)]) -> CheckpointDictionary {
        let mut dict = CheckpointDictionary::new();
        for (key, value) in entries {
            dict.insert(*key, scalar(*value));
        }
        dict
    }

    #[test]
    fn test_direct_multiplier() {
        let dict = dict_with(&[("layer1.attn.q_proj.weight_scale", 2.0)]);
        let resolved = resolve_scale(&dict, "layer1.attn.q_proj").expect("resolve");
        assert_eq!(resolved, ScaleResolution::Resolved(2.0));
    }

    #[test]
    fn test_divisor_convention_returns_reciprocal() {
        let dict = dict_with(&[("a.scale", 4.0)]);
        let resolved = resolve_scale(&dict, "a").expect("resolve");
        assert_eq!(resolved, ScaleResolution::Resolved(0.25));

        let dict = dict_with(&[("a.scale_weight", 2.0)]);
        assert_eq!(
            resolve_scale(&dict, "a").expect("resolve"),
            ScaleResolution::Resolved(0.5)
        );

        let dict = dict_with(&[("a.scale_reciprocal", 8.0)]);
        assert_eq!(
            resolve_scale(&dict, "a").expect("resolve"),
            ScaleResolution::Resolved(0.125)
        );
    }

    #[test]
    fn test_direct_multiplier_wins_over_divisor() {
        // Priority: both conventions present, the direct multiplier's
        // value is returned and the divisor key is ignored.
        let dict = dict_with(&[("a.weight_scale", 3.0), ("a.scale", 100.0)]);
        let resolved = resolve_scale(&dict, "a").expect("resolve");
        assert_eq!(resolved, ScaleResolution::Resolved(3.0));
    }

    #[test]
    fn test_divisor_zero_resolves_to_one() {
        let dict = dict_with(&[("a.scale", 0.0)]);
        let resolved = resolve_scale(&dict, "a").expect("resolve");
        assert_eq!(resolved, ScaleResolution::Resolved(1.0));
    }

    #[test]
    fn test_explicit_inverse() {
        let dict = dict_with(&[("a.scale_inv", 0.5)]);
        let resolved = resolve_scale(&dict, "a").expect("resolve");
        assert_eq!(resolved, ScaleResolution::Resolved(0.5));
    }

    #[test]
    fn test_divisor_wins_over_explicit_inverse() {
        let dict = dict_with(&[("a.scale", 2.0), ("a.scale_inv", 9.0)]);
        assert_eq!(
            resolve_scale(&dict, "a").expect("resolve"),
            ScaleResolution::Resolved(0.5)
        );
    }

    #[test]
    fn test_unresolved() {
        let dict = dict_with(&[("other.scale", 2.0)]);
        let resolved = resolve_scale(&dict, "a").expect("resolve");
        assert_eq!(resolved, ScaleResolution::Unresolved);
        assert_eq!(resolved.multiplier_or_default(), 1.0);
        assert!(!resolved.is_resolved());
    }

    #[test]
    fn test_resolved_zero_is_distinct_from_unresolved() {
        // weight_scale of 0.0 resolves to 0.0; only the divisor convention
        // has the zero-avoidance policy.
        let dict = dict_with(&[("a.weight_scale", 0.0)]);
        let resolved = resolve_scale(&dict, "a").expect("resolve");
        assert_eq!(resolved, ScaleResolution::Resolved(0.0));
        assert!(resolved.is_resolved());
    }

    #[test]
    fn test_non_scalar_source_is_contract_violation() {
        let mut dict = CheckpointDictionary::new();
        dict.insert(
            "a.scale",
            TensorRecord::from_f32(DType::F32, vec![4], &[1.0, 2.0, 3.0, 4.0]).expect("tensor"),
        );
        let err = resolve_scale(&dict, "a").expect_err("should reject");
        assert!(matches!(err, RecuperarError::ScaleNotScalar { elements: 4, .. }));
    }

    #[test]
    fn test_single_element_rank_one_is_accepted() {
        // Shape [1] holds one element; the contract is single-element,
        // not strictly rank zero.
        let mut dict = CheckpointDictionary::new();
        dict.insert(
            "a.weight_scale",
            TensorRecord::from_f32(DType::F32, vec![1], &[2.5]).expect("tensor"),
        );
        assert_eq!(
            resolve_scale(&dict, "a").expect("resolve"),
            ScaleResolution::Resolved(2.5)
        );
    }

    #[test]
    fn test_f16_scale_source() {
        let mut dict = CheckpointDictionary::new();
        dict.insert(
            "a.weight_scale",
            TensorRecord::from_f32(DType::F16, vec![], &[2.0]).expect("tensor"),
        );
        assert_eq!(
            resolve_scale(&dict, "a").expect("resolve"),
            ScaleResolution::Resolved(2.0)
        );
    }
}
