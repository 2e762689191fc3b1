//! In-place bounded-memory dequantization.
//!
//! Restores reduced-precision weights to full precision using the scale
//! resolver, then normalizes every remaining float tensor to the target
//! precision. Checkpoints can be far larger than resident memory, so the
//! engine visits tensors one at a time, holds exactly one wide transient
//! buffer, and runs a bulk reclamation pass after every fixed-size batch.
//!
//! Both passes iterate a stable snapshot of keys and mutate the dictionary
//! afterwards per entry, because stripping deletes keys mid-sweep.

use crate::error::{RecuperarError, Result};
use crate::scale::{resolve_scale, ScaleResolution, STRIP_SUFFIXES};
use crate::store::{CheckpointDictionary, DType, TensorRecord};

/// Tensors processed between bulk memory reclamation passes.
pub const BATCH_COMPACT_INTERVAL: usize = 100;

/// Suffix identifying weight tensors eligible for scale restoration.
const WEIGHT_SUFFIX: &str = ".weight";

/// Key endings removed during the normalization sweep when stripping is
/// enabled, even when their base never went through the FP8 path.
const ORPHAN_ENDINGS: &[&str] = &[".comfy_quant", ".weight_scale", ".scale_inv"];

/// Missing-scale warnings printed verbatim before throttling kicks in.
const WARN_VERBATIM: usize = 5;

/// After throttling, one warning per this many further misses.
const WARN_EVERY: usize = 100;

/// Options for a dequantization run.
#[derive(Debug, Clone)]
pub struct DequantOptions {
    /// Output precision for every float tensor.
    pub target: DType,
    /// Remove scale-role keys after their value has been consumed.
    pub strip_scales: bool,
    /// Treat a defaulted (unresolved) scale as fatal.
    pub strict: bool,
}

impl DequantOptions {
    /// Options targeting the given precision, with stripping and strict
    /// mode off.
    #[must_use]
    pub fn new(target: DType) -> Self {
        Self {
            target,
            strip_scales: false,
            strict: false,
        }
    }
}

/// What a dequantization run did, for reporting and for callers that
/// treat defaulting as a soft failure.
#[derive(Debug, Clone, Default)]
pub struct DequantReport {
    /// Reduced-precision weights restored to full precision
    pub restored: usize,
    /// Base keys whose scale was unresolved and defaulted to 1.0
    pub defaulted: Vec<String>,
    /// Float tensors cast to the target precision by the second sweep
    pub normalized: usize,
    /// Scale-role keys removed
    pub stripped: usize,
}

/// Dequantize and precision-normalize a dictionary in place.
///
/// First pass: every tensor whose dtype is a reduced-precision kind and
/// whose key ends in `.weight` is upcast wide, multiplied by its resolved
/// scale, and replaced at the target precision; consumed scale metadata is
/// stripped when requested. Second pass: every remaining float tensor not
/// already at the target precision is cast; integer tensors are never
/// touched.
///
/// Running the pass twice is safe: the second run finds no
/// reduced-precision weights and performs no work.
///
/// # Errors
///
/// Returns `FormatError` if `target` is not a full-precision float,
/// `ScaleNotScalar` on a malformed scale source, and `MissingScale` when
/// `strict` is set and a scale cannot be resolved.
pub fn dequantize_in_place(
    dict: &mut CheckpointDictionary,
    options: &DequantOptions,
) -> Result<DequantReport> {
    if !options.target.is_float() || options.target.is_reduced_precision() {
        return Err(RecuperarError::format(format!(
            "invalid output precision {}: expected F32, F16, or BF16",
            options.target
        )));
    }

    let mut report = DequantReport::default();
    restore_reduced_weights(dict, options, &mut report)?;
    normalize_sweep(dict, options, &mut report)?;
    dict.compact();
    Ok(report)
}

/// First pass: restore FP8 `.weight` tensors.
fn restore_reduced_weights(
    dict: &mut CheckpointDictionary,
    options: &DequantOptions,
    report: &mut DequantReport,
) -> Result<()> {
    let reduced_weight_keys: Vec<String> = dict
        .iter()
        .filter(|(key, record)| {
            key.ends_with(WEIGHT_SUFFIX) && record.dtype.is_reduced_precision()
        })
        .map(|(key, _)| key.to_string())
        .collect();

    for (processed, key) in reduced_weight_keys.iter().enumerate() {
        let base = &key[..key.len() - WEIGHT_SUFFIX.len()];

        let multiplier = match resolve_scale(dict, base)? {
            ScaleResolution::Resolved(m) => m,
            ScaleResolution::Unresolved => {
                if options.strict {
                    return Err(RecuperarError::MissingScale {
                        base: base.to_string(),
                    });
                }
                warn_missing_scale(base, report.defaulted.len());
                report.defaulted.push(base.to_string());
                1.0
            }
        };

        // One wide transient at a time; dropped before the next tensor.
        let Some(record) = dict.get(key) else {
            continue;
        };
        let shape = record.shape.clone();
        let mut wide = record.to_f32()?;
        for value in &mut wide {
            *value = (f64::from(*value) * multiplier) as f32;
        }
        let replacement = TensorRecord::from_f32(options.target, shape, &wide)?;
        drop(wide);
        dict.insert(key.clone(), replacement);
        report.restored += 1;

        if options.strip_scales {
            report.stripped += strip_base_scales(dict, base);
        }

        if (processed + 1) % BATCH_COMPACT_INTERVAL == 0 {
            dict.compact();
        }
    }

    Ok(())
}

/// Second pass: cast stragglers, drop orphaned scale artifacts.
fn normalize_sweep(
    dict: &mut CheckpointDictionary,
    options: &DequantOptions,
    report: &mut DequantReport,
) -> Result<()> {
    for key in dict.key_snapshot() {
        // Stripping in the first pass may have deleted this key already.
        let Some(record) = dict.get(&key) else {
            continue;
        };

        if options.strip_scales && ORPHAN_ENDINGS.iter().any(|ending| key.ends_with(ending)) {
            dict.remove(&key);
            report.stripped += 1;
            continue;
        }

        // Integer tensors (recorded shapes, index tables) are never cast.
        if !record.dtype.is_float() || record.dtype == options.target {
            continue;
        }

        let shape = record.shape.clone();
        let wide = record.to_f32()?;
        let replacement = TensorRecord::from_f32(options.target, shape, &wide)?;
        drop(wide);
        dict.insert(key, replacement);
        report.normalized += 1;
    }
    Ok(())
}

/// Remove every scale-role key for `base`, across all known conventions.
fn strip_base_scales(dict: &mut CheckpointDictionary, base: &str) -> usize {
    let mut removed = 0;
    for suffix in STRIP_SUFFIXES {
        if dict.remove(&format!("{base}.{suffix}")).is_some() {
            removed += 1;
        }
    }
    removed
}

/// Warn about a missing scale, throttled so bulk failures do not flood
/// stderr: the first few verbatim, then one per `WARN_EVERY` misses.
fn warn_missing_scale(base: &str, misses_so_far: usize) {
    if misses_so_far < WARN_VERBATIM || misses_so_far % WARN_EVERY == 0 {
        eprintln!("warning: no scale found for '{base}', defaulting multiplier to 1.0");
    }
}
