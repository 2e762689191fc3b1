//! Dequant command: restore FP8 weights and normalize precision.

use crate::commands::{ensure_destination, validate_source, Precision};
use crate::error::Result;
use crate::output;
use recuperar::dequant::{dequantize_in_place, DequantOptions};
use recuperar::store::safetensors;
use std::path::Path;

pub(crate) fn run(
    src: &Path,
    dst: &Path,
    precision: Precision,
    overwrite: bool,
    strip_fp8: bool,
    strict: bool,
) -> Result<()> {
    validate_source(src)?;
    ensure_destination(dst, overwrite)?;

    let mut dict = safetensors::load(src)?;
    let before = dict.total_size_bytes() as u64;

    let mut options = DequantOptions::new(precision.to_dtype());
    options.strip_scales = strip_fp8;
    options.strict = strict;
    let report = dequantize_in_place(&mut dict, &options)?;

    safetensors::save(&dict, dst)?;

    output::section("Dequantize");
    output::kv("source", src.display());
    output::kv("destination", dst.display());
    output::kv("target dtype", options.target);
    output::kv("weights restored", report.restored);
    output::kv("tensors normalized", report.normalized);
    if strip_fp8 {
        output::kv("scale keys stripped", report.stripped);
    }
    if !report.defaulted.is_empty() {
        output::warning(&format!(
            "{} weight(s) dequantized with a default scale of 1.0",
            report.defaulted.len()
        ));
    }
    output::kv(
        "size",
        format!(
            "{} -> {}",
            output::format_size(before),
            output::format_size(dict.total_size_bytes() as u64)
        ),
    );
    output::success("written");
    Ok(())
}
