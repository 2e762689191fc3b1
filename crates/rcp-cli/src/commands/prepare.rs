//! Prepare command: merge an optional fix checkpoint, then flatten
//! over-rank tensors for consumers with a dimensionality ceiling.

use crate::commands::{ensure_destination, validate_source};
use crate::error::Result;
use crate::output;
use recuperar::classify::UNET_PREFIX;
use recuperar::rank::flatten_over_rank;
use recuperar::store::safetensors;
use std::path::Path;

pub(crate) fn run(
    src: &Path,
    dst: &Path,
    fix: Option<&Path>,
    max_rank: usize,
    overwrite: bool,
) -> Result<()> {
    validate_source(src)?;
    ensure_destination(dst, overwrite)?;

    let mut dict = safetensors::load(src)?;

    output::section("Prepare");
    output::kv("source", src.display());

    if let Some(fix_path) = fix {
        validate_source(fix_path)?;
        let fix_dict = safetensors::load(fix_path)?;
        let fix_len = fix_dict.len();
        let overwritten = dict.merge_prefixed(fix_dict, UNET_PREFIX);
        output::kv("fix tensors merged", fix_len);
        if !overwritten.is_empty() {
            output::warning(&format!(
                "{} tensor(s) replaced by the fix checkpoint",
                overwritten.len()
            ));
        }
    }

    let flattened = flatten_over_rank(&mut dict, max_rank)?;
    output::kv("max rank", max_rank);
    output::kv("tensors flattened", flattened);

    safetensors::save(&dict, dst)?;
    output::kv("destination", dst.display());
    output::success("written");
    Ok(())
}
