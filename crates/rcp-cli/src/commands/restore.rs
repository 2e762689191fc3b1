//! Restore command: bring flattened tensors back to their recorded shapes.

use crate::commands::{ensure_destination, validate_source};
use crate::error::Result;
use crate::output;
use recuperar::rank::restore_shapes;
use recuperar::store::safetensors;
use std::path::Path;

pub(crate) fn run(src: &Path, dst: &Path, overwrite: bool) -> Result<()> {
    validate_source(src)?;
    ensure_destination(dst, overwrite)?;

    let mut dict = safetensors::load(src)?;
    let restored = restore_shapes(&mut dict)?;

    safetensors::save(&dict, dst)?;

    output::section("Restore shapes");
    output::kv("source", src.display());
    output::kv("destination", dst.display());
    output::kv("tensors restored", restored);
    if restored == 0 {
        output::warning("no recorded shapes found, file copied unchanged");
    }
    output::success("written");
    Ok(())
}
