//! Remove-scalars command: drop rank-0 tensors a GGUF consumer rejects.

use crate::commands::{ensure_destination, validate_source};
use crate::error::Result;
use crate::output;
use recuperar::split::remove_scalars;
use recuperar::store::safetensors;
use std::path::Path;

pub(crate) fn run(src: &Path, dst: &Path, overwrite: bool) -> Result<()> {
    validate_source(src)?;
    ensure_destination(dst, overwrite)?;

    let mut dict = safetensors::load(src)?;
    let removed = remove_scalars(&mut dict);

    safetensors::save(&dict, dst)?;

    output::section("Remove scalars");
    output::kv("source", src.display());
    output::kv("destination", dst.display());
    output::kv("scalars removed", removed.len());
    for name in &removed {
        output::kv("removed", name);
    }
    output::success("written");
    Ok(())
}
