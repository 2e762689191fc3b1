//! Split command: partition a checkpoint into component files.

use crate::commands::{ensure_destination, validate_source};
use crate::error::Result;
use crate::output;
use recuperar::split::{split, Selection};
use recuperar::store::safetensors;
use std::fs;
use std::path::Path;

pub(crate) fn run(src: &Path, out_dir: &Path, components: &str, overwrite: bool) -> Result<()> {
    validate_source(src)?;
    let selection = Selection::parse(components)?;

    let dict = safetensors::load(src)?;
    let report = split(dict, &selection)?;

    fs::create_dir_all(out_dir)?;
    let stem = src
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("checkpoint");

    output::section("Split");
    output::kv("source", src.display());
    output::kv("variant", format!("{:?}", report.variant));

    // All destinations are checked before the first write, so an existing
    // file never leaves a partial set of component files behind.
    let mut planned = Vec::new();
    for (component, bucket) in &report.buckets {
        if bucket.is_empty() {
            output::warning(&format!("component '{component}' has no tensors, skipped"));
            continue;
        }
        let dst = out_dir.join(format!("{stem}_{component}.safetensors"));
        ensure_destination(&dst, overwrite)?;
        planned.push((component, bucket, dst));
    }

    let mut written = 0usize;
    for (component, bucket, dst) in planned {
        safetensors::save(bucket, &dst)?;
        output::kv(
            component.name(),
            format!(
                "{} tensors, {} -> {}",
                bucket.len(),
                output::format_size(bucket.total_size_bytes() as u64),
                dst.display()
            ),
        );
        written += 1;
    }

    if report.unmatched > 0 {
        output::warning(&format!("{} key(s) matched no component", report.unmatched));
    }
    if report.scale_artifacts > 0 {
        output::warning(&format!(
            "{} bare scale key(s) dropped",
            report.scale_artifacts
        ));
    }
    output::success(&format!("{written} file(s) written"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use recuperar::store::{CheckpointDictionary, DType, TensorRecord};

    fn sample_checkpoint(dir: &Path) -> std::path::PathBuf {
        let mut dict = CheckpointDictionary::new();
        let record = TensorRecord::from_f32(DType::F32, vec![2], &[1.0, 2.0]).expect("record");
        dict.insert("cond_stage_model.text.weight", record.clone());
        dict.insert("model.diffusion_model.blocks.0.weight", record.clone());
        dict.insert("first_stage_model.decoder.weight", record);
        let path = dir.join("model.safetensors");
        safetensors::save(&dict, &path).expect("save");
        path
    }

    #[test]
    fn test_existing_destination_blocks_all_writes() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = sample_checkpoint(tmp.path());
        let out_dir = tmp.path().join("parts");
        fs::create_dir_all(&out_dir).expect("out dir");

        // VAE is last in menu order; blocking it must also stop the
        // earlier clip and unet writes.
        fs::write(out_dir.join("model_vae.safetensors"), b"existing").expect("write");

        let err = run(&src, &out_dir, "all", false).expect_err("should refuse");
        assert!(matches!(err, CliError::DestinationExists(_)));
        assert!(!out_dir.join("model_clip.safetensors").exists());
        assert!(!out_dir.join("model_unet.safetensors").exists());
    }

    #[test]
    fn test_overwrite_allows_existing_destination() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = sample_checkpoint(tmp.path());
        let out_dir = tmp.path().join("parts");
        fs::create_dir_all(&out_dir).expect("out dir");
        fs::write(out_dir.join("model_vae.safetensors"), b"existing").expect("write");

        run(&src, &out_dir, "all", true).expect("split");
        assert!(out_dir.join("model_clip.safetensors").exists());
        assert!(out_dir.join("model_unet.safetensors").exists());
        let replaced =
            safetensors::load(out_dir.join("model_vae.safetensors")).expect("valid file");
        assert!(replaced.contains("first_stage_model.decoder.weight"));
    }
}
