//! End-to-end pipeline tests over real files.
//!
//! Exercises the full operator workflow: save an FP8 checkpoint, restore
//! it to full precision, flatten over-rank tensors, round it through
//! disk, recover the shapes, and split the result into components.

use recuperar::classify::Component;
use recuperar::dequant::{dequantize_in_place, DequantOptions};
use recuperar::rank::{flatten_over_rank, restore_shapes, DEFAULT_MAX_RANK};
use recuperar::split::{remove_scalars, split, Selection};
use recuperar::store::{safetensors, CheckpointDictionary, DType, TensorRecord};

/// E4M3 bit patterns for [1.0, 2.0, 3.0, 4.0].
const E4M3_1234: [u8; 4] = [0x38, 0x40, 0x44, 0x48];

fn f32_record(shape: Vec<usize>, values: &[f32]) -> TensorRecord {
    TensorRecord::from_f32(DType::F32, shape, values).expect("record")
}

fn fp8_checkpoint() -> CheckpointDictionary {
    let mut dict = CheckpointDictionary::new();
    dict.insert(
        "model.diffusion_model.blocks.0.weight",
        TensorRecord::new(DType::F8E4M3, vec![2, 2], E4M3_1234.to_vec()).expect("fp8"),
    );
    dict.insert(
        "model.diffusion_model.blocks.0.weight_scale",
        f32_record(vec![], &[2.0]),
    );
    dict.insert(
        "first_stage_model.decoder.weight",
        f32_record(vec![3], &[0.5, 1.5, 2.5]),
    );
    dict.insert(
        "cond_stage_model.transformer.weight",
        f32_record(vec![2], &[1.0, -1.0]),
    );
    dict
}

#[test]
fn test_dequant_then_save_then_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("model.f16.safetensors");

    let mut dict = fp8_checkpoint();
    let mut options = DequantOptions::new(DType::F16);
    options.strip_scales = true;
    let report = dequantize_in_place(&mut dict, &options).expect("dequant");

    assert_eq!(report.restored, 1);
    assert!(report.defaulted.is_empty());

    safetensors::save(&dict, &path).expect("save");
    let loaded = safetensors::load(&path).expect("load");

    assert!(!loaded.contains("model.diffusion_model.blocks.0.weight_scale"));
    let weight = loaded
        .get("model.diffusion_model.blocks.0.weight")
        .expect("weight survives");
    assert_eq!(weight.dtype, DType::F16);
    let values = weight.to_f32().expect("decode");
    assert_eq!(values, vec![2.0, 4.0, 6.0, 8.0]);

    // The ordinary float tensors were normalized to the target too.
    let vae = loaded.get("first_stage_model.decoder.weight").expect("vae");
    assert_eq!(vae.dtype, DType::F16);
}

#[test]
fn test_flatten_roundtrip_through_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let flat_path = dir.path().join("flat.safetensors");

    let mut dict = CheckpointDictionary::new();
    let values: Vec<f32> = (0..32).map(|i| i as f32).collect();
    dict.insert(
        "model.diffusion_model.conv.weight",
        f32_record(vec![2, 2, 2, 2, 2], &values),
    );
    dict.insert("model.diffusion_model.bias", f32_record(vec![4], &values[..4]));

    let flattened = flatten_over_rank(&mut dict, DEFAULT_MAX_RANK).expect("flatten");
    assert_eq!(flattened, 1);

    safetensors::save(&dict, &flat_path).expect("save");
    let mut reloaded = safetensors::load(&flat_path).expect("load");

    let flat = reloaded
        .get("model.diffusion_model.conv.weight")
        .expect("flattened tensor");
    assert_eq!(flat.shape, vec![32]);

    let restored = restore_shapes(&mut reloaded).expect("restore");
    assert_eq!(restored, 1);
    let full = reloaded
        .get("model.diffusion_model.conv.weight")
        .expect("restored tensor");
    assert_eq!(full.shape, vec![2, 2, 2, 2, 2]);
    assert_eq!(full.to_f32().expect("decode"), values);

    // Shape metadata is consumed by the restore.
    assert!(!reloaded.metadata.contains_key("orig_shapes"));
}

#[test]
fn test_split_after_dequant() {
    let mut dict = fp8_checkpoint();
    let options = DequantOptions::new(DType::F32);
    dequantize_in_place(&mut dict, &options).expect("dequant");

    let report = split(dict, &Selection::All).expect("split");
    let unet = report
        .buckets
        .iter()
        .find(|(c, _)| *c == Component::Unet)
        .expect("unet bucket");
    assert!(unet.1.contains("model.diffusion_model.blocks.0.weight"));

    let clip = report
        .buckets
        .iter()
        .find(|(c, _)| *c == Component::Clip)
        .expect("clip bucket");
    assert_eq!(clip.1.len(), 1);
}

#[test]
fn test_remove_scalars_then_save() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("clean.safetensors");

    let mut dict = fp8_checkpoint();
    dict.insert("alphas_cumprod_scalar", f32_record(vec![], &[0.99]));

    let removed = remove_scalars(&mut dict);
    // Both the injected scalar and the rank-0 weight_scale go.
    assert_eq!(removed.len(), 2);

    safetensors::save(&dict, &path).expect("save");
    let loaded = safetensors::load(&path).expect("load");
    assert!(!loaded.contains("alphas_cumprod_scalar"));
    assert!(loaded.contains("model.diffusion_model.blocks.0.weight"));
}

#[test]
fn test_strict_mode_is_fatal_for_missing_scale() {
    let mut dict = CheckpointDictionary::new();
    dict.insert(
        "model.diffusion_model.orphan.weight",
        TensorRecord::new(DType::F8E4M3, vec![4], E4M3_1234.to_vec()).expect("fp8"),
    );

    let mut options = DequantOptions::new(DType::F16);
    options.strict = true;
    assert!(dequantize_in_place(&mut dict, &options).is_err());

    // Without strict the same checkpoint defaults to a 1.0 scale.
    let mut dict2 = CheckpointDictionary::new();
    dict2.insert(
        "model.diffusion_model.orphan.weight",
        TensorRecord::new(DType::F8E4M3, vec![4], E4M3_1234.to_vec()).expect("fp8"),
    );
    let report = dequantize_in_place(&mut dict2, &DequantOptions::new(DType::F16))
        .expect("lenient dequant");
    assert_eq!(report.defaulted.len(), 1);
    let weight = dict2
        .get("model.diffusion_model.orphan.weight")
        .expect("weight");
    assert_eq!(weight.to_f32().expect("decode"), vec![1.0, 2.0, 3.0, 4.0]);
}
