//! Component splitting: partition a checkpoint into named buckets.
//!
//! Variant detection runs once per dictionary, before any selection is
//! validated, because which buckets exist depends on it. Records move
//! into their bucket; the source dictionary is consumed and nothing is
//! duplicated.

use crate::classify::{classify, detect_variant, ArchVariant, Category, Component};
use crate::error::{RecuperarError, Result};
use crate::store::CheckpointDictionary;

/// Which components to extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every component the detected variant has.
    All,
    /// An explicit list; must be a subset of the variant's components.
    Components(Vec<Component>),
}

impl Selection {
    /// Parse a comma-separated selection string (`all` or component
    /// names).
    ///
    /// # Errors
    ///
    /// Returns `InvalidSelection` for unknown names or an empty list.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim() == "all" {
            return Ok(Self::All);
        }
        let mut components = Vec::new();
        for part in raw.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let component = Component::parse(part).ok_or_else(|| {
                RecuperarError::InvalidSelection {
                    message: format!(
                        "unknown component '{part}' (expected all, clip, clip_l, clip_g, unet, vae)"
                    ),
                }
            })?;
            if !components.contains(&component) {
                components.push(component);
            }
        }
        if components.is_empty() {
            return Err(RecuperarError::InvalidSelection {
                message: "no components selected".to_string(),
            });
        }
        Ok(Self::Components(components))
    }
}

/// Result of a split: one bucket per selected component (empty buckets
/// included, so callers can report them before skipping the write), plus
/// drop counts for everything that landed nowhere.
#[derive(Debug)]
pub struct SplitReport {
    /// Detected architecture variant
    pub variant: ArchVariant,
    /// Selected buckets in menu order, each owning its records
    pub buckets: Vec<(Component, CheckpointDictionary)>,
    /// Keys no classification rule matched (documented drop, not an error)
    pub unmatched: usize,
    /// Scale-role keys outside any recognized component
    pub scale_artifacts: usize,
}

/// Split a checkpoint into component buckets by move.
///
/// Each bucket inherits a copy of the dictionary-level metadata so a
/// bucket containing flattened tensors keeps its shape records.
///
/// # Errors
///
/// Returns `InvalidSelection` when the selection names a component the
/// detected variant does not have.
pub fn split(dict: CheckpointDictionary, selection: &Selection) -> Result<SplitReport> {
    let variant = detect_variant(&dict);

    let selected: Vec<Component> = match selection {
        Selection::All => variant.components().to_vec(),
        Selection::Components(list) => {
            for component in list {
                if !variant.has(*component) {
                    return Err(RecuperarError::InvalidSelection {
                        message: format!(
                            "component '{component}' does not exist in a {variant:?} checkpoint"
                        ),
                    });
                }
            }
            list.clone()
        }
    };

    let metadata = dict.metadata.clone();
    let mut buckets: Vec<(Component, CheckpointDictionary)> = selected
        .iter()
        .map(|&component| {
            let mut bucket = CheckpointDictionary::new();
            bucket.metadata = metadata.clone();
            (component, bucket)
        })
        .collect();

    let mut unmatched = 0;
    let mut scale_artifacts = 0;

    for (name, record) in dict {
        match classify(&name) {
            Category::Component(component) => {
                if let Some((_, bucket)) =
                    buckets.iter_mut().find(|(c, _)| *c == component)
                {
                    bucket.insert(name, record);
                }
                // Unselected components are dropped here, record freed.
            }
            Category::ScaleRole(_) => scale_artifacts += 1,
            Category::Unmatched => unmatched += 1,
        }
    }

    Ok(SplitReport {
        variant,
        buckets,
        unmatched,
        scale_artifacts,
    })
}

/// Remove every rank-0 tensor from a dictionary, returning the removed
/// names. Downstream GGUF consumers reject scalar tensors; everything
/// else passes through with its raw dtype tag untouched.
pub fn remove_scalars(dict: &mut CheckpointDictionary) -> Vec<String> {
    let mut removed = Vec::new();
    for key in dict.key_snapshot() {
        let is_scalar = dict.get(&key).is_some_and(|record| record.is_scalar());
        if is_scalar {
            dict.remove(&key);
            removed.push(key);
        }
    }
    dict.compact();
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DType, TensorRecord};

    fn record() -> TensorRecord {
        TensorRecord::from_f32(DType::F32, vec![2], &[1.0, 2.0]).expect("record")
    }

    fn scalar() -> TensorRecord {
        TensorRecord::from_f32(DType::F32, vec![], &[1.0]).expect("scalar")
    }

    fn dual_encoder_dict() -> CheckpointDictionary {
        let mut dict = CheckpointDictionary::new();
        dict.insert("model.diffusion_model.blocks.0.weight", record());
        dict.insert("first_stage_model.decoder.weight", record());
        dict.insert("conditioner.embedders.0.text.weight", record());
        dict.insert("conditioner.embedders.1.text.weight", record());
        dict.insert("optimizer.step", record());
        dict
    }

    #[test]
    fn test_split_all_dual_encoder() {
        let report = split(dual_encoder_dict(), &Selection::All).expect("split");
        assert_eq!(report.variant, ArchVariant::DualEncoder);
        assert_eq!(report.buckets.len(), 4);
        assert_eq!(report.unmatched, 1);

        for (component, bucket) in &report.buckets {
            match component {
                Component::ClipL => {
                    assert_eq!(bucket.keys().collect::<Vec<_>>(), vec![
                        "conditioner.embedders.0.text.weight"
                    ]);
                }
                Component::ClipG => assert_eq!(bucket.len(), 1),
                Component::Unet => assert_eq!(bucket.len(), 1),
                Component::Vae => assert_eq!(bucket.len(), 1),
                Component::Clip => panic!("clip bucket in dual-encoder split"),
            }
        }
    }

    #[test]
    fn test_no_key_in_two_buckets_and_unmatched_in_none() {
        let report = split(dual_encoder_dict(), &Selection::All).expect("split");
        let mut seen = std::collections::HashSet::new();
        for (_, bucket) in &report.buckets {
            for key in bucket.keys() {
                assert!(seen.insert(key.to_string()), "duplicate key {key}");
            }
        }
        assert!(!seen.contains("optimizer.step"));
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_split_subset_drops_unselected() {
        let selection = Selection::Components(vec![Component::Unet]);
        let report = split(dual_encoder_dict(), &selection).expect("split");
        assert_eq!(report.buckets.len(), 1);
        let (component, bucket) = &report.buckets[0];
        assert_eq!(*component, Component::Unet);
        assert_eq!(bucket.len(), 1);
    }

    #[test]
    fn test_split_single_encoder() {
        let mut dict = CheckpointDictionary::new();
        dict.insert("cond_stage_model.text.weight", record());
        dict.insert("model.diffusion_model.w", record());

        let report = split(dict, &Selection::All).expect("split");
        assert_eq!(report.variant, ArchVariant::SingleEncoder);
        assert_eq!(report.buckets.len(), 3);

        // VAE bucket exists but is empty: reported, not hidden.
        let vae = report
            .buckets
            .iter()
            .find(|(c, _)| *c == Component::Vae)
            .expect("vae bucket");
        assert!(vae.1.is_empty());
    }

    #[test]
    fn test_invalid_selection_for_variant() {
        let mut dict = CheckpointDictionary::new();
        dict.insert("cond_stage_model.text.weight", record());

        let selection = Selection::Components(vec![Component::ClipG]);
        let err = split(dict, &selection).expect_err("should reject");
        assert!(matches!(err, RecuperarError::InvalidSelection { .. }));
    }

    #[test]
    fn test_buckets_inherit_metadata() {
        let mut dict = dual_encoder_dict();
        dict.metadata
            .insert("orig_shapes".to_string(), r#"{"x":[2,2]}"#.to_string());
        let report = split(dict, &Selection::All).expect("split");
        for (_, bucket) in &report.buckets {
            assert_eq!(
                bucket.metadata.get("orig_shapes").map(String::as_str),
                Some(r#"{"x":[2,2]}"#)
            );
        }
    }

    #[test]
    fn test_bare_scale_artifacts_counted() {
        let mut dict = CheckpointDictionary::new();
        dict.insert("model.diffusion_model.w", record());
        dict.insert("stray.weight_scale", scalar());

        let report = split(dict, &Selection::All).expect("split");
        assert_eq!(report.scale_artifacts, 1);
        assert_eq!(report.unmatched, 0);
    }

    #[test]
    fn test_selection_parse() {
        assert_eq!(Selection::parse("all").expect("all"), Selection::All);
        assert_eq!(
            Selection::parse("unet,vae").expect("list"),
            Selection::Components(vec![Component::Unet, Component::Vae])
        );
        // Duplicates collapse, whitespace tolerated.
        assert_eq!(
            Selection::parse(" unet , unet ").expect("dup"),
            Selection::Components(vec![Component::Unet])
        );
        assert!(Selection::parse("unet,teapot").is_err());
        assert!(Selection::parse("").is_err());
        assert!(Selection::parse(",,").is_err());
    }

    #[test]
    fn test_remove_scalars() {
        let mut dict = CheckpointDictionary::new();
        dict.insert("w", record());
        dict.insert("alpha", scalar());
        dict.insert("beta", scalar());

        let removed = remove_scalars(&mut dict);
        assert_eq!(removed, vec!["alpha".to_string(), "beta".to_string()]);
        assert_eq!(dict.len(), 1);
        assert!(dict.contains("w"));
    }

    #[test]
    fn test_remove_scalars_none_present() {
        let mut dict = CheckpointDictionary::new();
        dict.insert("w", record());
        assert!(remove_scalars(&mut dict).is_empty());
        assert_eq!(dict.len(), 1);
    }
}
