//! Rank reduction with recoverable shape metadata.
//!
//! Downstream container formats cap tensor rank (commonly at 4). Tensors
//! over the limit are flattened to one dimension in element order, and the
//! original shape is recorded in dictionary-level metadata so a symmetric
//! restore can reproduce it exactly. The flattened data bytes are never
//! copied; only the shape changes.

use crate::error::{RecuperarError, Result};
use crate::store::CheckpointDictionary;
use std::collections::BTreeMap;

/// Metadata key holding the name → original-shape mapping, serialized as
/// a JSON object of integer arrays.
pub const SHAPE_METADATA_KEY: &str = "orig_shapes";

/// Default rank limit of the downstream format.
pub const DEFAULT_MAX_RANK: usize = 4;

/// Flatten every tensor whose rank exceeds `max_rank` to one dimension,
/// recording its original shape in the dictionary metadata. Existing
/// recorded shapes are merged, not clobbered. Returns the number of
/// tensors flattened.
///
/// # Errors
///
/// Returns `FormatError` if an existing shape-metadata entry cannot be
/// parsed.
pub fn flatten_over_rank(dict: &mut CheckpointDictionary, max_rank: usize) -> Result<usize> {
    let mut recorded = read_shape_metadata(dict)?;
    let mut flattened = 0;

    for key in dict.key_snapshot() {
        let Some(record) = dict.get_mut(&key) else {
            continue;
        };
        if record.rank() <= max_rank {
            continue;
        }
        let num_elements = record.num_elements();
        recorded.insert(key, std::mem::replace(&mut record.shape, vec![num_elements]));
        flattened += 1;
    }

    write_shape_metadata(dict, &recorded)?;
    Ok(flattened)
}

/// Restore recorded shapes: every flattened tensor named in the metadata
/// entry gets its original shape back. Consumed names are removed from
/// the entry (and the entry itself once empty); names absent from the
/// dictionary are left recorded, since the checkpoint may have been
/// split. Returns the number of tensors restored.
///
/// # Errors
///
/// Returns `FormatError` if the metadata entry cannot be parsed, and
/// `ShapeMismatch` if a recorded shape disagrees with the stored element
/// count. A mismatch never truncates or pads; the run aborts with the
/// dictionary unsaved.
pub fn restore_shapes(dict: &mut CheckpointDictionary) -> Result<usize> {
    let mut recorded = read_shape_metadata(dict)?;
    let mut restored = 0;

    let names: Vec<String> = recorded.keys().cloned().collect();
    for name in names {
        let Some(record) = dict.get_mut(&name) else {
            continue;
        };
        let shape = &recorded[&name];
        let expected: usize = shape.iter().product();
        if expected != record.num_elements() {
            return Err(RecuperarError::ShapeMismatch {
                name,
                expected,
                actual: record.num_elements(),
            });
        }
        record.shape.clone_from(shape);
        recorded.remove(&name);
        restored += 1;
    }

    write_shape_metadata(dict, &recorded)?;
    Ok(restored)
}

fn read_shape_metadata(dict: &CheckpointDictionary) -> Result<BTreeMap<String, Vec<usize>>> {
    match dict.metadata.get(SHAPE_METADATA_KEY) {
        None => Ok(BTreeMap::new()),
        Some(raw) => serde_json::from_str(raw).map_err(|e| {
            RecuperarError::format(format!("invalid {SHAPE_METADATA_KEY} metadata: {e}"))
        }),
    }
}

fn write_shape_metadata(
    dict: &mut CheckpointDictionary,
    recorded: &BTreeMap<String, Vec<usize>>,
) -> Result<()> {
    if recorded.is_empty() {
        dict.metadata.remove(SHAPE_METADATA_KEY);
        return Ok(());
    }
    let raw = serde_json::to_string(recorded).map_err(|e| {
        RecuperarError::format(format!("cannot serialize {SHAPE_METADATA_KEY}: {e}"))
    })?;
    dict.metadata.insert(SHAPE_METADATA_KEY.to_string(), raw);
    Ok(())
}
