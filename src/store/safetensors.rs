//! Safetensors-layout container glue.
//!
//! Implements just enough of the layout to act as the checkpoint store:
//! ```text
//! [8-byte header: u64 metadata length (little-endian)]
//! [JSON header: optional __metadata__ map + tensor names, dtypes, shapes, data_offsets]
//! [Raw tensor data: little-endian element bytes]
//! ```
//!
//! This is deliberately not a general safetensors library: unknown dtypes
//! are an error, there is no mmap and no sharding. Load and save are
//! atomic blocking steps; save writes to a sibling temporary path and
//! renames on success so an interrupted run never leaves a destination
//! that parses.

use crate::error::{RecuperarError, Result};
use crate::store::dict::CheckpointDictionary;
use crate::store::dtype::DType;
use crate::store::record::TensorRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Header entry for a single tensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TensorHeaderEntry {
    dtype: String,
    shape: Vec<usize>,
    data_offsets: [usize; 2],
}

/// Load a checkpoint dictionary from a safetensors-layout file.
///
/// Tensors are inserted in file (data offset) order, so the dictionary's
/// insertion order reproduces the producer's physical layout and saves are
/// deterministic.
///
/// # Errors
///
/// Returns `LoadFailure` on I/O errors, truncated or malformed headers,
/// unsupported dtypes, or out-of-bounds data offsets.
pub fn load(path: impl AsRef<Path>) -> Result<CheckpointDictionary> {
    let path = path.as_ref();
    let bytes = fs::read(path)
        .map_err(|e| RecuperarError::load(format!("{}: {e}", path.display())))?;

    let header_len = read_header_len(&bytes)?;
    let header_end = 8 + header_len;
    let header: serde_json::Map<String, serde_json::Value> =
        serde_json::from_slice(&bytes[8..header_end])
            .map_err(|e| RecuperarError::load(format!("invalid JSON header: {e}")))?;

    let mut dict = CheckpointDictionary::new();
    let mut entries: Vec<(String, TensorHeaderEntry)> = Vec::with_capacity(header.len());

    for (name, value) in header {
        if name == "__metadata__" {
            let meta: BTreeMap<String, String> = serde_json::from_value(value)
                .map_err(|e| RecuperarError::load(format!("invalid __metadata__: {e}")))?;
            dict.metadata = meta;
            continue;
        }
        let entry: TensorHeaderEntry = serde_json::from_value(value)
            .map_err(|e| RecuperarError::load(format!("invalid entry for '{name}': {e}")))?;
        entries.push((name, entry));
    }

    // File order, not JSON key order: offsets are the producer's layout.
    entries.sort_by_key(|(_, entry)| entry.data_offsets[0]);

    let data = &bytes[header_end..];
    for (name, entry) in entries {
        let dtype = DType::parse(&entry.dtype)?;
        let [start, end] = entry.data_offsets;
        if start > end || end > data.len() {
            return Err(RecuperarError::load(format!(
                "tensor '{name}' data range {start}..{end} exceeds payload of {} bytes",
                data.len()
            )));
        }
        let record = TensorRecord::new(dtype, entry.shape, data[start..end].to_vec())
            .map_err(|e| RecuperarError::load(format!("tensor '{name}': {e}")))?;
        dict.insert(name, record);
    }

    Ok(dict)
}

/// Save a checkpoint dictionary to a safetensors-layout file.
///
/// Tensors are written in dictionary insertion order. Non-empty dictionary
/// metadata is emitted under `__metadata__`. The file is assembled at a
/// sibling `.tmp` path and renamed into place on success.
///
/// # Errors
///
/// Returns `SaveFailure` on I/O or serialization errors.
pub fn save(dict: &CheckpointDictionary, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut header = serde_json::Map::new();

    if !dict.metadata.is_empty() {
        let meta_obj: serde_json::Map<String, serde_json::Value> = dict
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        header.insert(
            "__metadata__".to_string(),
            serde_json::Value::Object(meta_obj),
        );
    }

    let mut payload = Vec::with_capacity(dict.total_size_bytes());
    let mut current_offset = 0;
    for (name, record) in dict.iter() {
        let start = current_offset;
        let end = start + record.data.len();
        let entry = TensorHeaderEntry {
            dtype: record.dtype.as_str().to_string(),
            shape: record.shape.clone(),
            data_offsets: [start, end],
        };
        let value = serde_json::to_value(&entry)
            .map_err(|e| RecuperarError::save(format!("header for '{name}': {e}")))?;
        header.insert(name.to_string(), value);
        payload.extend_from_slice(&record.data);
        current_offset = end;
    }

    let header_json = serde_json::to_string(&serde_json::Value::Object(header))
        .map_err(|e| RecuperarError::save(format!("header serialization: {e}")))?;
    let header_bytes = header_json.as_bytes();

    let mut output = Vec::with_capacity(8 + header_bytes.len() + payload.len());
    output.extend_from_slice(&(header_bytes.len() as u64).to_le_bytes());
    output.extend_from_slice(header_bytes);
    output.extend_from_slice(&payload);

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, &output)
        .map_err(|e| RecuperarError::save(format!("{}: {e}", tmp_path.display())))?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        RecuperarError::save(format!("{}: {e}", path.display()))
    })?;
    Ok(())
}

fn read_header_len(bytes: &[u8]) -> Result<usize> {
    if bytes.len() < 8 {
        return Err(RecuperarError::load(format!(
            "file is {} bytes, header requires at least 8",
            bytes.len()
        )));
    }
    let header_len = u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ]) as usize;
    match header_len.checked_add(8) {
        Some(total) if total <= bytes.len() => Ok(header_len),
        _ => Err(RecuperarError::load(format!(
            "header length {header_len} exceeds file size {}",
            bytes.len()
        ))),
    }
}
