//! Tensors command: list tensor names, shapes, and classifications.

use crate::commands::validate_source;
use crate::error::Result;
use crate::output;
use colored::Colorize;
use recuperar::classify::{classify, Category};
use recuperar::store::safetensors;
use serde::Serialize;
use std::path::Path;

/// Tensor information for display/JSON
#[derive(Serialize)]
struct TensorInfo {
    name: String,
    dtype: String,
    shape: Vec<usize>,
    size_bytes: usize,
    category: String,
}

/// Tensors listing result
#[derive(Serialize)]
struct TensorsResult {
    file: String,
    tensor_count: usize,
    total_size_bytes: usize,
    shown: usize,
    tensors: Vec<TensorInfo>,
}

fn category_label(name: &str) -> String {
    match classify(name) {
        Category::Component(component) => component.name().to_string(),
        Category::ScaleRole(role) => format!("scale ({role:?})"),
        Category::Unmatched => "-".to_string(),
    }
}

pub(crate) fn run(src: &Path, filter: Option<&str>, limit: usize, json: bool) -> Result<()> {
    validate_source(src)?;
    let dict = safetensors::load(src)?;

    let tensors: Vec<TensorInfo> = dict
        .iter()
        .filter(|(name, _)| filter.map_or(true, |pattern| name.contains(pattern)))
        .take(limit)
        .map(|(name, record)| TensorInfo {
            name: name.to_string(),
            dtype: record.dtype.to_string(),
            shape: record.shape.clone(),
            size_bytes: record.size_bytes(),
            category: category_label(name),
        })
        .collect();

    if json {
        let result = TensorsResult {
            file: src.display().to_string(),
            tensor_count: dict.len(),
            total_size_bytes: dict.total_size_bytes(),
            shown: tensors.len(),
            tensors,
        };
        match serde_json::to_string_pretty(&result) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("error: JSON serialization failed: {e}"),
        }
        return Ok(());
    }

    output::section("Tensors");
    output::kv("file", src.display());
    output::kv("tensors", dict.len());
    output::kv(
        "total size",
        output::format_size(dict.total_size_bytes() as u64),
    );
    println!();
    for info in &tensors {
        println!(
            "  {:<60} {:>8} {:>14} {:>12}  {}",
            info.name.white(),
            info.dtype,
            format!("{:?}", info.shape),
            output::format_size(info.size_bytes as u64),
            info.category.dimmed(),
        );
    }
    if tensors.len() < dict.len() {
        output::warning(&format!(
            "showing {} of {} tensors (raise --limit or narrow --filter)",
            tensors.len(),
            dict.len()
        ));
    }
    Ok(())
}
