//! Insertion-ordered checkpoint dictionary.
//!
//! Checkpoints are written back in the order their tensors were read, so
//! the mapping keeps an explicit key order next to the hash storage
//! (a `BTreeMap` would silently re-sort producer key order). Dictionary
//! level string metadata rides along for the shape side-channel and any
//! producer metadata worth preserving.

use crate::store::record::TensorRecord;
use std::collections::{BTreeMap, HashMap};

/// Ordered name → tensor mapping plus dictionary-level string metadata.
#[derive(Debug, Default, Clone)]
pub struct CheckpointDictionary {
    order: Vec<String>,
    records: HashMap<String, TensorRecord>,
    /// Dictionary-level metadata (string → string), preserved through
    /// load/save and used for the shape-restoration side-channel.
    pub metadata: BTreeMap<String, String>,
}

impl CheckpointDictionary {
    /// Create an empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tensors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no tensors are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert a tensor. A re-insert under an existing name replaces the
    /// record but keeps its original position in the output order.
    pub fn insert(&mut self, name: impl Into<String>, record: TensorRecord) {
        let name = name.into();
        if !self.records.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.records.insert(name, record);
    }

    /// Look up a tensor by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TensorRecord> {
        self.records.get(name)
    }

    /// Mutable lookup, for in-place shape or data edits that must not
    /// disturb the output order.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut TensorRecord> {
        self.records.get_mut(name)
    }

    /// True when a tensor with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Merge another dictionary into this one, prepending `prefix` to any
    /// incoming key that does not already carry it. Incoming records
    /// overwrite same-named entries (keeping their position); overwritten
    /// names are returned for reporting.
    pub fn merge_prefixed(&mut self, other: CheckpointDictionary, prefix: &str) -> Vec<String> {
        let mut overwritten = Vec::new();
        for (name, record) in other {
            let key = if name.starts_with(prefix) {
                name
            } else {
                format!("{prefix}{name}")
            };
            if self.contains(&key) {
                overwritten.push(key.clone());
            }
            self.insert(key, record);
        }
        overwritten
    }

    /// Remove a tensor by name, returning it (by move, never a copy).
    pub fn remove(&mut self, name: &str) -> Option<TensorRecord> {
        let record = self.records.remove(name)?;
        self.order.retain(|n| n != name);
        Some(record)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Snapshot of the keys in insertion order.
    ///
    /// Engines that delete or replace entries mid-sweep iterate this
    /// snapshot instead of the live mapping.
    #[must_use]
    pub fn key_snapshot(&self) -> Vec<String> {
        self.order.clone()
    }

    /// (name, record) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TensorRecord)> {
        self.order
            .iter()
            .filter_map(|name| self.records.get(name).map(|r| (name.as_str(), r)))
    }

    /// Total raw data size in bytes.
    #[must_use]
    pub fn total_size_bytes(&self) -> usize {
        self.records.values().map(TensorRecord::size_bytes).sum()
    }

    /// Bulk memory reclamation pass.
    ///
    /// Deleting tensors leaves the hash storage and key vector holding
    /// capacity sized for the pre-delete population; on checkpoints near
    /// physical memory that slack matters. The dequantization engine calls
    /// this after every fixed-size batch.
    pub fn compact(&mut self) {
        self.records.shrink_to_fit();
        self.order.shrink_to_fit();
    }
}

impl IntoIterator for CheckpointDictionary {
    type Item = (String, TensorRecord);
    type IntoIter = std::vec::IntoIter<(String, TensorRecord)>;

    fn into_iter(mut self) -> Self::IntoIter {
        let mut pairs = Vec::with_capacity(self.order.len());
        for name in std::mem::take(&mut self.order) {
            if let Some(record) = self.records.remove(&name) {
                pairs.push((name, record));
            }
        }
        pairs.into_iter()
    }
}
