//! Checkpoint storage: dtypes, tensor records, the ordered dictionary,
//! and the safetensors-layout container glue.
//!
//! The container is an external boundary: everything above this module
//! treats a checkpoint as an ordered name → {dtype, shape, bytes} mapping
//! plus a string metadata map, regardless of what holds it on disk.

pub mod dict;
pub mod dtype;
pub mod record;
pub mod safetensors;

pub use dict::CheckpointDictionary;
pub use dtype::DType;
pub use record::TensorRecord;
