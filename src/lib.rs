//! Recuperar: checkpoint recovery and transformation in pure Rust.
//!
//! Recuperar restores FP8-quantized diffusion checkpoints to a usable
//! floating-point form and reshapes them for constrained consumers:
//! scale-aware dequantization, key classification, component splitting,
//! and rank reduction with recoverable shape metadata.
//!
//! # Quick Start
//!
//! ```no_run
//! use recuperar::dequant::{dequantize_in_place, DequantOptions};
//! use recuperar::store::{safetensors, DType};
//!
//! # fn main() -> recuperar::Result<()> {
//! let mut dict = safetensors::load("model.fp8.safetensors")?;
//! let report = dequantize_in_place(&mut dict, &DequantOptions::new(DType::F16))?;
//! println!("restored {} weights", report.restored);
//! safetensors::save(&dict, "model.f16.safetensors")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`store`]: Tensor records, dtypes, and safetensors I/O
//! - [`classify`]: Key classification and architecture variant detection
//! - [`scale`]: Multi-strategy scale factor resolution
//! - [`dequant`]: In-place dequantization and the normalization sweep
//! - [`rank`]: Rank reduction with recoverable shape metadata
//! - [`split`]: Component splitting and scalar filtering

pub mod classify;
pub mod dequant;
pub mod error;
pub mod rank;
pub mod scale;
pub mod split;
pub mod store;

pub use error::{RecuperarError, Result};
