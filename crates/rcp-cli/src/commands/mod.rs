//! Subcommand implementations

use crate::error::{CliError, Result};
use clap::ValueEnum;
use recuperar::store::DType;
use std::path::Path;

pub(crate) mod dequant;
pub(crate) mod prepare;
pub(crate) mod remove_scalars;
pub(crate) mod restore;
pub(crate) mod split;
pub(crate) mod tensors;

/// Target precision for dequantization (CLI spelling)
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Precision {
    Fp32,
    Fp16,
    Bf16,
}

impl Precision {
    pub(crate) fn to_dtype(self) -> DType {
        match self {
            Self::Fp32 => DType::F32,
            Self::Fp16 => DType::F16,
            Self::Bf16 => DType::BF16,
        }
    }
}

/// Reject missing or non-file source paths before any load attempt.
pub(crate) fn validate_source(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(CliError::FileNotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(CliError::NotAFile(path.to_path_buf()));
    }
    Ok(())
}

/// Refuse to clobber an existing destination unless --overwrite was given.
pub(crate) fn ensure_destination(path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        return Err(CliError::DestinationExists(path.to_path_buf()));
    }
    Ok(())
}
