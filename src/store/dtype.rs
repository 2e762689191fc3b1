//! Numeric element types for checkpoint tensors.
//!
//! Covers the dtypes that actually occur in the checkpoints this toolkit
//! operates on: wide floats, half floats, the two common FP8 encodings,
//! and the integer types used for recorded shapes and index tables.
//!
//! FP8 decoding is implemented here by hand (no crate covers both
//! encodings):
//! - `F8E4M3`: 1 sign, 4 exponent (bias 7), 3 mantissa. The "fn" variant:
//!   no infinities, exponent/mantissa all-ones is NaN.
//! - `F8E5M2`: 1 sign, 5 exponent (bias 15), 2 mantissa. IEEE-like with
//!   infinities and NaN.

use crate::error::{RecuperarError, Result};
use half::{bf16, f16};

/// Element type of a stored tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 8-bit float, 4 exponent / 3 mantissa bits (no infinities)
    F8E4M3,
    /// 8-bit float, 5 exponent / 2 mantissa bits
    F8E5M2,
    /// 16-bit IEEE 754 half-precision float
    F16,
    /// 16-bit brain float
    BF16,
    /// 32-bit float
    F32,
    /// 8-bit signed integer
    I8,
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer
    I64,
    /// 8-bit unsigned integer
    U8,
}

impl DType {
    /// Bytes per element.
    #[must_use]
    pub fn size_of(self) -> usize {
        match self {
            Self::F8E4M3 | Self::F8E5M2 | Self::I8 | Self::U8 => 1,
            Self::F16 | Self::BF16 => 2,
            Self::F32 | Self::I32 => 4,
            Self::I64 => 8,
        }
    }

    /// True for any floating-point kind, including reduced precision.
    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(
            self,
            Self::F8E4M3 | Self::F8E5M2 | Self::F16 | Self::BF16 | Self::F32
        )
    }

    /// True for the 8-bit float kinds that require a scale to recover
    /// full-precision magnitude.
    #[must_use]
    pub fn is_reduced_precision(self) -> bool {
        matches!(self, Self::F8E4M3 | Self::F8E5M2)
    }

    /// Container dtype string (safetensors convention).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::F8E4M3 => "F8_E4M3",
            Self::F8E5M2 => "F8_E5M2",
            Self::F16 => "F16",
            Self::BF16 => "BF16",
            Self::F32 => "F32",
            Self::I8 => "I8",
            Self::I32 => "I32",
            Self::I64 => "I64",
            Self::U8 => "U8",
        }
    }

    /// Parse a container dtype string.
    ///
    /// # Errors
    ///
    /// Returns `FormatError` for dtypes this toolkit does not handle.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "F8_E4M3" => Ok(Self::F8E4M3),
            "F8_E5M2" => Ok(Self::F8E5M2),
            "F16" => Ok(Self::F16),
            "BF16" => Ok(Self::BF16),
            "F32" => Ok(Self::F32),
            "I8" => Ok(Self::I8),
            "I32" => Ok(Self::I32),
            "I64" => Ok(Self::I64),
            "U8" => Ok(Self::U8),
            other => Err(RecuperarError::format(format!(
                "unsupported dtype '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decode one E4M3 byte to f32.
///
/// Bias 7. Exponent+mantissa all-ones is NaN (the format has no
/// infinities); exponent zero is subnormal with magnitude `m * 2^-9`.
#[must_use]
pub fn decode_f8_e4m3(byte: u8) -> f32 {
    let sign = if byte & 0x80 != 0 { -1.0_f32 } else { 1.0 };
    let exponent = (byte >> 3) & 0x0F;
    let mantissa = byte & 0x07;

    if exponent == 0x0F && mantissa == 0x07 {
        return f32::NAN;
    }
    let magnitude = if exponent == 0 {
        f32::from(mantissa) * 2.0_f32.powi(-9)
    } else {
        (1.0 + f32::from(mantissa) / 8.0) * 2.0_f32.powi(i32::from(exponent) - 7)
    };
    sign * magnitude
}

/// Decode one E5M2 byte to f32.
///
/// Bias 15. Exponent all-ones encodes infinity (mantissa 0) or NaN;
/// exponent zero is subnormal with magnitude `m * 2^-16`.
#[must_use]
pub fn decode_f8_e5m2(byte: u8) -> f32 {
    let sign = if byte & 0x80 != 0 { -1.0_f32 } else { 1.0 };
    let exponent = (byte >> 2) & 0x1F;
    let mantissa = byte & 0x03;

    if exponent == 0x1F {
        return if mantissa == 0 {
            sign * f32::INFINITY
        } else {
            f32::NAN
        };
    }
    let magnitude = if exponent == 0 {
        f32::from(mantissa) * 2.0_f32.powi(-16)
    } else {
        (1.0 + f32::from(mantissa) / 4.0) * 2.0_f32.powi(i32::from(exponent) - 15)
    };
    sign * magnitude
}

/// Decode raw little-endian bytes of the given float dtype to f32 values.
///
/// This is the single wide-precision upcast used by the dequantization
/// engine; callers are expected to drop the returned buffer before moving
/// to the next tensor.
///
/// # Errors
///
/// Returns `FormatError` for integer dtypes or misaligned byte lengths.
pub fn decode_to_f32(dtype: DType, bytes: &[u8]) -> Result<Vec<f32>> {
    let elem = dtype.size_of();
    if bytes.len() % elem != 0 {
        return Err(RecuperarError::format(format!(
            "byte length {} is not a multiple of element size {elem} for {dtype}",
            bytes.len()
        )));
    }
    match dtype {
        DType::F8E4M3 => Ok(bytes.iter().map(|&b| decode_f8_e4m3(b)).collect()),
        DType::F8E5M2 => Ok(bytes.iter().map(|&b| decode_f8_e5m2(b)).collect()),
        DType::F16 => Ok(bytes
            .chunks_exact(2)
            .map(|c| f16::from_le_bytes([c[0], c[1]]).to_f32())
            .collect()),
        DType::BF16 => Ok(bytes
            .chunks_exact(2)
            .map(|c| bf16::from_le_bytes([c[0], c[1]]).to_f32())
            .collect()),
        DType::F32 => Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()),
        DType::I8 | DType::I32 | DType::I64 | DType::U8 => Err(RecuperarError::format(format!(
            "cannot decode integer dtype {dtype} as float"
        ))),
    }
}

/// Encode f32 values as raw little-endian bytes of the given float dtype.
///
/// Only full-precision output targets are accepted; re-quantizing to FP8
/// is out of scope for this toolkit.
///
/// # Errors
///
/// Returns `FormatError` for FP8 or integer targets.
pub fn encode_from_f32(dtype: DType, values: &[f32]) -> Result<Vec<u8>> {
    match dtype {
        DType::F32 => {
            let mut bytes = Vec::with_capacity(values.len() * 4);
            for &v in values {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
            Ok(bytes)
        }
        DType::F16 => {
            let mut bytes = Vec::with_capacity(values.len() * 2);
            for &v in values {
                bytes.extend_from_slice(&f16::from_f32(v).to_le_bytes());
            }
            Ok(bytes)
        }
        DType::BF16 => {
            let mut bytes = Vec::with_capacity(values.len() * 2);
            for &v in values {
                bytes.extend_from_slice(&bf16::from_f32(v).to_le_bytes());
            }
            Ok(bytes)
        }
        other => Err(RecuperarError::format(format!(
            "cannot encode f32 values as {other}"
        ))),
    }
}
