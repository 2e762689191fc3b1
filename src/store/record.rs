//! Tensor records: dtype + shape + exclusively owned raw bytes.

use crate::error::{RecuperarError, Result};
use crate::store::dtype::{decode_to_f32, encode_from_f32, DType};

/// A single stored tensor.
///
/// The raw data buffer is exclusively owned by the record; engines replace
/// the whole record rather than aliasing into it, so at no point do two
/// live copies of a large tensor exist.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorRecord {
    /// Element type
    pub dtype: DType,
    /// Ordered dimensions; empty for a scalar
    pub shape: Vec<usize>,
    /// Raw little-endian element bytes
    pub data: Vec<u8>,
}

impl TensorRecord {
    /// Create a record, enforcing `data.len() == num_elements * size_of(dtype)`.
    ///
    /// # Errors
    ///
    /// Returns `FormatError` if the byte length disagrees with the shape,
    /// or if the shape's element count does not fit in `usize` (hostile
    /// header input lands here).
    pub fn new(dtype: DType, shape: Vec<usize>, data: Vec<u8>) -> Result<Self> {
        let expected = checked_byte_len(&shape, dtype)?;
        if data.len() != expected {
            return Err(RecuperarError::format(format!(
                "tensor data is {} bytes, shape {:?} with dtype {} requires {}",
                data.len(),
                shape,
                dtype,
                expected
            )));
        }
        Ok(Self { dtype, shape, data })
    }

    /// Build a record from f32 values encoded as `dtype`.
    ///
    /// # Errors
    ///
    /// Returns `FormatError` if `dtype` is not a full-precision float target
    /// or the value count disagrees with the shape.
    pub fn from_f32(dtype: DType, shape: Vec<usize>, values: &[f32]) -> Result<Self> {
        let expected = checked_num_elements(&shape)?;
        if values.len() != expected {
            return Err(RecuperarError::format(format!(
                "{} values for shape {:?} (expected {})",
                values.len(),
                shape,
                expected
            )));
        }
        let data = encode_from_f32(dtype, values)?;
        Ok(Self { dtype, shape, data })
    }

    /// Number of dimensions.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Total element count (1 for a scalar).
    #[must_use]
    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// True for rank-0 tensors.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    /// Decode the full tensor to f32 (the wide transient buffer).
    ///
    /// # Errors
    ///
    /// Returns `FormatError` for integer dtypes.
    pub fn to_f32(&self) -> Result<Vec<f32>> {
        decode_to_f32(self.dtype, &self.data)
    }

    /// Read a single-element tensor as f64.
    ///
    /// # Errors
    ///
    /// Returns `ScaleNotScalar` context via `FormatError` for multi-element
    /// tensors and `FormatError` for integer dtypes; callers that enforce
    /// the scale contract check `num_elements` first.
    pub fn scalar_f64(&self) -> Result<f64> {
        if self.num_elements() != 1 {
            return Err(RecuperarError::format(format!(
                "expected a single-element tensor, found {} elements",
                self.num_elements()
            )));
        }
        let values = self.to_f32()?;
        Ok(f64::from(values[0]))
    }

    /// Size of the raw data in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

/// Element count of a shape, rejecting products that overflow `usize`.
fn checked_num_elements(shape: &[usize]) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| {
            RecuperarError::format(format!("shape {shape:?} element count overflows usize"))
        })
}

/// Byte length of a shape at the given dtype, overflow-checked.
fn checked_byte_len(shape: &[usize], dtype: DType) -> Result<usize> {
    checked_num_elements(shape)?
        .checked_mul(dtype.size_of())
        .ok_or_else(|| {
            RecuperarError::format(format!(
                "shape {shape:?} byte length overflows usize for dtype {dtype}"
            ))
        })
}
