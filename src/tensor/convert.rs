//! Typed tensor values
//!
//! Constant payloads of data nodes and attributes, plus the parameter
//! tensors collected into the weight table.

use ndarray::{Array, ArrayD, IxDyn};

use crate::error::{ConvertError, ConvertResult};

use super::dtype::DataType;
use super::shape::numel;

/// A dense tensor backed by `ndarray`
#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
    /// bool elements
    Bool(ArrayD<bool>),
    /// uint8 elements
    Uint8(ArrayD<u8>),
    /// int8 elements
    Int8(ArrayD<i8>),
    /// int32 elements
    Int32(ArrayD<i32>),
    /// int64 elements
    Int64(ArrayD<i64>),
    /// float32 elements
    Float32(ArrayD<f32>),
    /// float64 elements
    Float64(ArrayD<f64>),
}

macro_rules! each_variant {
    ($tensor:expr, $arr:ident => $body:expr) => {
        match $tensor {
            Tensor::Bool($arr) => $body,
            Tensor::Uint8($arr) => $body,
            Tensor::Int8($arr) => $body,
            Tensor::Int32($arr) => $body,
            Tensor::Int64($arr) => $body,
            Tensor::Float32($arr) => $body,
            Tensor::Float64($arr) => $body,
        }
    };
}

impl Tensor {
    /// Create a float32 tensor from a shape and row-major data
    pub fn from_f32(shape: &[usize], data: Vec<f32>) -> ConvertResult<Self> {
        Ok(Tensor::Float32(Array::from_shape_vec(IxDyn(shape), data)?))
    }

    /// Create an int64 tensor from a shape and row-major data
    pub fn from_i64(shape: &[usize], data: Vec<i64>) -> ConvertResult<Self> {
        Ok(Tensor::Int64(Array::from_shape_vec(IxDyn(shape), data)?))
    }

    /// Create a float64 tensor from a shape and row-major data
    pub fn from_f64(shape: &[usize], data: Vec<f64>) -> ConvertResult<Self> {
        Ok(Tensor::Float64(Array::from_shape_vec(IxDyn(shape), data)?))
    }

    /// 1-D int64 tensor
    pub fn vec_i64(data: &[i64]) -> Self {
        Tensor::Int64(Array::from_vec(data.to_vec()).into_dyn())
    }

    /// 0-D float32 tensor
    pub fn scalar_f32(value: f32) -> Self {
        Tensor::Float32(ArrayD::from_elem(IxDyn(&[]), value))
    }

    /// Decode little-endian raw bytes, as stored in `TensorProto.raw_data`
    pub fn from_raw(dtype: DataType, dims: &[i64], raw: &[u8]) -> ConvertResult<Self> {
        let shape: Vec<usize> = dims.iter().map(|&d| d.max(0) as usize).collect();
        let expected = numel(dims);
        let elem_size = dtype.size();

        if raw.len() != expected * elem_size {
            return Err(ConvertError::InvalidTensor(format!(
                "Raw data size {} does not match expected {} * {}",
                raw.len(),
                expected,
                elem_size
            )));
        }

        let ix = IxDyn(&shape);
        let tensor = match dtype {
            DataType::Bool => {
                Tensor::Bool(Array::from_shape_vec(ix, raw.iter().map(|&b| b != 0).collect())?)
            }
            DataType::Uint8 => Tensor::Uint8(Array::from_shape_vec(ix, raw.to_vec())?),
            DataType::Int8 => {
                Tensor::Int8(Array::from_shape_vec(ix, raw.iter().map(|&b| b as i8).collect())?)
            }
            DataType::Int32 => Tensor::Int32(Array::from_shape_vec(
                ix,
                raw.chunks_exact(4)
                    .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect(),
            )?),
            DataType::Int64 => Tensor::Int64(Array::from_shape_vec(
                ix,
                raw.chunks_exact(8)
                    .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                    .collect(),
            )?),
            DataType::Float32 => Tensor::Float32(Array::from_shape_vec(
                ix,
                raw.chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect(),
            )?),
            DataType::Float64 => Tensor::Float64(Array::from_shape_vec(
                ix,
                raw.chunks_exact(8)
                    .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                    .collect(),
            )?),
            DataType::Int16 | DataType::Float16 => {
                return Err(ConvertError::InvalidTensor(format!(
                    "{} tensors are not supported",
                    dtype
                )))
            }
        };

        Ok(tensor)
    }

    /// Element type
    pub fn dtype(&self) -> DataType {
        match self {
            Tensor::Bool(_) => DataType::Bool,
            Tensor::Uint8(_) => DataType::Uint8,
            Tensor::Int8(_) => DataType::Int8,
            Tensor::Int32(_) => DataType::Int32,
            Tensor::Int64(_) => DataType::Int64,
            Tensor::Float32(_) => DataType::Float32,
            Tensor::Float64(_) => DataType::Float64,
        }
    }

    /// Dimensions as ONNX-style signed sizes
    pub fn shape(&self) -> Vec<i64> {
        each_variant!(self, a => a.shape().iter().map(|&d| d as i64).collect())
    }

    /// Number of dimensions
    pub fn ndim(&self) -> usize {
        each_variant!(self, a => a.ndim())
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        each_variant!(self, a => a.len())
    }

    /// Check if tensor has no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements widened to f64, in logical order
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            Tensor::Bool(a) => a.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect(),
            Tensor::Uint8(a) => a.iter().map(|&v| v as f64).collect(),
            Tensor::Int8(a) => a.iter().map(|&v| v as f64).collect(),
            Tensor::Int32(a) => a.iter().map(|&v| v as f64).collect(),
            Tensor::Int64(a) => a.iter().map(|&v| v as f64).collect(),
            Tensor::Float32(a) => a.iter().map(|&v| v as f64).collect(),
            Tensor::Float64(a) => a.iter().copied().collect(),
        }
    }

    /// Elements converted to i64 (floats truncate), in logical order
    pub fn to_i64_vec(&self) -> Vec<i64> {
        match self {
            Tensor::Bool(a) => a.iter().map(|&v| v as i64).collect(),
            Tensor::Uint8(a) => a.iter().map(|&v| v as i64).collect(),
            Tensor::Int8(a) => a.iter().map(|&v| v as i64).collect(),
            Tensor::Int32(a) => a.iter().map(|&v| v as i64).collect(),
            Tensor::Int64(a) => a.iter().copied().collect(),
            Tensor::Float32(a) => a.iter().map(|&v| v as i64).collect(),
            Tensor::Float64(a) => a.iter().map(|&v| v as i64).collect(),
        }
    }

    /// Float32 view of the tensor with the same shape
    pub fn to_f32_array(&self) -> ArrayD<f32> {
        match self {
            Tensor::Float32(a) => a.clone(),
            Tensor::Bool(a) => a.mapv(|v| if v { 1.0 } else { 0.0 }),
            Tensor::Uint8(a) => a.mapv(|v| v as f32),
            Tensor::Int8(a) => a.mapv(|v| v as f32),
            Tensor::Int32(a) => a.mapv(|v| v as f32),
            Tensor::Int64(a) => a.mapv(|v| v as f32),
            Tensor::Float64(a) => a.mapv(|v| v as f32),
        }
    }

    /// Reshape to `shape`, keeping logical element order
    pub fn reshape(&self, shape: &[usize]) -> ConvertResult<Self> {
        let expected: usize = shape.iter().product();
        if expected != self.len() {
            return Err(ConvertError::InvalidTensor(format!(
                "cannot reshape {} elements into {:?}",
                self.len(),
                shape
            )));
        }

        let ix = IxDyn(shape);
        Ok(match self {
            Tensor::Bool(a) => Tensor::Bool(Array::from_shape_vec(ix, a.iter().copied().collect())?),
            Tensor::Uint8(a) => {
                Tensor::Uint8(Array::from_shape_vec(ix, a.iter().copied().collect())?)
            }
            Tensor::Int8(a) => Tensor::Int8(Array::from_shape_vec(ix, a.iter().copied().collect())?),
            Tensor::Int32(a) => {
                Tensor::Int32(Array::from_shape_vec(ix, a.iter().copied().collect())?)
            }
            Tensor::Int64(a) => {
                Tensor::Int64(Array::from_shape_vec(ix, a.iter().copied().collect())?)
            }
            Tensor::Float32(a) => {
                Tensor::Float32(Array::from_shape_vec(ix, a.iter().copied().collect())?)
            }
            Tensor::Float64(a) => {
                Tensor::Float64(Array::from_shape_vec(ix, a.iter().copied().collect())?)
            }
        })
    }

    /// Convert elements to `dtype`
    pub fn cast(&self, dtype: DataType) -> ConvertResult<Self> {
        if dtype == self.dtype() {
            return Ok(self.clone());
        }

        let shape: Vec<usize> = self.shape().iter().map(|&d| d as usize).collect();
        let ix = IxDyn(&shape);
        let values = self.to_f64_vec();

        let tensor = match dtype {
            DataType::Bool => {
                Tensor::Bool(Array::from_shape_vec(ix, values.iter().map(|&v| v != 0.0).collect())?)
            }
            DataType::Uint8 => {
                Tensor::Uint8(Array::from_shape_vec(ix, values.iter().map(|&v| v as u8).collect())?)
            }
            DataType::Int8 => {
                Tensor::Int8(Array::from_shape_vec(ix, values.iter().map(|&v| v as i8).collect())?)
            }
            // integer sources go through i64 so large values stay exact
            DataType::Int32 => Tensor::Int32(Array::from_shape_vec(
                ix,
                self.integral_or(values).into_iter().map(|v| v as i32).collect(),
            )?),
            DataType::Int64 => {
                Tensor::Int64(Array::from_shape_vec(ix, self.integral_or(values))?)
            }
            DataType::Float32 => Tensor::Float32(self.to_f32_array()),
            DataType::Float64 => Tensor::Float64(Array::from_shape_vec(ix, values)?),
            DataType::Int16 | DataType::Float16 => {
                return Err(ConvertError::InvalidTensor(format!(
                    "cannot cast to {}",
                    dtype
                )))
            }
        };

        Ok(tensor)
    }

    fn integral_or(&self, values: Vec<f64>) -> Vec<i64> {
        if self.dtype().is_float() {
            values.into_iter().map(|v| v as i64).collect()
        } else {
            self.to_i64_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_f32() {
        let raw: Vec<u8> = vec![1.0f32, 2.0f32]
            .iter()
            .flat_map(|f| f.to_le_bytes())
            .collect();

        let tensor = Tensor::from_raw(DataType::Float32, &[2], &raw).unwrap();
        assert_eq!(tensor.shape(), vec![2]);
        assert_eq!(tensor.to_f64_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_from_raw_size_mismatch() {
        let raw = vec![0u8; 7];
        assert!(Tensor::from_raw(DataType::Int64, &[1], &raw).is_err());
    }

    #[test]
    fn test_reshape_and_len() {
        let tensor = Tensor::from_f32(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(tensor.len(), 6);
        let reshaped = tensor.reshape(&[3, 2]).unwrap();
        assert_eq!(reshaped.shape(), vec![3, 2]);
        assert_eq!(reshaped.to_f64_vec(), tensor.to_f64_vec());
        assert!(tensor.reshape(&[4]).is_err());
    }

    #[test]
    fn test_cast_int64_to_int32() {
        let tensor = Tensor::vec_i64(&[1, -2, 3]);
        let cast = tensor.cast(DataType::Int32).unwrap();
        assert_eq!(cast.dtype(), DataType::Int32);
        assert_eq!(cast.to_i64_vec(), vec![1, -2, 3]);
    }

    #[test]
    fn test_cast_bool_roundtrip() {
        let tensor = Tensor::Bool(ArrayD::from_shape_vec(IxDyn(&[2]), vec![true, false]).unwrap());
        let ints = tensor.cast(DataType::Int64).unwrap();
        assert_eq!(ints.to_i64_vec(), vec![1, 0]);
        assert_eq!(ints.cast(DataType::Bool).unwrap(), tensor);
    }

    #[test]
    fn test_scalar() {
        let tensor = Tensor::scalar_f32(0.5);
        assert_eq!(tensor.ndim(), 0);
        assert_eq!(tensor.len(), 1);
        assert!(tensor.shape().is_empty());
    }
}
