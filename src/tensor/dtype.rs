//! Element data types
//!
//! Maps ONNX `TensorProto.DataType` codes onto the Fluid dtype names and
//! encodes the narrowing/widening policy applied when tensors become
//! Fluid parameters.

use serde::Serialize;
use strum_macros::{Display, EnumString};

use crate::error::{ConvertError, ConvertResult};

/// Element type of a tensor, named the way Fluid spells it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DataType {
    /// bool
    Bool,
    /// uint8
    Uint8,
    /// int8
    Int8,
    /// int16
    Int16,
    /// int32
    Int32,
    /// int64
    Int64,
    /// float16
    Float16,
    /// float32
    Float32,
    /// float64
    Float64,
}

impl DataType {
    /// Convert an ONNX `TensorProto.DataType` code
    pub fn from_onnx(code: i64) -> ConvertResult<Self> {
        match code {
            1 => Ok(DataType::Float32),
            2 => Ok(DataType::Uint8),
            3 => Ok(DataType::Int8),
            5 => Ok(DataType::Int16),
            6 => Ok(DataType::Int32),
            7 => Ok(DataType::Int64),
            9 => Ok(DataType::Bool),
            10 => Ok(DataType::Float16),
            11 => Ok(DataType::Float64),
            _ => Err(ConvertError::InvalidTensor(format!(
                "unsupported ONNX data type code {}",
                code
            ))),
        }
    }

    /// ONNX `TensorProto.DataType` code
    pub fn to_onnx(self) -> i64 {
        match self {
            DataType::Float32 => 1,
            DataType::Uint8 => 2,
            DataType::Int8 => 3,
            DataType::Int16 => 5,
            DataType::Int32 => 6,
            DataType::Int64 => 7,
            DataType::Bool => 9,
            DataType::Float16 => 10,
            DataType::Float64 => 11,
        }
    }

    /// Size in bytes of one element
    pub fn size(self) -> usize {
        match self {
            DataType::Bool | DataType::Uint8 | DataType::Int8 => 1,
            DataType::Int16 | DataType::Float16 => 2,
            DataType::Int32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::Float64 => 8,
        }
    }

    /// Check if data type is floating point
    pub fn is_float(self) -> bool {
        matches!(
            self,
            DataType::Float16 | DataType::Float32 | DataType::Float64
        )
    }

    /// Check if data type is integer
    pub fn is_int(self) -> bool {
        matches!(
            self,
            DataType::Uint8 | DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        )
    }
}

/// Dtype a general parameter is stored as
///
/// int64 narrows to the Fluid default integer width, uint8 widens to float32.
pub fn parameter_dtype(dtype: DataType) -> DataType {
    match dtype {
        DataType::Int64 => DataType::Int32,
        DataType::Uint8 => DataType::Float32,
        other => other,
    }
}

/// Dtype a multi-element `Constant` value is stored as
///
/// Constants usually carry shapes, so uint8 widens to int64 instead.
pub fn constant_dtype(dtype: DataType) -> DataType {
    match dtype {
        DataType::Int64 => DataType::Int32,
        DataType::Uint8 => DataType::Int64,
        other => other,
    }
}

/// Dtype of a `fill_constant` value
pub fn fill_dtype(dtype: DataType) -> DataType {
    match dtype {
        DataType::Int64 => DataType::Int32,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_from_onnx() {
        assert_eq!(DataType::from_onnx(1).unwrap(), DataType::Float32);
        assert_eq!(DataType::from_onnx(7).unwrap(), DataType::Int64);
        assert_eq!(DataType::from_onnx(9).unwrap(), DataType::Bool);
        assert!(DataType::from_onnx(999).is_err());
    }

    #[test]
    fn test_to_onnx() {
        assert_eq!(DataType::Float32.to_onnx(), 1);
        assert_eq!(DataType::Int32.to_onnx(), 6);
        assert_eq!(DataType::Bool.to_onnx(), 9);
        assert_eq!(DataType::from_onnx(DataType::Float64.to_onnx()).unwrap(), DataType::Float64);
    }

    #[test]
    fn test_display_matches_fluid_names() {
        assert_eq!(DataType::Float32.to_string(), "float32");
        assert_eq!(DataType::Int64.to_string(), "int64");
        assert_eq!(DataType::from_str("uint8").unwrap(), DataType::Uint8);
    }

    #[test]
    fn test_size() {
        assert_eq!(DataType::Float32.size(), 4);
        assert_eq!(DataType::Int64.size(), 8);
        assert_eq!(DataType::Bool.size(), 1);
    }

    #[test]
    fn test_dtype_policy() {
        assert_eq!(parameter_dtype(DataType::Int64), DataType::Int32);
        assert_eq!(parameter_dtype(DataType::Uint8), DataType::Float32);
        assert_eq!(constant_dtype(DataType::Uint8), DataType::Int64);
        assert_eq!(constant_dtype(DataType::Int64), DataType::Int32);
        assert_eq!(fill_dtype(DataType::Int64), DataType::Int32);
        assert_eq!(fill_dtype(DataType::Float32), DataType::Float32);
    }
}
