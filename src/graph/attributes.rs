//! Node attributes
//!
//! Typed attribute values as delivered by the decoder, and the
//! [`FromAttribute`] conversions used to read them back in the shape a
//! translator expects.

use crate::error::{ConvertError, ConvertResult};
use crate::tensor::Tensor;

/// A decoded attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// INT
    Int(i64),
    /// FLOAT
    Float(f32),
    /// STRING
    String(String),
    /// TENSOR
    Tensor(Tensor),
    /// INTS
    Ints(Vec<i64>),
    /// FLOATS
    Floats(Vec<f32>),
    /// STRINGS
    Strings(Vec<String>),
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<f32> for AttributeValue {
    fn from(v: f32) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<Vec<i64>> for AttributeValue {
    fn from(v: Vec<i64>) -> Self {
        AttributeValue::Ints(v)
    }
}

impl From<&[i64]> for AttributeValue {
    fn from(v: &[i64]) -> Self {
        AttributeValue::Ints(v.to_vec())
    }
}

impl From<Vec<f32>> for AttributeValue {
    fn from(v: Vec<f32>) -> Self {
        AttributeValue::Floats(v)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(v: Vec<String>) -> Self {
        AttributeValue::Strings(v)
    }
}

impl From<Tensor> for AttributeValue {
    fn from(v: Tensor) -> Self {
        AttributeValue::Tensor(v)
    }
}

/// Conversion from an [`AttributeValue`] into a concrete Rust type
///
/// Returns `None` when the stored value cannot represent `Self`.
pub trait FromAttribute: Sized {
    /// Name used in `AttributeType` errors
    const EXPECTED: &'static str;

    /// Convert, normalizing where the representation allows it
    fn from_attribute(value: &AttributeValue) -> Option<Self>;
}

impl FromAttribute for i64 {
    const EXPECTED: &'static str = "int";

    fn from_attribute(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromAttribute for f32 {
    const EXPECTED: &'static str = "float";

    fn from_attribute(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Float(v) => Some(*v),
            AttributeValue::Int(v) => Some(*v as f32),
            _ => None,
        }
    }
}

impl FromAttribute for f64 {
    const EXPECTED: &'static str = "float";

    fn from_attribute(value: &AttributeValue) -> Option<Self> {
        f32::from_attribute(value).map(f64::from)
    }
}

impl FromAttribute for bool {
    const EXPECTED: &'static str = "bool";

    fn from_attribute(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Int(v) => Some(*v != 0),
            _ => None,
        }
    }
}

impl FromAttribute for String {
    const EXPECTED: &'static str = "string";

    fn from_attribute(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::String(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromAttribute for Vec<i64> {
    const EXPECTED: &'static str = "int list";

    fn from_attribute(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Ints(v) => Some(v.clone()),
            AttributeValue::Int(v) => Some(vec![*v]),
            _ => None,
        }
    }
}

impl FromAttribute for Vec<f32> {
    const EXPECTED: &'static str = "float list";

    fn from_attribute(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Floats(v) => Some(v.clone()),
            AttributeValue::Ints(v) => Some(v.iter().map(|&i| i as f32).collect()),
            AttributeValue::Float(v) => Some(vec![*v]),
            AttributeValue::Int(v) => Some(vec![*v as f32]),
            _ => None,
        }
    }
}

impl FromAttribute for Vec<String> {
    const EXPECTED: &'static str = "string list";

    fn from_attribute(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Strings(v) => Some(v.clone()),
            AttributeValue::String(v) => Some(vec![v.clone()]),
            _ => None,
        }
    }
}

impl FromAttribute for Tensor {
    const EXPECTED: &'static str = "tensor";

    fn from_attribute(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Tensor(t) => Some(t.clone()),
            _ => None,
        }
    }
}

/// Read `attr` from a node attribute, falling back to `default`
///
/// Absent without a default fails with `MissingAttribute`; present but of
/// the wrong kind fails with `AttributeType`.
pub fn resolve<T: FromAttribute>(
    node_name: &str,
    attr: &str,
    value: Option<&AttributeValue>,
    default: Option<T>,
) -> ConvertResult<T> {
    match value {
        Some(v) => T::from_attribute(v).ok_or_else(|| ConvertError::AttributeType {
            node: node_name.to_string(),
            attr: attr.to_string(),
            expected: T::EXPECTED,
        }),
        None => default.ok_or_else(|| ConvertError::MissingAttribute {
            node: node_name.to_string(),
            attr: attr.to_string(),
        }),
    }
}
