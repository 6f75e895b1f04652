//! Structured literals
//!
//! Attribute values of emitted records stay structured; quoting and
//! escaping happen only when a program is rendered.

use serde::Serialize;

use crate::graph::AttributeValue;
use crate::tensor::DataType;

/// Literal or reference carried by an operation record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Absent value (`None`)
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// Integer list
    Ints(Vec<i64>),
    /// Float list
    Floats(Vec<f64>),
    /// String literal
    Str(String),
    /// String list
    Strs(Vec<String>),
    /// Reference to a program variable
    Var(String),
    /// Raw expression, e.g. an initializer `Constant(0.0)`
    Expr(String),
    /// Element type
    DType(DataType),
}

impl Value {
    /// String literal
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Variable reference
    pub fn var(s: impl Into<String>) -> Self {
        Value::Var(s.into())
    }

    /// Raw expression
    pub fn expr(s: impl Into<String>) -> Self {
        Value::Expr(s.into())
    }

    /// Integer payload, if any
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer list payload, if any
    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            Value::Ints(v) => Some(v),
            _ => None,
        }
    }

    /// Node attribute carrying this value
    ///
    /// Bools become 0/1 and dtypes their ONNX code. References and
    /// expressions have no attribute form.
    pub fn to_attribute(&self) -> Option<AttributeValue> {
        match self {
            Value::Bool(b) => Some(AttributeValue::Int(i64::from(*b))),
            Value::Int(v) => Some(AttributeValue::Int(*v)),
            Value::Float(v) => Some(AttributeValue::Float(*v as f32)),
            Value::Ints(v) => Some(AttributeValue::Ints(v.clone())),
            Value::Floats(v) => Some(AttributeValue::Floats(v.iter().map(|&f| f as f32).collect())),
            Value::Str(s) => Some(AttributeValue::String(s.clone())),
            Value::Strs(v) => Some(AttributeValue::Strings(v.clone())),
            Value::DType(d) => Some(AttributeValue::Int(d.to_onnx())),
            Value::Null | Value::Var(_) | Value::Expr(_) => None,
        }
    }

    /// Render as a Python-style literal
    pub fn render(&self) -> String {
        fn float(v: f64) -> String {
            if v.is_finite() && v.fract() == 0.0 {
                format!("{:.1}", v)
            } else {
                format!("{}", v)
            }
        }

        match self {
            Value::Null => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => float(*v),
            Value::Ints(v) => format!(
                "[{}]",
                v.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
            ),
            Value::Floats(v) => format!(
                "[{}]",
                v.iter().map(|f| float(*f)).collect::<Vec<_>>().join(", ")
            ),
            Value::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Value::Strs(v) => format!(
                "[{}]",
                v.iter()
                    .map(|s| Value::Str(s.clone()).render())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Value::Var(s) | Value::Expr(s) => s.clone(),
            Value::DType(d) => format!("'{}'", d),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::Ints(v)
    }
}

impl From<&[i64]> for Value {
    fn from(v: &[i64]) -> Self {
        Value::Ints(v.to_vec())
    }
}

impl From<Vec<f32>> for Value {
    fn from(v: Vec<f32>) -> Self {
        Value::Floats(v.into_iter().map(f64::from).collect())
    }
}

impl From<DataType> for Value {
    fn from(v: DataType) -> Self {
        Value::DType(v)
    }
}

impl From<&AttributeValue> for Value {
    fn from(v: &AttributeValue) -> Self {
        match v {
            AttributeValue::Int(i) => Value::Int(*i),
            AttributeValue::Float(f) => Value::Float(f64::from(*f)),
            AttributeValue::String(s) => Value::Str(s.clone()),
            AttributeValue::Ints(v) => Value::Ints(v.clone()),
            AttributeValue::Floats(v) => Value::Floats(v.iter().map(|&f| f64::from(f)).collect()),
            AttributeValue::Strings(v) => Value::Strs(v.clone()),
            AttributeValue::Tensor(t) => {
                if t.dtype().is_float() {
                    Value::Floats(t.to_f64_vec())
                } else {
                    Value::Ints(t.to_i64_vec())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_literals() {
        assert_eq!(Value::Null.render(), "None");
        assert_eq!(Value::Bool(false).render(), "False");
        assert_eq!(Value::Float(1.0).render(), "1.0");
        assert_eq!(Value::Ints(vec![1, 2]).render(), "[1, 2]");
        assert_eq!(Value::str("NCHW").render(), "'NCHW'");
        assert_eq!(Value::var("x_padded").render(), "x_padded");
        assert_eq!(Value::expr("Constant(0.0)").render(), "Constant(0.0)");
        assert_eq!(Value::DType(DataType::Int32).render(), "'int32'");
    }

    #[test]
    fn test_quoting_is_escaped() {
        assert_eq!(Value::str("it's").render(), "'it\\'s'");
    }

    #[test]
    fn test_from_attribute() {
        let v = Value::from(&AttributeValue::Ints(vec![0, 1]));
        assert_eq!(v, Value::Ints(vec![0, 1]));
        assert_eq!(v.as_ints(), Some(&[0, 1][..]));

        let s = Value::from(&AttributeValue::String("mode".to_string()));
        assert_eq!(s, Value::str("mode"));
    }

    #[test]
    fn test_to_attribute() {
        assert_eq!(Value::Bool(true).to_attribute(), Some(AttributeValue::Int(1)));
        assert_eq!(Value::Float(0.5).to_attribute(), Some(AttributeValue::Float(0.5)));
        assert_eq!(Value::DType(DataType::Int64).to_attribute(), Some(AttributeValue::Int(7)));
        assert_eq!(Value::var("x").to_attribute(), None);
        assert_eq!(Value::Null.to_attribute(), None);
    }

    #[test]
    fn test_serialize_tagged() {
        let json = serde_json::to_string(&Value::Int(3)).unwrap();
        assert_eq!(json, r#"{"kind":"int","value":3}"#);
        let json = serde_json::to_string(&Value::DType(DataType::Float32)).unwrap();
        assert_eq!(json, r#"{"kind":"d_type","value":"float32"}"#);
    }
}
