//! Graph nodes
//!
//! A [`GraphNode`] is either a graph input placeholder, a constant data
//! node (an initializer) or an operator. Decoders build them with the
//! constructors below; the mapper only reads them.

use indexmap::IndexMap;

use crate::error::{ConvertError, ConvertResult};
use crate::tensor::{DataType, Tensor};

use super::attributes::{resolve, AttributeValue, FromAttribute};

/// Role of a node in the decoded graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// External graph input
    Input,
    /// Constant tensor (initializer)
    Data,
    /// Operator
    Op,
}

/// One node of the decoded source graph
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    /// Unique node name
    pub name: String,
    /// Source op type (`"Conv"`, `"Relu"`, ...); empty for inputs and data
    pub op_type: String,
    /// Node role
    pub kind: NodeKind,
    /// Consumed tensor names, an empty string marks an omitted optional input
    pub inputs: Vec<String>,
    /// Produced tensor names
    pub outputs: Vec<String>,
    /// Attributes in declaration order
    pub attributes: IndexMap<String, AttributeValue>,
    /// Constant payload of data nodes
    pub value: Option<Tensor>,
    /// Inferred shape per output; `None` when unknown
    pub out_shapes: Vec<Option<Vec<i64>>>,
    /// Element type of the first output, when known
    pub dtype: Option<DataType>,
}

impl GraphNode {
    /// Create an operator node
    pub fn op(op_type: &str, name: &str, inputs: &[&str], outputs: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            op_type: op_type.to_string(),
            kind: NodeKind::Op,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            attributes: IndexMap::new(),
            value: None,
            out_shapes: vec![None; outputs.len()],
            dtype: None,
        }
    }

    /// Create a graph input placeholder producing tensor `name`
    pub fn input(name: &str, dtype: DataType, shape: &[i64]) -> Self {
        Self {
            name: name.to_string(),
            op_type: String::new(),
            kind: NodeKind::Input,
            inputs: Vec::new(),
            outputs: vec![name.to_string()],
            attributes: IndexMap::new(),
            value: None,
            out_shapes: vec![Some(shape.to_vec())],
            dtype: Some(dtype),
        }
    }

    /// Create a constant data node producing tensor `name`
    pub fn data(name: &str, value: Tensor) -> Self {
        Self {
            name: name.to_string(),
            op_type: String::new(),
            kind: NodeKind::Data,
            inputs: Vec::new(),
            outputs: vec![name.to_string()],
            attributes: IndexMap::new(),
            out_shapes: vec![Some(value.shape())],
            dtype: Some(value.dtype()),
            value: Some(value),
        }
    }

    /// Set an attribute (builder style)
    pub fn with_attr(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Set the inferred shape of output `idx` (builder style)
    pub fn with_shape(mut self, idx: usize, shape: &[i64]) -> Self {
        if self.out_shapes.len() <= idx {
            self.out_shapes.resize(idx + 1, None);
        }
        self.out_shapes[idx] = Some(shape.to_vec());
        self
    }

    /// Set the element type (builder style)
    pub fn with_dtype(mut self, dtype: DataType) -> Self {
        self.dtype = Some(dtype);
        self
    }

    /// Check if attribute is present
    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Required attribute
    pub fn attr<T: FromAttribute>(&self, name: &str) -> ConvertResult<T> {
        resolve(&self.name, name, self.attributes.get(name), None)
    }

    /// Attribute with a default
    pub fn attr_or<T: FromAttribute>(&self, name: &str, default: T) -> ConvertResult<T> {
        resolve(&self.name, name, self.attributes.get(name), Some(default))
    }

    /// Optional attribute; absent yields `None`, wrong kind is still an error
    pub fn attr_opt<T: FromAttribute>(&self, name: &str) -> ConvertResult<Option<T>> {
        match self.attributes.get(name) {
            Some(value) => resolve(&self.name, name, Some(value), None).map(Some),
            None => Ok(None),
        }
    }

    /// Inferred shape of the first output
    pub fn shape(&self) -> Option<&[i64]> {
        self.out_shapes.first().and_then(|s| s.as_deref())
    }

    /// Inferred shape of the first output, failing when unknown
    pub fn known_shape(&self) -> ConvertResult<&[i64]> {
        self.shape()
            .ok_or_else(|| ConvertError::UnknownShape(self.name.clone()))
    }

    /// Primary output tensor name
    pub fn output(&self) -> &str {
        self.outputs.first().map(String::as_str).unwrap_or(&self.name)
    }

    /// Check if output `idx` is present and requested
    pub fn has_output(&self, idx: usize) -> bool {
        self.outputs.get(idx).map(|o| !o.is_empty()).unwrap_or(false)
    }

    /// Check if input `idx` is present (not omitted)
    pub fn has_input(&self, idx: usize) -> bool {
        self.inputs.get(idx).map(|i| !i.is_empty()).unwrap_or(false)
    }

    /// Number of non-empty inputs
    pub fn input_count(&self) -> usize {
        self.inputs.iter().filter(|i| !i.is_empty()).count()
    }

    /// Constant payload, either a data node value or a `Constant` op's `value`
    pub fn constant_value(&self) -> Option<Tensor> {
        match self.kind {
            NodeKind::Data => self.value.clone(),
            NodeKind::Op if self.op_type == "Constant" => self.attr::<Tensor>("value").ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_builder() {
        let node = GraphNode::op("Conv", "conv_0", &["x", "w"], &["y"])
            .with_attr("group", 1i64)
            .with_attr("kernel_shape", vec![3i64, 3])
            .with_shape(0, &[1, 8, 32, 32]);

        assert_eq!(node.kind, NodeKind::Op);
        assert_eq!(node.attr::<i64>("group").unwrap(), 1);
        assert_eq!(node.attr::<Vec<i64>>("kernel_shape").unwrap(), vec![3, 3]);
        assert_eq!(node.shape(), Some(&[1, 8, 32, 32][..]));
        assert_eq!(node.output(), "y");
    }

    #[test]
    fn test_attr_helpers() {
        let node = GraphNode::op("Pad", "pad_0", &["x"], &["y"]).with_attr("mode", "reflect");

        assert!(node.has_attr("mode"));
        assert_eq!(node.attr_or("value", 0.0f32).unwrap(), 0.0);
        assert_eq!(node.attr_opt::<Vec<i64>>("pads").unwrap(), None);
        assert!(node.attr::<Vec<i64>>("pads").is_err());
        assert!(node.attr_opt::<i64>("mode").is_err());
    }

    #[test]
    fn test_data_node() {
        let node = GraphNode::data("w", Tensor::vec_i64(&[1, 2, 3]));
        assert_eq!(node.kind, NodeKind::Data);
        assert_eq!(node.shape(), Some(&[3][..]));
        assert_eq!(node.dtype, Some(DataType::Int64));
        assert_eq!(node.constant_value().unwrap().to_i64_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn test_constant_op_value() {
        let node = GraphNode::op("Constant", "c", &[], &["c_out"])
            .with_attr("value", Tensor::vec_i64(&[4]));
        assert_eq!(node.constant_value().unwrap().to_i64_vec(), vec![4]);

        let relu = GraphNode::op("Relu", "r", &["x"], &["y"]);
        assert!(relu.constant_value().is_none());
    }

    #[test]
    fn test_optional_io() {
        let node = GraphNode::op("GRU", "gru", &["x", "w", "r", "", "", "h0"], &["y", ""]);
        assert!(node.has_input(2));
        assert!(!node.has_input(3));
        assert!(!node.has_input(9));
        assert_eq!(node.input_count(), 4);
        assert!(node.has_output(0));
        assert!(!node.has_output(1));
        assert!(node.known_shape().is_err());
    }
}
