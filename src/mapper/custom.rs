//! Custom-layer fallback
//!
//! Op types without a native Fluid mapping can be registered here together
//! with the source of a generated layer function. The converter then emits a
//! call to `custom_<op_type>` and records the source once per op type so the
//! rendered program stays self-contained.

use indexmap::IndexMap;

use crate::error::ConvertResult;
use crate::fluid::{Inputs, OperationRecord, Value};
use crate::graph::GraphNode;

use super::context::MapContext;

/// A generated layer for one source op type
#[derive(Debug, Clone, PartialEq)]
pub struct CustomLayer {
    /// Source op type handled by this layer
    pub op_type: String,
    /// Declared parameters with their defaults, in call order
    pub params: IndexMap<String, Value>,
    /// Layer function source
    pub source: String,
    /// Optional helper function source
    pub child_source: Option<String>,
}

impl CustomLayer {
    /// Create a layer with no parameters
    pub fn new(op_type: &str, source: &str) -> Self {
        Self {
            op_type: op_type.to_string(),
            params: IndexMap::new(),
            source: source.to_string(),
            child_source: None,
        }
    }

    /// Declare a parameter and its default (builder style)
    pub fn with_param(mut self, name: &str, default: impl Into<Value>) -> Self {
        self.params.insert(name.to_string(), default.into());
        self
    }

    /// Attach a helper function source (builder style)
    pub fn with_child_source(mut self, source: &str) -> Self {
        self.child_source = Some(source.to_string());
        self
    }

    /// Generated function identity, `custom_<snake_case op type>`
    pub fn func_name(&self) -> String {
        format!("custom_{}", to_snake_case(&self.op_type))
    }
}

/// Op type → custom layer
#[derive(Debug, Clone, Default)]
pub struct CustomLayerRegistry {
    layers: IndexMap<String, CustomLayer>,
}

impl CustomLayerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a layer, replacing any previous one for the same op type
    pub fn register(&mut self, layer: CustomLayer) {
        self.layers.insert(layer.op_type.clone(), layer);
    }

    /// Get the layer for an op type
    pub fn get(&self, op_type: &str) -> Option<&CustomLayer> {
        self.layers.get(op_type)
    }

    /// Check if an op type is registered
    pub fn contains(&self, op_type: &str) -> bool {
        self.layers.contains_key(op_type)
    }

    /// Number of registered layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Emit a call to a registered custom layer
pub fn deal_custom_layer(
    node: &GraphNode,
    layer: &CustomLayer,
    ctx: &mut MapContext<'_>,
) -> ConvertResult<()> {
    let mut record = OperationRecord::with_outputs(
        &layer.func_name(),
        Inputs::list(node.inputs.iter().filter(|i| !i.is_empty())),
        node.outputs.iter().filter(|o| !o.is_empty()),
    );
    for (param, default) in &layer.params {
        let value = node
            .attributes
            .get(param)
            .map(Value::from)
            .unwrap_or_else(|| default.clone());
        record = record.attr(param, value);
    }
    record = record.named(&node.name);
    record.is_custom_layer = true;
    ctx.emit(record);

    let op = &layer.op_type;
    if !ctx.custom_layers.contains_key(op) {
        ctx.custom_layers.insert(op.clone(), layer.source.clone());
        let child_key = format!("{}_child_func", op);
        if let Some(child) = &layer.child_source {
            ctx.custom_layers.entry(child_key).or_insert_with(|| child.clone());
        }
    }

    Ok(())
}

fn to_snake_case(op_type: &str) -> String {
    let mut out = String::with_capacity(op_type.len() + 4);
    let chars: Vec<char> = op_type.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
            if i > 0 && (prev_lower || (next_lower && chars[i - 1].is_uppercase())) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::tensor::DataType;

    fn registry() -> CustomLayerRegistry {
        let mut registry = CustomLayerRegistry::new();
        registry.register(
            CustomLayer::new("InstanceNormX", "def custom_instance_norm_x(x, eps=1e-5):\n    ...")
                .with_param("epsilon", 1e-5f32)
                .with_param("momentum", 0.9f32)
                .with_child_source("def helper():\n    ..."),
        );
        registry
    }

    #[test]
    fn test_func_name() {
        assert_eq!(CustomLayer::new("InstanceNormX", "").func_name(), "custom_instance_norm_x");
        assert_eq!(CustomLayer::new("ROIAlign", "").func_name(), "custom_roi_align");
        assert_eq!(CustomLayer::new("Relu6", "").func_name(), "custom_relu6");
    }

    #[test]
    fn test_custom_layer_record_and_source_once() {
        let graph = Graph::new(
            vec![
                GraphNode::input("x", DataType::Float32, &[1, 4]),
                GraphNode::op("InstanceNormX", "n0", &["x"], &["y0"]).with_attr("epsilon", 0.1f32),
                GraphNode::op("InstanceNormX", "n1", &["y0"], &["y1"]),
            ],
            vec!["y1".to_string()],
        )
        .unwrap();
        let registry = registry();
        let mut ctx = MapContext::new(&graph);
        let layer = registry.get("InstanceNormX").unwrap();

        for name in ["n0", "n1"] {
            let node = graph.get_node(name).unwrap();
            deal_custom_layer(node, layer, &mut ctx).unwrap();
        }

        let records = ctx.take_records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.is_custom_layer));
        assert_eq!(records[0].op, "custom_instance_norm_x");
        assert_eq!(records[0].get_attr("epsilon"), Some(&Value::from(0.1f32)));
        assert_eq!(records[1].get_attr("epsilon"), Some(&Value::from(1e-5f32)));
        assert_eq!(records[1].get_attr("momentum"), Some(&Value::from(0.9f32)));

        assert_eq!(ctx.custom_layers.len(), 2);
        assert!(ctx.custom_layers.contains_key("InstanceNormX"));
        assert!(ctx.custom_layers.contains_key("InstanceNormX_child_func"));
    }
}
