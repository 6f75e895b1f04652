//! Whole-graph conversion
//!
//! The [`Converter`] walks a decoded [`Graph`] in stored order. Inputs become
//! `data` placeholders, constant data nodes become parameters and operator
//! nodes go through the translator table of the selected opset, falling back
//! to registered custom layers. Op types with neither are collected and
//! reported together once the walk is over.
//!
//! # Example
//!
//! ```ignore
//! use fluid_converter::prelude::*;
//!
//! let options = ConvertOptions::default().with_opset(11);
//! let program = Converter::new(options)?.convert(&graph)?;
//! println!("{}", program.render());
//! ```

mod program;

pub use program::{ConvertStats, ConvertedProgram, WeightInfo};

use std::collections::BTreeSet;

use crate::error::{ConvertError, ConvertResult};
use crate::fluid::OperationRecord;
use crate::graph::{Graph, GraphNode, NodeKind};
use crate::mapper::data::{create_parameter, place_holder};
use crate::mapper::{deal_custom_layer, CustomLayer, CustomLayerRegistry, MapContext};
use crate::opset::{select_opset, TranslatorSet};

/// Conversion options
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Requested opset version; the highest supported version not above it is used
    pub opset_version: i64,
    /// Fallback layers for op types without a translator
    pub custom_layers: CustomLayerRegistry,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            opset_version: 9,
            custom_layers: CustomLayerRegistry::new(),
        }
    }
}

impl ConvertOptions {
    /// Set the requested opset version
    pub fn with_opset(mut self, version: i64) -> Self {
        self.opset_version = version;
        self
    }

    /// Register a custom layer
    pub fn with_custom_layer(mut self, layer: CustomLayer) -> Self {
        self.custom_layers.register(layer);
        self
    }
}

/// Graph → Fluid program driver
#[derive(Debug, Clone)]
pub struct Converter {
    options: ConvertOptions,
    translators: TranslatorSet,
}

impl Converter {
    /// Create a converter, selecting the translator table
    pub fn new(options: ConvertOptions) -> ConvertResult<Self> {
        let translators = select_opset(options.opset_version)?;
        if translators.version() != options.opset_version {
            log::info!(
                "opset {} requested, using translators of opset {}",
                options.opset_version,
                translators.version()
            );
        }
        Ok(Self {
            options,
            translators,
        })
    }

    /// Opset version whose translators are used
    pub fn opset_version(&self) -> i64 {
        self.translators.version()
    }

    /// Translate `graph`
    ///
    /// Fails on the first translator error. Op types without a translator
    /// do not stop the walk: they are collected and reported together as
    /// [`ConvertError::UnsupportedOps`].
    pub fn convert(&self, graph: &Graph) -> ConvertResult<ConvertedProgram> {
        let mut ctx = MapContext::new(graph);
        let mut per_node: Vec<(String, Vec<OperationRecord>)> = Vec::with_capacity(graph.node_count());
        let mut unsupported: BTreeSet<String> = BTreeSet::new();

        let total = graph.node_count();
        for (i, node) in graph.nodes().enumerate() {
            log::debug!("Total: {}, Current: {} : {}", total, i + 1, node.op_type);

            if !self.is_supported(node) {
                unsupported.insert(node.op_type.clone());
                continue;
            }
            if !unsupported.is_empty() {
                continue;
            }

            self.translate_node(node, &mut ctx).map_err(|source| {
                log::error!(
                    "Convert failed node: {}, op_type is {}",
                    node.name,
                    node.op_type
                );
                ConvertError::Translation {
                    node: node.name.clone(),
                    op_type: node.op_type.clone(),
                    source: Box::new(source),
                }
            })?;
            per_node.push((node.name.clone(), ctx.take_records()));
        }

        if !unsupported.is_empty() {
            let ops: Vec<String> = unsupported.into_iter().collect();
            log::error!(
                "There are {} ops not supported yet, list as below",
                ops.len()
            );
            for op in &ops {
                log::error!("  {}", op);
            }
            return Err(ConvertError::UnsupportedOps(ops));
        }

        Ok(self.assemble(graph, per_node, ctx))
    }

    fn is_supported(&self, node: &GraphNode) -> bool {
        node.kind != NodeKind::Op
            || self.translators.lookup(&node.op_type).is_some()
            || self.options.custom_layers.contains(&node.op_type)
    }

    fn translate_node(&self, node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
        match node.kind {
            NodeKind::Input => place_holder(node, ctx),
            NodeKind::Data => create_parameter(node, ctx),
            NodeKind::Op => match self.translators.lookup(&node.op_type) {
                Some(translator) => translator(node, ctx),
                None => match self.options.custom_layers.get(&node.op_type) {
                    Some(layer) => deal_custom_layer(node, layer, ctx),
                    None => Err(ConvertError::UnsupportedOps(vec![node.op_type.clone()])),
                },
            },
        }
    }

    fn assemble(
        &self,
        graph: &Graph,
        per_node: Vec<(String, Vec<OperationRecord>)>,
        ctx: MapContext<'_>,
    ) -> ConvertedProgram {
        let mut records = Vec::new();
        let mut dropped = 0;
        for (name, node_records) in per_node {
            if ctx.omitted.contains(&name) {
                dropped += node_records.len();
            } else {
                records.extend(node_records);
            }
        }

        let stats = ConvertStats {
            nodes: graph.node_count(),
            records: records.len(),
            records_dropped: dropped,
            weights: ctx.weights.len(),
            omitted_nodes: ctx.omitted.len(),
        };
        log::info!(
            "Converted {} nodes into {} records ({} dropped), {} weights",
            stats.nodes,
            stats.records,
            stats.records_dropped,
            stats.weights
        );

        ConvertedProgram {
            records,
            weights: ctx.weights.into_inner(),
            inputs: graph.input_names(),
            outputs: graph.outputs.clone(),
            custom_layers: ctx.custom_layers,
            input_shapes: ctx.input_shapes,
            opset_version: self.translators.version(),
            stats,
        }
    }
}

/// Convert `graph` with `options`
pub fn convert_graph(graph: &Graph, options: ConvertOptions) -> ConvertResult<ConvertedProgram> {
    Converter::new(options)?.convert(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::Value;
    use crate::tensor::{DataType, Tensor};

    fn conv_relu_graph() -> Graph {
        Graph::new(
            vec![
                GraphNode::input("x", DataType::Float32, &[0, 3, 8, 8]),
                GraphNode::data("w", Tensor::from_f32(&[4, 3, 3, 3], vec![0.5; 108]).unwrap()),
                GraphNode::op("Conv", "conv_0", &["x", "w"], &["c"])
                    .with_attr("pads", vec![1i64, 1, 1, 1]),
                GraphNode::op("Relu", "relu_0", &["c"], &["y"]),
            ],
            vec!["y".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_conv_relu_program() {
        let program = convert_graph(&conv_relu_graph(), ConvertOptions::default()).unwrap();

        let ops: Vec<&str> = program.records.iter().map(|r| r.op.as_str()).collect();
        assert_eq!(ops, vec!["data", "conv2d", "relu"]);
        assert_eq!(program.records[0].get_attr("shape"), Some(&Value::Ints(vec![1, 3, 8, 8])));
        assert_eq!(program.input_shapes, vec![vec![0, 3, 8, 8]]);
        assert!(program.weights.contains_key("w"));
        assert_eq!(program.stats.records_dropped, 1);
        assert_eq!(program.inputs, vec!["x"]);
        assert_eq!(program.outputs, vec!["y"]);
    }

    #[test]
    fn test_constant_op_weight_folds_into_conv() {
        let graph = Graph::new(
            vec![
                GraphNode::input("x", DataType::Float32, &[1, 3, 8, 8]),
                GraphNode::op("Constant", "Constant_0", &[], &["w_out"])
                    .with_attr("value", Tensor::from_f32(&[108], vec![0.5; 108]).unwrap())
                    .with_shape(0, &[4, 3, 3, 3]),
                GraphNode::op("Conv", "conv_0", &["x", "w_out"], &["y"]),
            ],
            vec!["y".to_string()],
        )
        .unwrap();

        let program = convert_graph(&graph, ConvertOptions::default()).unwrap();
        let ops: Vec<&str> = program.records.iter().map(|r| r.op.as_str()).collect();
        assert_eq!(ops, vec!["data", "conv2d"]);

        let conv = &program.records[1];
        assert_eq!(conv.get_attr("param_attr"), Some(&Value::str("w_out")));
        let weight = program.weights.get("w_out").unwrap();
        assert_eq!(weight.shape(), vec![4, 3, 3, 3]);
        assert!(!program.weights.contains_key("Constant_0"));
    }

    #[test]
    fn test_unsupported_ops_collected() {
        let graph = Graph::new(
            vec![
                GraphNode::input("x", DataType::Float32, &[1, 4]),
                GraphNode::op("Zeta", "z", &["x"], &["a"]),
                GraphNode::op("Relu", "relu_0", &["a"], &["b"]),
                GraphNode::op("Alpha", "al", &["b"], &["c"]),
                GraphNode::op("Zeta", "z2", &["c"], &["d"]),
            ],
            vec![],
        )
        .unwrap();

        let err = convert_graph(&graph, ConvertOptions::default()).unwrap_err();
        match err {
            ConvertError::UnsupportedOps(ops) => assert_eq!(ops, vec!["Alpha", "Zeta"]),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_translation_error_wrapped() {
        let graph = Graph::new(
            vec![
                GraphNode::input("x", DataType::Float32, &[1, 4]),
                GraphNode::op("Shrink", "shrink_0", &["x"], &["y"]).with_attr("bias", 1.0f32),
            ],
            vec![],
        )
        .unwrap();

        let err = convert_graph(&graph, ConvertOptions::default()).unwrap_err();
        match err {
            ConvertError::Translation { node, op_type, source } => {
                assert_eq!(node, "shrink_0");
                assert_eq!(op_type, "Shrink");
                assert!(matches!(*source, ConvertError::UnsupportedConfiguration { .. }));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_custom_layer_fallback() {
        let graph = Graph::new(
            vec![
                GraphNode::input("x", DataType::Float32, &[1, 4]),
                GraphNode::op("MyOp", "my_0", &["x"], &["y"]).with_attr("k", 3i64),
            ],
            vec![],
        )
        .unwrap();
        let options = ConvertOptions::default().with_custom_layer(
            CustomLayer::new("MyOp", "def custom_my_op(x, k=1, name=None):\n    return x\n")
                .with_param("k", 1i64),
        );

        let program = convert_graph(&graph, options).unwrap();
        let record = &program.records[1];
        assert_eq!(record.op, "custom_my_op");
        assert!(record.is_custom_layer);
        assert_eq!(record.get_attr("k"), Some(&Value::Int(3)));
        assert!(program.custom_layers.contains_key("MyOp"));
        assert!(program.render().starts_with("def custom_my_op"));
    }

    #[test]
    fn test_opset_selection() {
        let converter = Converter::new(ConvertOptions::default().with_opset(12)).unwrap();
        assert_eq!(converter.opset_version(), 11);
        assert!(Converter::new(ConvertOptions::default().with_opset(7)).is_err());
    }

    #[test]
    fn test_deterministic_output() {
        let a = convert_graph(&conv_relu_graph(), ConvertOptions::default()).unwrap();
        let b = convert_graph(&conv_relu_graph(), ConvertOptions::default()).unwrap();
        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    }
}
