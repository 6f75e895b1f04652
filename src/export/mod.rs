//! Fluid → ONNX export
//!
//! The reverse direction of [`crate::convert`]. A [`FluidProgram`] (records,
//! parameters and fetch targets) is walked record by record and rebuilt as an
//! ONNX-side [`Graph`]:
//!
//! - persistable parameters become `Constant` nodes ([`convert_weights`])
//! - `data` records become graph inputs, fetch targets the graph outputs
//! - every other record goes through the [`ops`] translator table
//!
//! As in the forward driver, records without a translator are collected and
//! reported together once the walk is over.
//!
//! # Example
//!
//! ```ignore
//! use fluid_converter::export::{export_program, FluidProgram};
//!
//! let program = convert_graph(&graph, ConvertOptions::default())?;
//! let exported = export_program(&FluidProgram::from_converted(&program), 10)?;
//! assert_eq!(exported.opset_version, 10);
//! ```

pub mod ops;

pub use ops::{ExportContext, ExportTranslator};

use std::collections::BTreeSet;

use crate::convert::ConvertedProgram;
use crate::error::{ConvertError, ConvertResult};
use crate::fluid::OperationRecord;
use crate::graph::{Graph, GraphNode, NodeKind};
use crate::tensor::Tensor;

/// ONNX opset versions the exporter can target
pub const EXPORT_OPSETS: &[i64] = &[9, 10, 11];

/// Opset used when the requested version is below every supported one
pub const DEFAULT_EXPORT_OPSET: i64 = 10;

/// Producer name stamped on exported graphs
pub const PRODUCER_NAME: &str = "fluid-converter";

/// Pick the opset to export with
///
/// A supported version is used as is. Otherwise the highest supported version
/// below the request is used, falling back to [`DEFAULT_EXPORT_OPSET`].
pub fn select_export_opset(requested: i64) -> i64 {
    let run = if EXPORT_OPSETS.contains(&requested) {
        requested
    } else {
        EXPORT_OPSETS
            .iter()
            .copied()
            .filter(|&v| v < requested)
            .last()
            .unwrap_or(DEFAULT_EXPORT_OPSET)
    };
    log::info!(
        "export supports opsets {:?}, requested {}, treated as opset {}",
        EXPORT_OPSETS,
        requested,
        run
    );
    run
}

/// One Fluid parameter
#[derive(Debug, Clone, PartialEq)]
pub struct FluidParameter {
    /// Parameter name
    pub name: String,
    /// Value
    pub value: Tensor,
    /// Saved with the model
    pub persistable: bool,
}

impl FluidParameter {
    /// Persistable parameter
    pub fn new(name: impl Into<String>, value: Tensor) -> Self {
        Self {
            name: name.into(),
            value,
            persistable: true,
        }
    }

    /// Mark as a transient variable (builder style)
    pub fn transient(mut self) -> Self {
        self.persistable = false;
        self
    }

    /// Persistable parameters from a weight table or program weights
    pub fn from_weights<'a, I>(weights: I) -> Vec<Self>
    where
        I: IntoIterator<Item = (&'a String, &'a Tensor)>,
    {
        weights
            .into_iter()
            .map(|(name, value)| Self::new(name.as_str(), value.clone()))
            .collect()
    }
}

/// A Fluid program to export
#[derive(Debug, Clone, Default)]
pub struct FluidProgram {
    /// Records in program order; `data` records are the feeds
    pub records: Vec<OperationRecord>,
    /// Parameters backing the records
    pub parameters: Vec<FluidParameter>,
    /// Fetch targets
    pub fetches: Vec<String>,
}

impl FluidProgram {
    /// Program produced by the forward converter
    pub fn from_converted(program: &ConvertedProgram) -> Self {
        Self {
            records: program.records.clone(),
            parameters: FluidParameter::from_weights(&program.weights),
            fetches: program.outputs.clone(),
        }
    }
}

/// `Constant` nodes for the persistable parameters
///
/// Feed and fetch holders are skipped.
pub fn convert_weights(parameters: &[FluidParameter]) -> Vec<GraphNode> {
    parameters
        .iter()
        .filter(|p| !(p.name.ends_with("feed") || p.name.ends_with("fetch")))
        .filter(|p| p.persistable)
        .map(|p| {
            GraphNode::op("Constant", &p.name, &[], &[p.name.as_str()])
                .with_attr("value", p.value.clone())
                .with_shape(0, &p.value.shape())
                .with_dtype(p.value.dtype())
        })
        .collect()
}

/// Result of an export run
#[derive(Debug, Clone)]
pub struct ExportedGraph {
    /// Inputs, weight constants and translated nodes, in that order
    pub graph: Graph,
    /// Opset the nodes were written for
    pub opset_version: i64,
    /// Producer name
    pub producer_name: &'static str,
}

impl ExportedGraph {
    /// Op types of the operator nodes, in order
    pub fn op_types(&self) -> Vec<&str> {
        self.graph
            .nodes()
            .filter(|n| n.kind == NodeKind::Op)
            .map(|n| n.op_type.as_str())
            .collect()
    }
}

/// Fluid program → ONNX graph driver
#[derive(Debug, Clone)]
pub struct Exporter {
    opset_version: i64,
}

impl Exporter {
    /// Create an exporter for the requested opset
    pub fn new(requested_opset: i64) -> Self {
        Self {
            opset_version: select_export_opset(requested_opset),
        }
    }

    /// Opset the exporter writes
    pub fn opset_version(&self) -> i64 {
        self.opset_version
    }

    /// Export `program`
    ///
    /// Fails on the first translator error. Records without a translator are
    /// collected and reported together as [`ConvertError::UnsupportedOps`].
    /// The assembled graph is validated before it is returned.
    pub fn export(&self, program: &FluidProgram) -> ConvertResult<ExportedGraph> {
        let mut ctx = ExportContext::new(self.opset_version);
        let weight_nodes = convert_weights(&program.parameters);
        let mut input_nodes = Vec::new();
        let mut op_nodes = Vec::new();
        let mut unsupported: BTreeSet<String> = BTreeSet::new();

        log::info!("Translating Fluid program to ONNX opset {}", self.opset_version);
        let total = program.records.len();
        for (i, record) in program.records.iter().enumerate() {
            log::debug!("Total: {}, Current: {} : {}", total, i + 1, record.op);

            let translator = match ops::lookup(&record.op) {
                Some(t) if !record.is_custom_layer => t,
                _ => {
                    unsupported.insert(record.op.clone());
                    continue;
                }
            };
            if !unsupported.is_empty() {
                continue;
            }

            let nodes = translator(record, &mut ctx).map_err(|source| {
                log::error!("Export failed record: {}, op is {}", record.output(), record.op);
                ConvertError::Translation {
                    node: record.output().to_string(),
                    op_type: record.op.clone(),
                    source: Box::new(source),
                }
            })?;
            for node in nodes {
                match node.kind {
                    NodeKind::Input => input_nodes.push(node),
                    _ => op_nodes.push(node),
                }
            }
        }

        if !unsupported.is_empty() {
            let ops: Vec<String> = unsupported.into_iter().collect();
            log::error!("There are {} ops not supported yet, list as below", ops.len());
            for op in &ops {
                log::error!("  {}", op);
            }
            return Err(ConvertError::UnsupportedOps(ops));
        }

        log::info!(
            "Exported {} inputs, {} weights, {} nodes",
            input_nodes.len(),
            weight_nodes.len(),
            op_nodes.len()
        );
        let nodes = input_nodes
            .into_iter()
            .chain(weight_nodes)
            .chain(op_nodes)
            .collect();
        let graph = Graph::new(nodes, program.fetches.clone())?;

        Ok(ExportedGraph {
            graph,
            opset_version: self.opset_version,
            producer_name: PRODUCER_NAME,
        })
    }
}

/// Export `program` for the requested opset
pub fn export_program(program: &FluidProgram, opset_version: i64) -> ConvertResult<ExportedGraph> {
    Exporter::new(opset_version).export(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::{Inputs, Value};
    use crate::tensor::DataType;

    fn conv_relu_program() -> FluidProgram {
        FluidProgram {
            records: vec![
                OperationRecord::new("data", Inputs::None, "x")
                    .attr("dtype", DataType::Float32)
                    .attr("shape", vec![1i64, 3, 8, 8])
                    .named("x"),
                OperationRecord::new("conv2d", Inputs::var("x"), "c")
                    .attr("num_filters", 4i64)
                    .attr("filter_size", vec![3i64, 3])
                    .attr("stride", vec![1i64, 1])
                    .attr("padding", vec![1i64, 1])
                    .attr("dilation", vec![1i64, 1])
                    .attr("groups", 1i64)
                    .attr("param_attr", Value::str("w"))
                    .attr("bias_attr", false)
                    .named("conv_0"),
                OperationRecord::new("relu", Inputs::var("c"), "y").named("relu_0"),
            ],
            parameters: vec![FluidParameter::new(
                "w",
                Tensor::from_f32(&[4, 3, 3, 3], vec![0.5; 108]).unwrap(),
            )],
            fetches: vec!["y".to_string()],
        }
    }

    #[test]
    fn test_select_export_opset() {
        assert_eq!(select_export_opset(9), 9);
        assert_eq!(select_export_opset(11), 11);
        assert_eq!(select_export_opset(13), 11);
        assert_eq!(select_export_opset(7), DEFAULT_EXPORT_OPSET);
    }

    #[test]
    fn test_convert_weights_skips_feed_fetch_and_transient() {
        let value = Tensor::vec_i64(&[1, 2]);
        let params = vec![
            FluidParameter::new("fc_w", value.clone()),
            FluidParameter::new("feed", value.clone()),
            FluidParameter::new("x_fetch", value.clone()),
            FluidParameter::new("tmp_0", value).transient(),
        ];
        let nodes = convert_weights(&params);

        assert_eq!(nodes.len(), 1);
        let node = &nodes[0];
        assert_eq!(node.op_type, "Constant");
        assert_eq!(node.name, "fc_w");
        assert_eq!(node.output(), "fc_w");
        assert_eq!(node.constant_value(), Some(Tensor::vec_i64(&[1, 2])));
    }

    #[test]
    fn test_parameters_from_weight_table() {
        let mut table = crate::mapper::WeightTable::new();
        table.register("w", Tensor::vec_i64(&[3]));
        table.register("b", Tensor::vec_i64(&[4]));

        let params = FluidParameter::from_weights(table.iter());
        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["w", "b"]);
        assert!(params.iter().all(|p| p.persistable));
        assert_eq!(convert_weights(&params).len(), 2);
    }

    #[test]
    fn test_export_conv_relu() {
        let exported = export_program(&conv_relu_program(), 10).unwrap();

        assert_eq!(exported.op_types(), vec!["Constant", "Conv", "Relu"]);
        assert_eq!(exported.graph.input_names(), vec!["x"]);
        assert_eq!(exported.graph.outputs, vec!["y"]);
        assert_eq!(exported.producer_name, PRODUCER_NAME);

        let conv = exported.graph.get_node("Conv_0").unwrap();
        assert_eq!(conv.inputs, vec!["x", "w"]);
        assert_eq!(conv.attr::<Vec<i64>>("pads").unwrap(), vec![1, 1, 1, 1]);
        assert_eq!(exported.graph.get_producer("w").unwrap().op_type, "Constant");
    }

    #[test]
    fn test_export_collects_unsupported_ops() {
        let mut program = conv_relu_program();
        program
            .records
            .insert(2, OperationRecord::new("sequence_pool", Inputs::var("c"), "s"));
        program
            .records
            .push(OperationRecord::new("dynamic_gru", Inputs::var("s"), "g"));
        program
            .records
            .push(OperationRecord::new("sequence_pool", Inputs::var("g"), "h"));

        let err = export_program(&program, 10).unwrap_err();
        match err {
            ConvertError::UnsupportedOps(ops) => assert_eq!(ops, vec!["dynamic_gru", "sequence_pool"]),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_export_wraps_translator_errors() {
        let mut program = conv_relu_program();
        program.records[1].attrs.shift_remove("param_attr");

        let err = export_program(&program, 10).unwrap_err();
        match err {
            ConvertError::Translation { node, op_type, source } => {
                assert_eq!(node, "c");
                assert_eq!(op_type, "conv2d");
                assert!(matches!(*source, ConvertError::MissingAttribute { .. }));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_export_rejects_unknown_fetch() {
        let mut program = conv_relu_program();
        program.fetches = vec!["missing".to_string()];
        assert!(matches!(
            export_program(&program, 10),
            Err(ConvertError::NodeNotFound(_))
        ));
    }
}
