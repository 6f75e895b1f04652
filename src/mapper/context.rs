//! Per-run mapping state
//!
//! `MapContext` is owned by a single conversion run and handed to every
//! translator by `&mut`. It carries the graph being read, the side tables
//! that accumulate across nodes and the records of the node currently
//! being translated.

use indexmap::IndexMap;

use crate::error::ConvertResult;
use crate::fluid::OperationRecord;
use crate::graph::{Graph, GraphNode};
use crate::tensor::Tensor;

use super::weights::{OmittedNodeSet, WeightTable};

/// Translator signature shared by every op family
pub type Translator = fn(&GraphNode, &mut MapContext<'_>) -> ConvertResult<()>;

/// Mutable state of one conversion run
#[derive(Debug)]
pub struct MapContext<'g> {
    /// Graph being translated
    pub graph: &'g Graph,
    /// Parameters materialized so far
    pub weights: WeightTable,
    /// Nodes folded into consumers
    pub omitted: OmittedNodeSet,
    /// Custom layer sources used so far, keyed by op type
    pub custom_layers: IndexMap<String, String>,
    /// Shapes of graph inputs, in declaration order
    pub input_shapes: Vec<Vec<i64>>,
    records: Vec<OperationRecord>,
}

impl<'g> MapContext<'g> {
    /// Create a fresh context for `graph`
    pub fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            weights: WeightTable::new(),
            omitted: OmittedNodeSet::new(),
            custom_layers: IndexMap::new(),
            input_shapes: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Append a record for the node being translated
    pub fn emit(&mut self, record: OperationRecord) {
        self.records.push(record);
    }

    /// Drain the records emitted since the last call
    pub fn take_records(&mut self) -> Vec<OperationRecord> {
        std::mem::take(&mut self.records)
    }

    /// Value copy of the node feeding input `idx`
    pub fn input(&self, node: &GraphNode, idx: usize) -> ConvertResult<GraphNode> {
        self.graph.input_node(node, idx)
    }

    /// Value copy of the node feeding input `idx`, if present
    pub fn optional_input(&self, node: &GraphNode, idx: usize) -> ConvertResult<Option<GraphNode>> {
        self.graph.optional_input_node(node, idx)
    }

    /// Mark the producer of input `idx` as folded into `node`
    pub fn omit_input(&mut self, node: &GraphNode, idx: usize) {
        if let Some(name) = self.graph.input_producer_name(node, idx) {
            self.omitted.insert(name.to_string());
        }
    }

    /// Like [`MapContext::omit_input`], but only when `node` is the sole consumer
    pub fn omit_input_if_unshared(&mut self, node: &GraphNode, idx: usize) {
        let shared = node
            .inputs
            .get(idx)
            .map(|t| self.graph.consumer_count(t) > 1)
            .unwrap_or(true);
        if !shared {
            self.omit_input(node, idx);
        }
    }

    /// Register a generated parameter
    pub fn register_weight(&mut self, name: impl Into<String>, tensor: Tensor) {
        self.weights.register(name, tensor);
    }
}
