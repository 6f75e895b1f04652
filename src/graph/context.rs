//! Decoded source graph
//!
//! `Graph` is the read-only view translators work against. It keeps
//! nodes in stored order and maintains producer/consumer maps for O(1)
//! traversal.

use crate::error::{ConvertError, ConvertResult};

use super::maps::{build_consumer_map, build_node_map, build_producer_map, ConsumerMap, NodeMap, ProducerMap};
use super::node::{GraphNode, NodeKind};

/// Decoded source graph
#[derive(Debug, Clone)]
pub struct Graph {
    /// Maps node name → GraphNode (preserves stored order)
    pub node_map: NodeMap,

    /// Maps tensor name → (producer node name, output index)
    pub producer_map: ProducerMap,

    /// Maps tensor name → consumer node names
    pub consumer_map: ConsumerMap,

    /// Graph output tensor names
    pub outputs: Vec<String>,
}

impl Graph {
    /// Build a graph, validating names and input references
    ///
    /// Every non-empty input must be produced by some node; graph inputs and
    /// initializers are nodes themselves.
    pub fn new(nodes: Vec<GraphNode>, outputs: Vec<String>) -> ConvertResult<Self> {
        let node_map = build_node_map(nodes)?;
        let producer_map = build_producer_map(&node_map);
        let consumer_map = build_consumer_map(&node_map);

        for node in node_map.values() {
            for input in node.inputs.iter().filter(|i| !i.is_empty()) {
                if !producer_map.contains_key(input) {
                    return Err(ConvertError::UnresolvedInput {
                        node: node.name.clone(),
                        input: input.clone(),
                    });
                }
            }
        }

        for output in &outputs {
            if !producer_map.contains_key(output) {
                return Err(ConvertError::NodeNotFound(output.clone()));
            }
        }

        Ok(Self {
            node_map,
            producer_map,
            consumer_map,
            outputs,
        })
    }

    // ========================================================================
    // Node accessors
    // ========================================================================

    /// Get a node by name
    pub fn get_node(&self, name: &str) -> Option<&GraphNode> {
        self.node_map.get(name)
    }

    /// Check if a node exists
    pub fn has_node(&self, name: &str) -> bool {
        self.node_map.contains_key(name)
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.node_map.len()
    }

    /// Iterate over all nodes in stored order
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.node_map.values()
    }

    /// Names of the graph input placeholders, in stored order
    pub fn input_names(&self) -> Vec<String> {
        self.nodes()
            .filter(|n| n.kind == NodeKind::Input)
            .map(|n| n.name.clone())
            .collect()
    }

    // ========================================================================
    // Graph traversal
    // ========================================================================

    /// Get the producer node for a tensor
    pub fn get_producer(&self, tensor_name: &str) -> Option<&GraphNode> {
        self.producer_map
            .get(tensor_name)
            .and_then(|(name, _)| self.get_node(name))
    }

    /// Get consumer node names for a tensor
    pub fn get_consumer_names(&self, tensor_name: &str) -> &[String] {
        self.consumer_map
            .get(tensor_name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Number of nodes consuming a tensor
    pub fn consumer_count(&self, tensor_name: &str) -> usize {
        self.get_consumer_names(tensor_name).len()
    }

    /// Check if a tensor is a graph output
    pub fn is_graph_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|o| o == name)
    }
}
