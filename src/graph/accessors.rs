//! Input lookup with copy semantics
//!
//! Translators never hold references into the graph's canonical nodes.
//! They ask for the node feeding a given input and receive a value copy
//! retargeted to the consumed tensor.

use crate::error::{ConvertError, ConvertResult};

use super::context::Graph;
use super::node::GraphNode;

impl Graph {
    /// Value copy of the node feeding input `idx` of `node`
    ///
    /// The copy's `name` is the consumed tensor name and its first
    /// `out_shapes` entry describes that tensor, so multi-output producers
    /// read like single-output ones.
    pub fn input_node(&self, node: &GraphNode, idx: usize) -> ConvertResult<GraphNode> {
        self.optional_input_node(node, idx)?
            .ok_or_else(|| ConvertError::UnresolvedInput {
                node: node.name.clone(),
                input: format!("#{}", idx),
            })
    }

    /// Like [`Graph::input_node`], but an absent or omitted input is `None`
    pub fn optional_input_node(
        &self,
        node: &GraphNode,
        idx: usize,
    ) -> ConvertResult<Option<GraphNode>> {
        let tensor = match node.inputs.get(idx) {
            Some(t) if !t.is_empty() => t,
            _ => return Ok(None),
        };

        let (producer_name, out_idx) =
            self.producer_map
                .get(tensor)
                .ok_or_else(|| ConvertError::UnresolvedInput {
                    node: node.name.clone(),
                    input: tensor.clone(),
                })?;
        let producer = self
            .get_node(producer_name)
            .ok_or_else(|| ConvertError::NodeNotFound(producer_name.clone()))?;

        let mut copy = producer.clone();
        copy.name = tensor.clone();
        if *out_idx > 0 && *out_idx < copy.out_shapes.len() {
            copy.out_shapes.rotate_left(*out_idx);
            copy.outputs.rotate_left(*out_idx);
        }

        Ok(Some(copy))
    }

    /// Name of the node producing input `idx` of `node`
    pub fn input_producer_name(&self, node: &GraphNode, idx: usize) -> Option<&str> {
        node.inputs
            .get(idx)
            .filter(|t| !t.is_empty())
            .and_then(|t| self.producer_map.get(t))
            .map(|(name, _)| name.as_str())
    }

    /// Inferred shape of input `idx`, failing when unknown
    pub fn input_shape(&self, node: &GraphNode, idx: usize) -> ConvertResult<Vec<i64>> {
        let input = self.input_node(node, idx)?;
        input.known_shape().map(|s| s.to_vec())
    }
}
