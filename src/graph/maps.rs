//! Graph map types and builders
//!
//! Defines the lookup tables [`Graph`](super::Graph) keeps over its nodes.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{ConvertError, ConvertResult};

use super::node::GraphNode;

/// Type alias for node map: node_name → GraphNode (order preserved)
pub type NodeMap = IndexMap<String, GraphNode>;

/// Type alias for producer map: tensor_name → (node_name, output index)
pub type ProducerMap = FxHashMap<String, (String, usize)>;

/// Type alias for consumer map: tensor_name → [consumer_node_names]
/// SmallVec optimized for common case of 1-4 consumers
pub type ConsumerMap = FxHashMap<String, SmallVec<[String; 4]>>;

/// Build node map, rejecting duplicate names
pub fn build_node_map(nodes: Vec<GraphNode>) -> ConvertResult<NodeMap> {
    let mut map = IndexMap::with_capacity(nodes.len());

    for node in nodes {
        if map.contains_key(&node.name) {
            return Err(ConvertError::DuplicateNode(node.name));
        }
        map.insert(node.name.clone(), node);
    }

    Ok(map)
}

/// Build producer map from graph nodes
///
/// Maps each output tensor name to the node that produces it and the
/// position of the tensor among that node's outputs.
pub fn build_producer_map(nodes: &NodeMap) -> ProducerMap {
    let mut map = FxHashMap::default();

    for node in nodes.values() {
        for (idx, output) in node.outputs.iter().enumerate() {
            if !output.is_empty() {
                map.insert(output.clone(), (node.name.clone(), idx));
            }
        }
    }

    map
}

/// Build consumer map from graph nodes
///
/// Maps each tensor name to the list of nodes that consume it.
pub fn build_consumer_map(nodes: &NodeMap) -> ConsumerMap {
    let mut map: ConsumerMap = FxHashMap::default();

    for node in nodes.values() {
        for input in &node.inputs {
            if !input.is_empty() {
                map.entry(input.clone())
                    .or_default()
                    .push(node.name.clone());
            }
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{DataType, Tensor};

    fn make_nodes() -> Vec<GraphNode> {
        vec![
            GraphNode::input("x", DataType::Float32, &[1, 3, 8, 8]),
            GraphNode::data("w", Tensor::from_f32(&[4, 3, 1, 1], vec![0.0; 12]).unwrap()),
            GraphNode::op("Conv", "conv_0", &["x", "w"], &["conv_out"]),
            GraphNode::op("Relu", "relu_0", &["conv_out"], &["y"]),
        ]
    }

    #[test]
    fn test_build_node_map_preserves_order() {
        let map = build_node_map(make_nodes()).unwrap();
        let keys: Vec<_> = map.keys().collect();
        assert_eq!(keys, vec!["x", "w", "conv_0", "relu_0"]);
    }

    #[test]
    fn test_build_node_map_rejects_duplicates() {
        let mut nodes = make_nodes();
        nodes.push(GraphNode::op("Relu", "relu_0", &["y"], &["z"]));
        let err = build_node_map(nodes).unwrap_err();
        assert!(matches!(err, ConvertError::DuplicateNode(name) if name == "relu_0"));
    }

    #[test]
    fn test_build_producer_map() {
        let map = build_producer_map(&build_node_map(make_nodes()).unwrap());

        assert_eq!(map.get("conv_out"), Some(&("conv_0".to_string(), 0)));
        assert_eq!(map.get("x"), Some(&("x".to_string(), 0)));
        assert!(map.get("missing").is_none());
    }

    #[test]
    fn test_build_consumer_map() {
        let map = build_consumer_map(&build_node_map(make_nodes()).unwrap());

        assert_eq!(
            map.get("conv_out").map(|v| v.as_slice()),
            Some(&["relu_0".to_string()][..])
        );
        assert!(map.get("y").is_none());
    }
}
