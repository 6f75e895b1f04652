//! Decoded source graph
//!
//! This module provides the in-memory graph the mapper consumes:
//!
//! - [`GraphNode`]: one input placeholder, constant data node or operator
//! - [`Graph`]: ordered node collection with producer/consumer lookups
//! - [`attributes`]: typed attribute values and their normalization
//! - [`maps`]: type definitions and builders for the lookup maps
//!
//! # Example
//!
//! ```ignore
//! use fluid_converter::graph::{Graph, GraphNode};
//! use fluid_converter::tensor::DataType;
//!
//! let graph = Graph::new(
//!     vec![
//!         GraphNode::input("x", DataType::Float32, &[1, 3, 224, 224]),
//!         GraphNode::op("Relu", "relu_0", &["x"], &["y"]),
//!     ],
//!     vec!["y".to_string()],
//! )?;
//!
//! let relu = graph.get_node("relu_0").unwrap();
//! let input = graph.input_node(relu, 0)?; // private copy, named "x"
//! ```
//!
//! # Maps
//!
//! | Map | Description |
//! |-----|-------------|
//! | `node_map` | node_name → GraphNode (order preserved) |
//! | `producer_map` | tensor_name → (producer node name, output index) |
//! | `consumer_map` | tensor_name → consumer node names |

pub mod accessors;
pub mod attributes;
pub mod context;
pub mod maps;
pub mod node;

// Re-export main types
pub use attributes::{resolve, AttributeValue, FromAttribute};
pub use context::Graph;
pub use maps::{ConsumerMap, NodeMap, ProducerMap};
pub use node::{GraphNode, NodeKind};
