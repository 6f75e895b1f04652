//! # Fluid Converter
//!
//! ONNX to PaddlePaddle Fluid operator mapping.
//!
//! This crate translates an already-decoded ONNX graph, node by node, into
//! an ordered list of Fluid layer calls plus the parameter tensors those
//! calls reference.
//!
//! ## Features
//!
//! - **Direct Mapping**: table-driven 1:1 translation of activations and reductions
//! - **Structural Translators**: conv, pooling, padding, gather, slice, GRU/LSTM, ...
//! - **Weight Rematerialization**: constants and fused RNN weights in Fluid layout
//! - **Custom Layers**: user-registered fallback for op types without a translator
//! - **Export**: Fluid programs back to ONNX nodes, weights as `Constant`s
//!
//! ## Example
//!
//! ```ignore
//! use fluid_converter::prelude::*;
//!
//! let graph = Graph::new(nodes, outputs)?;
//! let program = convert_graph(&graph, ConvertOptions::default())?;
//! println!("{}", program.render());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// ============================================================================
// Module declarations
// ============================================================================

pub mod convert;
pub mod error;
pub mod export;
pub mod fluid;
pub mod graph;
pub mod logger;
pub mod mapper;
pub mod opset;
pub mod tensor;

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Prelude module - import commonly used types with `use fluid_converter::prelude::*`
pub mod prelude {
    pub use crate::convert::{convert_graph, ConvertOptions, ConvertedProgram, Converter};
    pub use crate::error::{ConvertError, ConvertResult};
    pub use crate::export::{export_program, Exporter, FluidParameter, FluidProgram};
    pub use crate::fluid::{Inputs, Operand, OperationRecord, Value};
    pub use crate::graph::{Graph, GraphNode, NodeKind};
    pub use crate::mapper::{CustomLayer, CustomLayerRegistry};
    pub use crate::opset::{select_opset, OpType, TranslatorSet};
    pub use crate::tensor::{DataType, Tensor};
}

// ============================================================================
// Crate-level re-exports
// ============================================================================

pub use convert::{convert_graph, ConvertOptions, ConvertedProgram, Converter};
pub use error::{ConvertError, ConvertResult};

// ============================================================================
// Version information
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum supported ONNX opset version
pub const SUPPORTED_OPSET_MIN: i64 = 9;
/// Maximum supported ONNX opset version
pub const SUPPORTED_OPSET_MAX: i64 = 11;
