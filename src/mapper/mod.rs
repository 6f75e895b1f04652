//! Op translators
//!
//! Every translator reads one source node through a [`MapContext`] and emits
//! zero or more [`OperationRecord`](crate::fluid::OperationRecord)s into it.
//! Side effects on the weight table and the omitted-node set go through the
//! same context.
//!
//! # Organization
//!
//! - `direct`: table-driven one-to-one mappings
//! - `data`: graph inputs and constant data nodes
//! - `padding`, `conv`, `pool`: spatial ops
//! - `elementwise`, `math`, `norm`: arithmetic and normalization
//! - `shape`, `slice`, `gather`, `constant`: tensor plumbing
//! - `rnn`: GRU / LSTM
//! - `resize`: resampling and ROI ops
//! - `custom`: user-registered fallback layers

pub mod constant;
pub mod context;
pub mod conv;
pub mod custom;
pub mod data;
pub mod direct;
pub mod elementwise;
pub mod gather;
pub mod math;
pub mod norm;
pub mod padding;
pub mod pool;
pub mod resize;
pub mod rnn;
pub mod shape;
pub mod slice;
pub mod weights;

pub use context::{MapContext, Translator};
pub use custom::{deal_custom_layer, CustomLayer, CustomLayerRegistry};
pub use direct::{directly_map, is_directly_mapped, DirectMapping, DIRECT_MAPPINGS};
pub use weights::{OmittedNodeSet, WeightTable};

/// Read a constant tensor feeding input `idx`, if the producer is constant
pub(crate) fn constant_input(
    node: &crate::graph::GraphNode,
    idx: usize,
    ctx: &MapContext<'_>,
) -> crate::error::ConvertResult<Option<crate::tensor::Tensor>> {
    Ok(ctx
        .optional_input(node, idx)?
        .and_then(|input| input.constant_value()))
}
