//! Tensor utilities
//!
//! This module provides the tensor side of the mapping layer:
//! - Data types and the Fluid dtype policy (`dtype`)
//! - Shape arithmetic: same-padding, broadcasting, permutations (`shape`)
//! - The `ndarray`-backed [`Tensor`] value (`convert`)
//!
//! # Example
//!
//! ```ignore
//! use fluid_converter::tensor::{same_padding, Tensor};
//!
//! let (before, after) = same_padding(224, 7, 2);
//! let weight = Tensor::from_f32(&[2, 2], vec![1.0, 2.0, 3.0, 4.0])?;
//! ```

pub mod convert;
pub mod dtype;
pub mod shape;

// Re-export commonly used items
pub use convert::Tensor;
pub use dtype::{constant_dtype, fill_dtype, parameter_dtype, DataType};
pub use shape::{
    axis_to_front_perm, conv_transpose_output_size, gather_output_shape, inverse_perm, is_dynamic,
    normalize_axis, numel, resolve_broadcast, same_padding,
};
