//! Fluid program representation
//!
//! What the mapper emits: [`OperationRecord`]s whose inputs and attributes
//! are structured [`Value`]s.

pub mod record;
pub mod value;

pub use record::{Inputs, Operand, OperationRecord};
pub use value::Value;
