//! Graph inputs and constant data nodes

use crate::error::{ConvertError, ConvertResult};
use crate::fluid::{Inputs, OperationRecord, Value};
use crate::graph::GraphNode;
use crate::tensor::{parameter_dtype, DataType};

use super::context::MapContext;

/// Graph input → `data` placeholder
///
/// A leading 0 (unknown batch) becomes 1 and the batch size is not appended.
pub fn place_holder(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let mut shape = node.known_shape()?.to_vec();
    ctx.input_shapes.push(shape.clone());

    if let Some(first) = shape.first_mut() {
        if *first == 0 {
            *first = 1;
        }
    }
    if shape.iter().skip(1).any(|&d| d == 0) {
        log::warn!("shape of input `{}` is not fully assigned: {:?}", node.name, shape);
    }

    let dtype = node.dtype.unwrap_or(DataType::Float32);
    ctx.emit(
        OperationRecord::new("data", Inputs::None, node.output())
            .attr("dtype", dtype)
            .attr("shape", shape)
            .named(&node.name)
            .attr("append_batch_size", false),
    );
    Ok(())
}

/// Constant data node → registered parameter + `create_parameter`
///
/// int64 narrows to int32 and uint8 widens to float32. Fluid has no bool
/// parameters, so bools are stored as int64 and cast back.
pub fn create_parameter(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let value = node
        .value
        .as_ref()
        .ok_or_else(|| ConvertError::InvalidTensor(format!("data node `{}` has no value", node.name)))?;

    let mut weight = if value.ndim() == 0 {
        value.reshape(&[1])?
    } else {
        value.clone()
    };
    let shape = weight.shape();
    let output = node.output();

    if weight.dtype() == DataType::Bool {
        weight = weight.cast(DataType::Int64)?;
        ctx.register_weight(output, weight);
        ctx.emit(parameter_record(output, output, DataType::Int64, shape));
        ctx.emit(OperationRecord::new("cast", Inputs::var(output), output).attr("dtype", DataType::Bool));
    } else {
        let dtype = parameter_dtype(weight.dtype());
        weight = weight.cast(dtype)?;
        ctx.register_weight(output, weight);
        ctx.emit(parameter_record(output, output, dtype, shape));
    }

    Ok(())
}

/// `create_parameter` record backed by the weight table
pub(crate) fn parameter_record(
    output: &str,
    name: &str,
    dtype: DataType,
    shape: Vec<i64>,
) -> OperationRecord {
    OperationRecord::new("create_parameter", Inputs::None, output)
        .attr("dtype", dtype)
        .attr("shape", shape)
        .named(name)
        .attr("default_initializer", Value::expr("Constant(0.0)"))
}
