//! Constant and ConstantOfShape

use crate::error::{ConvertError, ConvertResult};
use crate::fluid::{Inputs, OperationRecord, Value};
use crate::graph::GraphNode;
use crate::tensor::{constant_dtype, fill_dtype, DataType, Tensor};

use super::context::MapContext;
use super::data::parameter_record;

fn scalar_value(tensor: &Tensor) -> Value {
    match tensor.dtype() {
        DataType::Bool => Value::Bool(tensor.to_i64_vec().first().copied().unwrap_or(0) != 0),
        d if d.is_float() => Value::Float(tensor.to_f64_vec().first().copied().unwrap_or(0.0)),
        _ => Value::Int(tensor.to_i64_vec().first().copied().unwrap_or(0)),
    }
}

/// `Constant`
///
/// A single element becomes `fill_constant`; anything larger is registered
/// as a parameter and declared with `create_parameter`. Parameters are keyed
/// by the output tensor, which is the name consumers see.
pub fn constant(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let value: Tensor = node.attr("value")?;
    let dtype = value.dtype();
    if let Some(declared) = node.dtype {
        if declared != dtype {
            return Err(ConvertError::DtypeMismatch {
                node: node.name.clone(),
                declared: declared.to_string(),
                inferred: dtype.to_string(),
            });
        }
    }

    if value.len() == 1 {
        ctx.emit(
            OperationRecord::new("fill_constant", Inputs::None, node.output())
                .attr("shape", vec![1i64])
                .attr("dtype", fill_dtype(dtype))
                .attr("value", scalar_value(&value)),
        );
        return Ok(());
    }

    let shape = match node.attr_opt::<Vec<i64>>("shape")? {
        Some(shape) => shape,
        None => match node.shape() {
            Some(shape) => shape.to_vec(),
            None => {
                log::warn!(
                    "shape of constant `{}` not inferred, using its value shape",
                    node.output()
                );
                value.shape()
            }
        },
    };
    let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
    let target = constant_dtype(dtype);
    let weight = value.reshape(&dims)?.cast(target)?;
    let output = node.output();
    ctx.register_weight(output, weight);
    ctx.emit(parameter_record(output, output, target, shape));
    Ok(())
}

/// `ConstantOfShape`: fill a runtime shape with a scalar
pub fn constant_of_shape(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let shape = ctx.input(node, 0)?;
    let value: Tensor = node.attr_or("value", Tensor::scalar_f32(0.0))?;
    if value.len() != 1 {
        return Err(ConvertError::unsupported(
            &node.name,
            format!("value must be a scalar, got {} elements", value.len()),
        ));
    }

    ctx.emit(
        OperationRecord::new("fill_constant", Inputs::None, node.output())
            .attr("shape", Value::var(shape.name.as_str()))
            .attr("dtype", fill_dtype(value.dtype()))
            .attr("value", scalar_value(&value)),
    );
    Ok(())
}
