//! Shape manipulation

use crate::error::{ConvertError, ConvertResult};
use crate::fluid::{Inputs, OperationRecord, Value};
use crate::graph::GraphNode;
use crate::tensor::DataType;

use super::constant_input;
use super::context::MapContext;

/// `Reshape(x, shape)`
///
/// A constant shape becomes the `shape` attribute. A dynamic shape is fed as
/// a variable, cast to int32 first when it is int64.
pub fn reshape(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let shape = ctx.input(node, 1)?;

    if let Some(value) = shape.constant_value() {
        ctx.omit_input_if_unshared(node, 1);
        ctx.emit(
            OperationRecord::new("reshape", Inputs::kw([("x", x.name.as_str())]), node.output())
                .attr("shape", value.to_i64_vec()),
        );
        return Ok(());
    }

    let shape_dims = shape.known_shape()?.to_vec();
    let shape_var = if shape.dtype == Some(DataType::Int64) {
        let cast = format!("{}_cast", shape.name);
        ctx.emit(
            OperationRecord::new("cast", Inputs::var(shape.name.as_str()), cast.as_str())
                .attr("dtype", DataType::Int32),
        );
        ctx.emit(
            OperationRecord::new("reshape", Inputs::var(cast.as_str()), cast.as_str())
                .attr("shape", shape_dims),
        );
        cast
    } else {
        let reshaped = format!("{}_reshaped", shape.name);
        ctx.emit(
            OperationRecord::new("reshape", Inputs::var(shape.name.as_str()), reshaped.as_str())
                .attr("shape", shape_dims),
        );
        reshaped
    };

    ctx.emit(OperationRecord::new(
        "reshape",
        Inputs::kw([("x", x.name.as_str()), ("shape", shape_var.as_str())]),
        node.output(),
    ));
    Ok(())
}

/// `Squeeze`; a rank-1 input degenerates to a same-dtype cast
pub fn squeeze(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    if x.shape().map(|s| s.len() == 1).unwrap_or(false) {
        ctx.emit(
            OperationRecord::new("cast", Inputs::var(x.name.as_str()), node.output())
                .attr("dtype", x.dtype.unwrap_or(DataType::Float32)),
        );
        return Ok(());
    }

    let axes: Vec<i64> = node.attr("axes")?;
    ctx.emit(
        OperationRecord::new("squeeze", Inputs::var(x.name.as_str()), node.output())
            .attr("axes", axes)
            .named(&node.name),
    );
    Ok(())
}

/// `Unsqueeze`; a rank-0 input becomes a `[1]` reshape
pub fn unsqueeze(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    if x.shape().map(|s| s.is_empty()).unwrap_or(false) {
        ctx.emit(
            OperationRecord::new("reshape", Inputs::var(x.name.as_str()), node.output())
                .attr("shape", vec![1i64]),
        );
        return Ok(());
    }

    let axes: Vec<i64> = node.attr("axes")?;
    ctx.emit(
        OperationRecord::new("unsqueeze", Inputs::var(x.name.as_str()), node.output())
            .attr("axes", axes)
            .named(&node.name),
    );
    Ok(())
}

/// `Flatten` to 2D at `axis`
pub fn flatten(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let axis: i64 = node.attr_or("axis", 1)?;
    ctx.emit(
        OperationRecord::new("flatten", Inputs::var(x.name.as_str()), node.output())
            .attr("axis", axis)
            .named(&node.name),
    );
    Ok(())
}

/// `Transpose`; without `perm` the dims are reversed
pub fn transpose(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let perm = match node.attr_opt::<Vec<i64>>("perm")? {
        Some(perm) => perm,
        None => {
            let rank = x.known_shape()?.len() as i64;
            (0..rank).rev().collect()
        }
    };
    ctx.emit(
        OperationRecord::new("transpose", Inputs::var(x.name.as_str()), node.output())
            .attr("perm", perm)
            .named(&node.name),
    );
    Ok(())
}

/// `Split` into explicit sections or equal parts, one per output
pub fn split(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let outputs: Vec<&String> = node.outputs.iter().filter(|o| !o.is_empty()).collect();
    let sections = match node.attr_opt::<Vec<i64>>("split")? {
        Some(split) => Value::Ints(split),
        None => Value::Int(outputs.len() as i64),
    };
    let axis: i64 = node.attr_or("axis", 0)?;

    ctx.emit(
        OperationRecord::with_outputs("split", Inputs::var(x.name.as_str()), outputs)
            .attr("num_or_sections", sections)
            .attr("dim", axis)
            .named(&node.name),
    );
    Ok(())
}

/// `Concat` along `axis`
pub fn concat(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let axis: i64 = node.attr("axis")?;
    let mut inputs = Vec::with_capacity(node.inputs.len());
    for idx in 0..node.inputs.len() {
        if let Some(input) = ctx.optional_input(node, idx)? {
            inputs.push(input.name);
        }
    }
    ctx.emit(
        OperationRecord::new("concat", Inputs::list(inputs), node.output()).attr("axis", axis),
    );
    Ok(())
}

/// `Tile` → `expand` with constant or variable repeats
pub fn tile(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let repeats = ctx.input(node, 1)?;
    let expand_times = match repeats.constant_value() {
        Some(value) => {
            ctx.omit_input_if_unshared(node, 1);
            Value::Ints(value.to_i64_vec())
        }
        None => Value::var(repeats.name.as_str()),
    };
    ctx.emit(
        OperationRecord::new("expand", Inputs::var(x.name.as_str()), node.output())
            .attr("expand_times", expand_times)
            .named(&node.name),
    );
    Ok(())
}

/// `Expand` as a multiply with a ones tensor of the output shape
pub fn expand(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    ctx.omit_input_if_unshared(node, 1);

    let ones = format!("{}_ones", node.name);
    ctx.emit(
        OperationRecord::new("ones", Inputs::None, ones.as_str())
            .attr("shape", node.known_shape()?.to_vec())
            .attr("dtype", x.dtype.unwrap_or(DataType::Float32)),
    );
    ctx.emit(
        OperationRecord::new(
            "elementwise_mul",
            Inputs::kw([("x", ones.as_str()), ("y", x.name.as_str())]),
            node.output(),
        )
        .named(&node.name),
    );
    Ok(())
}

/// `Identity` → `assign`
pub fn identity(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    ctx.emit(OperationRecord::new("assign", Inputs::var(x.name.as_str()), node.output()));
    Ok(())
}

/// `NonZero`; Fluid yields `[N, rank]` indices, the source op `[rank, N]`
pub fn nonzero(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let indices = format!("{}_nonzero", node.name);
    ctx.emit(OperationRecord::new("nonzero", Inputs::var(x.name.as_str()), indices.as_str()));
    ctx.emit(
        OperationRecord::new("transpose", Inputs::var(indices.as_str()), node.output())
            .attr("perm", vec![1i64, 0]),
    );
    Ok(())
}

/// `Range(start, limit, delta)`
pub fn range(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let start = ctx.input(node, 0)?;
    let limit = ctx.input(node, 1)?;
    let delta = ctx.input(node, 2)?;
    ctx.emit(
        OperationRecord::new(
            "range",
            Inputs::kw([
                ("start", start.name.as_str()),
                ("end", limit.name.as_str()),
                ("step", delta.name.as_str()),
            ]),
            node.output(),
        )
        .attr("dtype", start.dtype.unwrap_or(DataType::Int64)),
    );
    Ok(())
}

/// `Cast`; the target type must agree with the declared output type
pub fn cast(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let to = DataType::from_onnx(node.attr("to")?)?;
    if let Some(declared) = node.dtype {
        if declared != to {
            return Err(ConvertError::DtypeMismatch {
                node: node.name.clone(),
                declared: declared.to_string(),
                inferred: to.to_string(),
            });
        }
    }
    ctx.emit(
        OperationRecord::new("cast", Inputs::var(x.name.as_str()), node.output()).attr("dtype", to),
    );
    Ok(())
}

/// Constant int list feeding input `idx`, if any
pub(crate) fn constant_ints(
    node: &GraphNode,
    idx: usize,
    ctx: &MapContext<'_>,
) -> ConvertResult<Option<Vec<i64>>> {
    Ok(constant_input(node, idx, ctx)?.map(|t| t.to_i64_vec()))
}
