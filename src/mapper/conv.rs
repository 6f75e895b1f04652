//! Convolution and transposed convolution

use crate::error::{ConvertError, ConvertResult};
use crate::fluid::{Inputs, OperationRecord, Value};
use crate::graph::GraphNode;
use crate::tensor::{conv_transpose_output_size, same_padding};

use super::context::MapContext;
use super::padding::{interleave_pads, pad_if_asymmetric};

/// Spatial rank from `kernel_shape`, falling back to the weight shape
pub(crate) fn kernel_shape(node: &GraphNode, weight_shape: Option<&[i64]>) -> ConvertResult<Vec<i64>> {
    if let Some(kernel) = node.attr_opt::<Vec<i64>>("kernel_shape")? {
        return Ok(kernel);
    }
    match weight_shape {
        Some(shape) if shape.len() > 2 => Ok(shape[2..].to_vec()),
        _ => Err(ConvertError::MissingAttribute {
            node: node.name.clone(),
            attr: "kernel_shape".to_string(),
        }),
    }
}

/// Reject spatial ranks other than 2 and 3
pub(crate) fn check_spatial_rank(node: &GraphNode, rank: usize) -> ConvertResult<()> {
    if !(2..=3).contains(&rank) {
        return Err(ConvertError::UnsupportedRank {
            op_type: node.op_type.clone(),
            rank,
            min: 2,
            max: 3,
        });
    }
    Ok(())
}

/// Whether `auto_pad` asks for same padding
pub(crate) fn is_same_auto_pad(node: &GraphNode) -> ConvertResult<bool> {
    let auto_pad: String = node.attr_or("auto_pad", "NOTSET".to_string())?;
    Ok(auto_pad == "SAME_UPPER" || auto_pad == "SAME_LOWER")
}

/// Consumer padding for a conv or pool window, plus the (maybe padded) input
///
/// `auto_pad` SAME computes per-axis `(before, after)` pairs from the input
/// shape. Otherwise explicit `pads` go through [`pad_if_asymmetric`].
pub(crate) fn spatial_padding(
    node: &GraphNode,
    x: &GraphNode,
    kernel: &[i64],
    strides: &[i64],
    ctx: &mut MapContext<'_>,
) -> ConvertResult<(Vec<i64>, String)> {
    let rank = kernel.len();
    if is_same_auto_pad(node)? {
        let input_shape = x.known_shape()?;
        if input_shape.len() != rank + 2 {
            return Err(ConvertError::UnknownShape(x.name.clone()));
        }
        let mut pads = vec![0i64; rank * 2];
        for i in 0..rank {
            let (before, after) = same_padding(input_shape[i + 2], kernel[i], strides[i]);
            pads[i] = before;
            pads[rank + i] = after;
        }
        return Ok((interleave_pads(&pads), x.name.clone()));
    }

    let pads = window_attr(node, "pads", 0, rank * 2)?;
    pad_if_asymmetric(node, &pads, &x.name, ctx)
}

/// Per-axis window attribute, rejected unless it has `len` entries
pub(crate) fn window_attr(
    node: &GraphNode,
    attr: &str,
    default: i64,
    len: usize,
) -> ConvertResult<Vec<i64>> {
    let values: Vec<i64> = node.attr_or(attr, vec![default; len])?;
    if values.len() != len {
        return Err(ConvertError::unsupported(
            &node.name,
            format!("{} {:?}, expected {} values", attr, values, len),
        ));
    }
    Ok(values)
}

/// `strides` of a window op; each must be positive
pub(crate) fn window_strides(node: &GraphNode, rank: usize) -> ConvertResult<Vec<i64>> {
    let strides = window_attr(node, "strides", 1, rank)?;
    if strides.iter().any(|&s| s <= 0) {
        return Err(ConvertError::unsupported(
            &node.name,
            format!("strides {:?} must be positive", strides),
        ));
    }
    Ok(strides)
}

fn check_dilations(node: &GraphNode, rank: usize) -> ConvertResult<Vec<i64>> {
    let dilations = window_attr(node, "dilations", 1, rank)?;
    if dilations.iter().any(|&d| d != 1) {
        return Err(ConvertError::unsupported(
            &node.name,
            format!("dilations {:?}, only 1 is supported", dilations),
        ));
    }
    Ok(dilations)
}

fn bias_attr(bias: Option<&GraphNode>) -> Value {
    match bias {
        Some(b) => Value::str(b.name.as_str()),
        None => Value::Bool(false),
    }
}

/// `Conv` → `conv2d` / `conv3d`
pub fn conv(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let w = ctx.input(node, 1)?;
    let b = ctx.optional_input(node, 2)?;
    ctx.omit_input(node, 1);
    ctx.omit_input(node, 2);

    let w_shape = w.known_shape()?.to_vec();
    let kernel = kernel_shape(node, Some(&w_shape))?;
    let rank = kernel.len();
    check_spatial_rank(node, rank)?;

    let groups: i64 = node.attr_or("group", 1)?;
    let strides = window_strides(node, rank)?;
    let dilations = check_dilations(node, rank)?;
    let (padding, x_var) = spatial_padding(node, &x, &kernel, &strides, ctx)?;

    ctx.emit(
        OperationRecord::new(&format!("conv{}d", rank), Inputs::var(x_var), node.output())
            .attr("num_filters", w_shape[0])
            .attr("filter_size", kernel)
            .attr("stride", strides)
            .attr("padding", padding)
            .attr("dilation", dilations)
            .attr("groups", groups)
            .attr("param_attr", Value::str(w.name.as_str()))
            .attr("bias_attr", bias_attr(b.as_ref()))
            .named(&node.name),
    );
    Ok(())
}

/// `ConvTranspose` → `conv2d_transpose` / `conv3d_transpose`
///
/// The output size is computed per spatial axis; same auto padding is not
/// supported.
pub fn conv_transpose(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let w = ctx.input(node, 1)?;
    let b = ctx.optional_input(node, 2)?;
    ctx.omit_input(node, 1);
    ctx.omit_input(node, 2);

    if is_same_auto_pad(node)? {
        return Err(ConvertError::unsupported(&node.name, "auto_pad SAME for ConvTranspose"));
    }

    let w_shape = w.known_shape()?.to_vec();
    let kernel = kernel_shape(node, Some(&w_shape))?;
    let rank = kernel.len();
    check_spatial_rank(node, rank)?;

    let groups: i64 = node.attr_or("group", 1)?;
    let strides = window_strides(node, rank)?;
    let dilations = check_dilations(node, rank)?;
    let out_padding = window_attr(node, "output_padding", 0, rank)?;
    let pads = window_attr(node, "pads", 0, rank * 2)?;
    let (padding, x_var) = pad_if_asymmetric(node, &pads, &x.name, ctx)?;

    let input_shape = x.known_shape()?;
    if input_shape.len() != rank + 2 {
        return Err(ConvertError::UnknownShape(x.name.clone()));
    }
    let output_size: Vec<i64> = (0..rank)
        .map(|i| {
            conv_transpose_output_size(
                input_shape[i + 2],
                strides[i],
                padding[i],
                dilations[i],
                kernel[i],
                out_padding[i],
            )
        })
        .collect();

    ctx.emit(
        OperationRecord::new(
            &format!("conv{}d_transpose", rank),
            Inputs::var(x_var),
            node.output(),
        )
        .attr("num_filters", w_shape[1] * groups)
        .attr("output_size", output_size)
        .attr("filter_size", kernel)
        .attr("padding", padding)
        .attr("stride", strides)
        .attr("dilation", dilations)
        .attr("groups", groups)
        .attr("param_attr", Value::str(w.name.as_str()))
        .attr(
            "bias_attr",
            b.as_ref().map(|b| Value::str(b.name.as_str())).unwrap_or(Value::Null),
        )
        .named(&node.name),
    );
    Ok(())
}
