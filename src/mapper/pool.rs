//! Pooling

use crate::error::{ConvertError, ConvertResult};
use crate::fluid::{Inputs, OperationRecord, Value};
use crate::graph::GraphNode;

use super::context::MapContext;
use super::conv::{check_spatial_rank, kernel_shape, spatial_padding, window_strides};

fn pool(node: &GraphNode, pool_type: &str, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let kernel = kernel_shape(node, None)?;
    let rank = kernel.len();
    check_spatial_rank(node, rank)?;

    let strides = window_strides(node, rank)?;
    let ceil_mode = node.attr_or("ceil_mode", false)?;
    let (padding, x_var) = spatial_padding(node, &x, &kernel, &strides, ctx)?;

    ctx.emit(
        OperationRecord::new(&format!("pool{}d", rank), Inputs::var(x_var), node.output())
            .attr("pool_size", kernel)
            .attr("pool_type", Value::str(pool_type))
            .attr("pool_stride", strides)
            .attr("pool_padding", padding)
            .attr("ceil_mode", ceil_mode)
            .attr("exclusive", pool_type == "avg")
            .named(&node.name),
    );
    Ok(())
}

/// `AveragePool` → `pool2d` / `pool3d` with `exclusive = true`
pub fn average_pool(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    pool(node, "avg", ctx)
}

/// `MaxPool` → `pool2d` / `pool3d`
pub fn max_pool(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    if let Some(dilations) = node.attr_opt::<Vec<i64>>("dilations")? {
        if dilations.iter().any(|&d| d != 1) {
            return Err(ConvertError::unsupported(
                &node.name,
                format!("dilations {:?}, only 1 is supported", dilations),
            ));
        }
    }
    if node.has_output(1) {
        return Err(ConvertError::unsupported(&node.name, "MaxPool indices output"));
    }
    pool(node, "max", ctx)
}

fn global_pool(node: &GraphNode, pool_type: &str, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let op = match x.shape() {
        Some(shape) if shape.len() == 5 => "pool3d",
        _ => "pool2d",
    };

    ctx.emit(
        OperationRecord::new(op, Inputs::var(x.name.as_str()), node.output())
            .attr("pool_type", Value::str(pool_type))
            .attr("global_pooling", true)
            .named(&node.name),
    );
    Ok(())
}

/// `GlobalMaxPool` → global `pool2d` / `pool3d`
pub fn global_max_pool(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    global_pool(node, "max", ctx)
}

/// `GlobalAveragePool` → global `pool2d` / `pool3d`
pub fn global_average_pool(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    global_pool(node, "avg", ctx)
}
