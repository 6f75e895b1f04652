//! Normalization

use crate::error::ConvertResult;
use crate::fluid::{Inputs, OperationRecord, Value};
use crate::graph::GraphNode;

use super::context::MapContext;

/// `BatchNormalization` in inference mode
///
/// Scale, bias, mean and variance are referenced by name and their own
/// parameter records are dropped.
pub fn batch_norm(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let scale = ctx.input(node, 1)?;
    let bias = ctx.input(node, 2)?;
    let mean = ctx.input(node, 3)?;
    let var = ctx.input(node, 4)?;
    for idx in 1..=4 {
        ctx.omit_input(node, idx);
    }

    let momentum: f32 = node.attr_or("momentum", 0.9)?;
    let epsilon: f32 = node.attr_or("epsilon", 1e-5)?;
    let spatial: bool = node.attr_or("spatial", false)?;

    ctx.emit(
        OperationRecord::new("batch_norm", Inputs::var(x.name.as_str()), node.output())
            .attr("momentum", momentum)
            .attr("epsilon", epsilon)
            .attr("data_layout", Value::str("NCHW"))
            .attr("is_test", true)
            .attr("param_attr", Value::str(scale.name.as_str()))
            .attr("bias_attr", Value::str(bias.name.as_str()))
            .attr("moving_mean_name", Value::str(mean.name.as_str()))
            .attr("moving_variance_name", Value::str(var.name.as_str()))
            .attr("use_global_stats", spatial)
            .named(&node.name),
    );
    Ok(())
}

/// `InstanceNormalization` → `instance_norm`
pub fn instance_norm(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let scale = ctx.input(node, 1)?;
    let bias = ctx.input(node, 2)?;
    ctx.omit_input_if_unshared(node, 1);
    ctx.omit_input_if_unshared(node, 2);
    let epsilon: f32 = node.attr_or("epsilon", 1e-5)?;

    ctx.emit(
        OperationRecord::new("instance_norm", Inputs::var(x.name.as_str()), node.output())
            .attr("epsilon", epsilon)
            .attr("param_attr", Value::str(scale.name.as_str()))
            .attr("bias_attr", Value::str(bias.name.as_str())),
    );
    Ok(())
}
