//! Gather
//!
//! Fluid's `gather` only indexes axis 0 with a 1-D index. Other axes are
//! moved to the front and back again; multi-dimensional indices are
//! flattened and the result reshaped.

use crate::error::ConvertResult;
use crate::fluid::{Inputs, OperationRecord, Value};
use crate::graph::{GraphNode, NodeKind};
use crate::tensor::{axis_to_front_perm, gather_output_shape, inverse_perm, normalize_axis, numel};

use super::context::MapContext;

pub(crate) fn gather_record(input: &str, index: &str, output: &str) -> OperationRecord {
    OperationRecord::new(
        "gather",
        Inputs::kw([("input", input), ("index", index)]),
        output,
    )
}

pub(crate) fn transpose_record(input: &str, perm: Vec<i64>, output: &str) -> OperationRecord {
    OperationRecord::new("transpose", Inputs::var(input), output).attr("perm", perm)
}

/// `Gather(data, indices, axis)`
pub fn gather(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let indices = ctx.input(node, 1)?;
    let indices_shape = indices.known_shape()?.to_vec();
    let axis: i64 = node.attr_or("axis", 0)?;
    let output = node.output();

    if axis == 0 && indices_shape.len() <= 1 {
        ctx.emit(gather_record(&x.name, &indices.name, output));
        return Ok(());
    }

    let x_shape = x.known_shape()?.to_vec();
    let axis = normalize_axis(axis, x_shape.len())?;
    let gathered = format!("{}_gather", node.name);

    if indices_shape.len() <= 1 {
        let perm = axis_to_front_perm(x_shape.len(), axis);
        let trans = format!("{}_trans", x.name);
        ctx.emit(transpose_record(&x.name, perm.clone(), &trans));
        ctx.emit(gather_record(&trans, &indices.name, &gathered));
        ctx.emit(transpose_record(&gathered, inverse_perm(&perm), output));
        return Ok(());
    }

    if axis == 0 && x.kind == NodeKind::Data {
        ctx.emit(
            OperationRecord::new("embedding", Inputs::var(indices.name.as_str()), output)
                .attr("param_attr", Value::str(x.name.as_str()))
                .attr("size", x_shape),
        );
        return Ok(());
    }

    let flat = format!("{}_shape", indices.name);
    ctx.emit(
        OperationRecord::new("reshape", Inputs::var(indices.name.as_str()), flat.as_str())
            .attr("shape", vec![numel(&indices_shape) as i64]),
    );

    let final_shape = gather_output_shape(&x_shape, &indices_shape, axis);
    if axis == 0 {
        ctx.emit(gather_record(&x.name, &flat, &gathered));
    } else {
        let perm = axis_to_front_perm(x_shape.len(), axis);
        let trans = format!("{}_trans", x.name);
        let restored = format!("{}_restored", gathered);
        ctx.emit(transpose_record(&x.name, perm.clone(), &trans));
        ctx.emit(gather_record(&trans, &flat, &gathered));
        ctx.emit(transpose_record(&gathered, inverse_perm(&perm), &restored));
        ctx.emit(
            OperationRecord::new("reshape", Inputs::var(restored.as_str()), output)
                .attr("shape", final_shape),
        );
        return Ok(());
    }

    ctx.emit(
        OperationRecord::new("reshape", Inputs::var(gathered.as_str()), output)
            .attr("shape", final_shape),
    );
    Ok(())
}
