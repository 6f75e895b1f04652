//! Elementwise binary ops, comparisons and `Where`

use crate::error::{ConvertError, ConvertResult};
use crate::fluid::{Inputs, OperationRecord};
use crate::graph::GraphNode;
use crate::tensor::{resolve_broadcast, DataType};

use super::context::MapContext;

fn fluid_elementwise_op(op_type: &str) -> Option<&'static str> {
    match op_type {
        "Add" => Some("elementwise_add"),
        "Sub" => Some("elementwise_sub"),
        "Mul" => Some("elementwise_mul"),
        "Div" => Some("elementwise_div"),
        "Pow" => Some("elementwise_pow"),
        _ => None,
    }
}

/// `Add`/`Sub`/`Mul`/`Div`/`Pow` → `elementwise_*`
///
/// Fluid broadcasts `y` against a trailing run of `x`'s dims. A lower-rank
/// `y` that only matches once its leading 1s are dropped is reshaped first
/// (`<y>_reshaped`). Operands are swapped to put the higher rank first only
/// for `Add` and `Mul`.
pub fn elementwise(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let op = fluid_elementwise_op(&node.op_type).ok_or_else(|| {
        ConvertError::Internal(format!("{} is not an elementwise op", node.op_type))
    })?;

    let mut x = ctx.input(node, 0)?;
    let mut y = ctx.input(node, 1)?;
    let (mut x_shape, mut y_shape) = match (x.shape(), y.shape()) {
        (Some(xs), Some(ys)) => (xs.to_vec(), ys.to_vec()),
        _ => {
            ctx.emit(
                OperationRecord::new(
                    op,
                    Inputs::kw([("x", x.name.as_str()), ("y", y.name.as_str())]),
                    node.output(),
                )
                .named(&node.name),
            );
            return Ok(());
        }
    };

    if x_shape.len() < y_shape.len() {
        if matches!(node.op_type.as_str(), "Add" | "Mul") {
            std::mem::swap(&mut x, &mut y);
            std::mem::swap(&mut x_shape, &mut y_shape);
        } else {
            log::warn!(
                "{} `{}`: x rank {} < y rank {}, operands kept in order",
                node.op_type,
                node.name,
                x_shape.len(),
                y_shape.len()
            );
        }
    }

    let mut y_var = y.name.clone();
    if y_shape.len() <= x_shape.len() {
        if let Some(target) = resolve_broadcast(&x_shape, &y_shape) {
            let reshaped = format!("{}_reshaped", y.name);
            ctx.emit(
                OperationRecord::new("reshape", Inputs::var(y.name.as_str()), reshaped.as_str())
                    .attr("shape", target)
                    .named(&reshaped),
            );
            y_var = reshaped;
        }
    }

    ctx.emit(
        OperationRecord::new(
            op,
            Inputs::kw([("x", x.name.as_str()), ("y", y_var.as_str())]),
            node.output(),
        )
        .named(&node.name),
    );
    Ok(())
}

fn compare(node: &GraphNode, op: &str, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let y = ctx.input(node, 1)?;
    ctx.emit(OperationRecord::new(
        op,
        Inputs::kw([("x", x.name.as_str()), ("y", y.name.as_str())]),
        node.output(),
    ));
    Ok(())
}

/// `Equal` → `equal`
pub fn equal(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    compare(node, "equal", ctx)
}

/// `Greater` → `greater_than`
pub fn greater(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    compare(node, "greater_than", ctx)
}

/// `Less` → `less_than`
pub fn less(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    compare(node, "less_than", ctx)
}

/// `Where(cond, x, y)` as `x * cond + y * !cond`
pub fn where_op(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let cond = ctx.input(node, 0)?;
    let x = ctx.input(node, 1)?;
    let y = ctx.input(node, 2)?;
    let dtype = x.dtype.unwrap_or(DataType::Float32);

    let not_cond = format!("{}_not", cond.name);
    let not_cond_cast = format!("{}_cast", not_cond);
    let cond_cast = format!("{}_cast", cond.name);
    let x_mul = format!("{}_mul", x.name);
    let y_mul = format!("{}_mul", y.name);

    ctx.emit(OperationRecord::new(
        "logical_not",
        Inputs::var(cond.name.as_str()),
        not_cond.as_str(),
    ));
    ctx.emit(
        OperationRecord::new("cast", Inputs::var(not_cond.as_str()), not_cond_cast.as_str())
            .attr("dtype", dtype),
    );
    ctx.emit(
        OperationRecord::new("cast", Inputs::var(cond.name.as_str()), cond_cast.as_str())
            .attr("dtype", dtype),
    );
    ctx.emit(OperationRecord::new(
        "elementwise_mul",
        Inputs::kw([("x", x.name.as_str()), ("y", cond_cast.as_str())]),
        x_mul.as_str(),
    ));
    ctx.emit(OperationRecord::new(
        "elementwise_mul",
        Inputs::kw([("x", y.name.as_str()), ("y", not_cond_cast.as_str())]),
        y_mul.as_str(),
    ));
    ctx.emit(OperationRecord::new(
        "elementwise_add",
        Inputs::kw([("x", x_mul.as_str()), ("y", y_mul.as_str())]),
        node.output(),
    ));
    Ok(())
}
