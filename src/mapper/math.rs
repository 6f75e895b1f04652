//! Matrix products, sums and parametric activations

use crate::error::{ConvertError, ConvertResult};
use crate::fluid::{Inputs, OperationRecord, Value};
use crate::graph::GraphNode;

use super::constant_input;
use super::context::MapContext;

/// `Gemm`: `alpha * op(A) @ op(B) + beta * C`
///
/// The product is emitted on `<node>_mm`. A `beta` other than 1 scales `C`
/// into `<node>_beta` before the add. Without `C` (or with `beta = 0`) the
/// product is the output.
pub fn gemm(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let a = ctx.input(node, 0)?;
    let b = ctx.input(node, 1)?;
    let c = ctx.optional_input(node, 2)?;

    let alpha: f32 = node.attr_or("alpha", 1.0)?;
    let beta: f32 = node.attr_or("beta", 1.0)?;
    let trans_a: bool = node.attr_or("transA", false)?;
    let trans_b: bool = node.attr_or("transB", false)?;

    let c = c.filter(|_| beta != 0.0);
    let mm = match c {
        Some(_) => format!("{}_mm", node.name),
        None => node.output().to_string(),
    };
    let mm_name = if c.is_some() { mm.clone() } else { node.name.clone() };

    ctx.emit(
        OperationRecord::new(
            "matmul",
            Inputs::kw([("x", a.name.as_str()), ("y", b.name.as_str())]),
            mm.as_str(),
        )
        .attr("transpose_x", trans_a)
        .attr("transpose_y", trans_b)
        .attr("alpha", alpha)
        .named(&mm_name),
    );

    let c = match c {
        Some(c) => c,
        None => return Ok(()),
    };

    let addend = if beta == 1.0 {
        c.name.clone()
    } else {
        let scaled = format!("{}_beta", node.name);
        ctx.emit(
            OperationRecord::new("scale", Inputs::var(c.name.as_str()), scaled.as_str())
                .attr("scale", beta),
        );
        scaled
    };

    ctx.emit(
        OperationRecord::new(
            "elementwise_add",
            Inputs::kw([("x", mm.as_str()), ("y", addend.as_str())]),
            node.output(),
        )
        .named(&node.name),
    );
    Ok(())
}

/// `MatMul` → `matmul`
pub fn matmul(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let y = ctx.input(node, 1)?;
    ctx.emit(
        OperationRecord::new(
            "matmul",
            Inputs::kw([("x", x.name.as_str()), ("y", y.name.as_str())]),
            node.output(),
        )
        .named(&node.name),
    );
    Ok(())
}

/// `Sum` of any number of inputs as a chain of adds
pub fn sum(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let mut inputs = Vec::with_capacity(node.inputs.len());
    for idx in 0..node.inputs.len() {
        if let Some(input) = ctx.optional_input(node, idx)? {
            inputs.push(input.name);
        }
    }

    let output = node.output();
    match inputs.as_slice() {
        [] => Err(ConvertError::unsupported(&node.name, "Sum without inputs")),
        [only] => {
            ctx.emit(OperationRecord::new("assign", Inputs::var(only.as_str()), output));
            Ok(())
        }
        [first, second, rest @ ..] => {
            ctx.emit(OperationRecord::new(
                "elementwise_add",
                Inputs::kw([("x", first.as_str()), ("y", second.as_str())]),
                output,
            ));
            for next in rest {
                ctx.emit(OperationRecord::new(
                    "elementwise_add",
                    Inputs::kw([("x", output), ("y", next.as_str())]),
                    output,
                ));
            }
            Ok(())
        }
    }
}

/// `PRelu`; the slope rank picks the mode
pub fn prelu(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let slope = ctx.input(node, 1)?;
    let mode = match slope.known_shape()?.len() {
        1 => "all",
        r if r > 2 => "element",
        _ => "channel",
    };
    if slope.constant_value().is_some() {
        ctx.omit_input_if_unshared(node, 1);
    }

    ctx.emit(
        OperationRecord::new("prelu", Inputs::var(x.name.as_str()), node.output())
            .attr("param_attr", Value::str(slope.name.as_str()))
            .attr("mode", Value::str(mode)),
    );
    Ok(())
}

/// `Shrink` → `hard_shrink`; only a zero bias is supported
pub fn shrink(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let bias: f32 = node.attr_or("bias", 0.0)?;
    if bias != 0.0 {
        return Err(ConvertError::unsupported(&node.name, format!("bias {}", bias)));
    }
    let lambd: f32 = node.attr_or("lambd", 0.5)?;

    ctx.emit(
        OperationRecord::new("hard_shrink", Inputs::var(x.name.as_str()), node.output())
            .attr("threshold", lambd)
            .named(&node.name),
    );
    Ok(())
}

/// `Clip` with bounds read from optional constant inputs (opset 11)
pub fn clip_v11(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let mut bound = |idx: usize, default: f64| -> ConvertResult<f64> {
        if !node.has_input(idx) {
            return Ok(default);
        }
        let value = constant_input(node, idx, ctx)?.ok_or_else(|| {
            ConvertError::unsupported(&node.name, "clip bounds must be constant")
        })?;
        ctx.omit_input_if_unshared(node, idx);
        Ok(value.to_f64_vec().first().copied().unwrap_or(default))
    };
    let min = bound(1, -(f32::MAX as f64))?;
    let max = bound(2, f32::MAX as f64)?;

    ctx.emit(
        OperationRecord::new("clip", Inputs::var(x.name.as_str()), node.output())
            .attr("min", min)
            .attr("max", max)
            .named(&node.name),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::Operand;
    use crate::mapper::test_util::translate;
    use crate::tensor::{DataType, Tensor};

    fn gemm_nodes(op: GraphNode) -> Vec<GraphNode> {
        vec![
            GraphNode::input("a", DataType::Float32, &[2, 3]),
            GraphNode::input("b", DataType::Float32, &[3, 4]),
            GraphNode::input("c", DataType::Float32, &[4]),
            op,
        ]
    }

    #[test]
    fn test_gemm_beta_one() {
        let node = GraphNode::op("Gemm", "fc", &["a", "b", "c"], &["y"]).with_attr("transB", 1i64);
        let out = translate(gemm_nodes(node), "fc", gemm).unwrap();

        assert_eq!(out.ops(), vec!["matmul", "elementwise_add"]);
        assert_eq!(out.records[0].output(), "fc_mm");
        assert_eq!(out.records[0].get_attr("transpose_y"), Some(&Value::Bool(true)));
        assert_eq!(out.records[1].inputs.get("y"), Some(&Operand::from("c")));
    }

    #[test]
    fn test_gemm_beta_scaled() {
        let node = GraphNode::op("Gemm", "fc", &["a", "b", "c"], &["y"]).with_attr("beta", 0.5f32);
        let out = translate(gemm_nodes(node), "fc", gemm).unwrap();

        assert_eq!(out.ops(), vec!["matmul", "scale", "elementwise_add"]);
        assert_eq!(out.records[1].output(), "fc_beta");
        assert_eq!(out.records[1].get_attr("scale"), Some(&Value::Float(0.5)));
        assert_eq!(out.records[2].inputs.get("y"), Some(&Operand::from("fc_beta")));
    }

    #[test]
    fn test_gemm_beta_zero() {
        let node = GraphNode::op("Gemm", "fc", &["a", "b", "c"], &["y"]).with_attr("beta", 0.0f32);
        let out = translate(gemm_nodes(node), "fc", gemm).unwrap();
        assert_eq!(out.ops(), vec!["matmul"]);
        assert_eq!(out.records[0].output(), "y");
    }

    #[test]
    fn test_sum_chain() {
        let nodes = vec![
            GraphNode::input("a", DataType::Float32, &[2]),
            GraphNode::input("b", DataType::Float32, &[2]),
            GraphNode::input("c", DataType::Float32, &[2]),
            GraphNode::op("Sum", "sum_0", &["a", "b", "c"], &["y"]),
        ];
        let out = translate(nodes, "sum_0", sum).unwrap();

        assert_eq!(out.ops(), vec!["elementwise_add", "elementwise_add"]);
        assert_eq!(out.records[1].inputs.vars(), vec!["y", "c"]);
    }

    #[test]
    fn test_sum_single_assign() {
        let nodes = vec![
            GraphNode::input("a", DataType::Float32, &[2]),
            GraphNode::op("Sum", "sum_0", &["a"], &["y"]),
        ];
        let out = translate(nodes, "sum_0", sum).unwrap();
        assert_eq!(out.ops(), vec!["assign"]);
    }

    #[test]
    fn test_prelu_modes() {
        for (shape, mode) in [(&[1usize][..], "all"), (&[8, 1, 1][..], "element"), (&[8, 1][..], "channel")] {
            let len = shape.iter().product();
            let nodes = vec![
                GraphNode::input("x", DataType::Float32, &[1, 8, 4, 4]),
                GraphNode::data("slope", Tensor::from_f32(shape, vec![0.25; len]).unwrap()),
                GraphNode::op("PRelu", "prelu_0", &["x", "slope"], &["y"]),
            ];
            let out = translate(nodes, "prelu_0", prelu).unwrap();
            assert_eq!(out.records[0].get_attr("mode"), Some(&Value::str(mode)));
            assert!(out.omitted.contains("slope"));
        }
    }

    #[test]
    fn test_shrink_bias_rejected() {
        let nodes = vec![
            GraphNode::input("x", DataType::Float32, &[2]),
            GraphNode::op("Shrink", "s", &["x"], &["y"]).with_attr("bias", 0.1f32),
        ];
        let err = translate(nodes, "s", shrink).err().unwrap();
        assert!(matches!(err, ConvertError::UnsupportedConfiguration { .. }));
    }

    #[test]
    fn test_clip_v11_bounds_from_inputs() {
        let nodes = vec![
            GraphNode::input("x", DataType::Float32, &[2]),
            GraphNode::data("lo", Tensor::scalar_f32(0.0)),
            GraphNode::op("Clip", "clip_0", &["x", "lo", ""], &["y"]),
        ];
        let out = translate(nodes, "clip_0", clip_v11).unwrap();

        let record = &out.records[0];
        assert_eq!(record.get_attr("min"), Some(&Value::Float(0.0)));
        assert_eq!(record.get_attr("max"), Some(&Value::Float(f32::MAX as f64)));
        assert!(out.omitted.contains("lo"));
    }
}
