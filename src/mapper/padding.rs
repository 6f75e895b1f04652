//! Padding
//!
//! Source pads are laid out as all starts then all ends (`[s0, s1, e0, e1]`);
//! Fluid wants them interleaved per axis (`[s0, e0, s1, e1]`).

use crate::error::{ConvertError, ConvertResult};
use crate::fluid::{Inputs, OperationRecord};
use crate::graph::GraphNode;

use super::constant_input;
use super::context::MapContext;

/// Reorder starts-then-ends pads to per-axis (start, end) pairs
pub fn interleave_pads(pads: &[i64]) -> Vec<i64> {
    let k = pads.len() / 2;
    (0..k).flat_map(|i| [pads[i], pads[k + i]]).collect()
}

/// Fold symmetric pads into the consumer, or pad explicitly
///
/// `pads` holds the spatial pads of `node` (starts then ends). Symmetric pads
/// come back as the per-axis padding with `x` unchanged. Otherwise a single
/// pad op is emitted on `<node>_padded` and the consumer gets zero padding.
pub fn pad_if_asymmetric(
    node: &GraphNode,
    pads: &[i64],
    x: &str,
    ctx: &mut MapContext<'_>,
) -> ConvertResult<(Vec<i64>, String)> {
    let k = pads.len() / 2;
    if pads.len() % 2 != 0 {
        return Err(ConvertError::unsupported(
            &node.name,
            format!("odd pads length {}", pads.len()),
        ));
    }
    if pads[..k] == pads[k..] {
        return Ok((pads[..k].to_vec(), x.to_string()));
    }

    let padded = format!("{}_padded", node.name);
    let paddings = interleave_pads(pads);
    let record = if k == 2 {
        OperationRecord::new("pad2d", Inputs::var(x), padded.as_str())
            .attr("paddings", paddings)
            .attr("mode", crate::fluid::Value::str("constant"))
            .attr("pad_value", 0.0f64)
            .attr("data_format", crate::fluid::Value::str("NCHW"))
    } else {
        // batch and channel stay unpadded
        let mut full = vec![0i64; 4];
        full.extend(paddings);
        OperationRecord::new("pad", Inputs::var(x), padded.as_str())
            .attr("paddings", full)
            .attr("pad_value", 0.0f64)
    };
    ctx.emit(record.named(&padded));

    Ok((vec![0; k], padded))
}

/// `Pad` with attribute pads (opset 9/10)
pub fn pad(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let pads: Vec<i64> = node.attr("pads")?;
    let mode: String = node.attr_or("mode", "constant".to_string())?;
    let value: f32 = node.attr_or("value", 0.0)?;
    emit_pad(node, &pads, &mode, value, ctx)
}

/// `Pad` with pads and fill value read from constant inputs (opset 11)
pub fn pad_v11(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let pads = constant_input(node, 1, ctx)?
        .ok_or_else(|| ConvertError::unsupported(&node.name, "pads must be a constant"))?
        .to_i64_vec();
    ctx.omit_input(node, 1);

    let value = if node.has_input(2) {
        let v = constant_input(node, 2, ctx)?.ok_or_else(|| {
            ConvertError::unsupported(&node.name, "constant_value must be a constant")
        })?;
        ctx.omit_input(node, 2);
        v.to_f64_vec().first().copied().unwrap_or(0.0) as f32
    } else {
        0.0
    };

    let mode: String = node.attr_or("mode", "constant".to_string())?;
    emit_pad(node, &pads, &mode, value, ctx)
}

fn emit_pad(
    node: &GraphNode,
    pads: &[i64],
    mode: &str,
    value: f32,
    ctx: &mut MapContext<'_>,
) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let rank_is_4 = x.shape().map(|s| s.len() == 4).unwrap_or(false)
        || node.shape().map(|s| s.len() == 4).unwrap_or(false);

    let mut paddings = interleave_pads(pads);
    let mut as_pad2d = pads.len() == 4 && (mode != "constant" || rank_is_4);
    if pads.len() == 8 && paddings[..4].iter().all(|&p| p == 0) {
        as_pad2d = true;
        paddings = paddings[4..].to_vec();
    }

    let record = if as_pad2d {
        OperationRecord::new("pad2d", Inputs::var(x.name.as_str()), node.output())
            .attr("paddings", paddings)
            .attr("mode", crate::fluid::Value::str(mode))
            .attr("pad_value", value)
            .attr("data_format", crate::fluid::Value::str("NCHW"))
    } else {
        if mode != "constant" {
            return Err(ConvertError::unsupported(
                &node.name,
                format!("mode `{}` only supported for 2D spatial pads", mode),
            ));
        }
        OperationRecord::new("pad", Inputs::var(x.name.as_str()), node.output())
            .attr("paddings", paddings)
            .attr("pad_value", value)
    };
    ctx.emit(record.named(&node.name));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::Value;
    use crate::graph::Graph;
    use crate::mapper::test_util::translate;
    use crate::tensor::{DataType, Tensor};

    #[test]
    fn test_interleave() {
        assert_eq!(interleave_pads(&[1, 2, 3, 4]), vec![1, 3, 2, 4]);
        assert_eq!(
            interleave_pads(&[0, 0, 1, 2, 0, 0, 3, 4]),
            vec![0, 0, 0, 0, 1, 3, 2, 4]
        );
    }

    fn conv_graph() -> Graph {
        Graph::new(
            vec![
                GraphNode::input("x", DataType::Float32, &[1, 3, 8, 8]),
                GraphNode::op("Conv", "conv_0", &["x"], &["y"]),
            ],
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn test_symmetric_pads_fold() {
        let graph = conv_graph();
        let mut ctx = MapContext::new(&graph);
        let node = graph.get_node("conv_0").unwrap();

        let (pads, x) = pad_if_asymmetric(node, &[1, 2, 1, 2], "x", &mut ctx).unwrap();
        assert_eq!(pads, vec![1, 2]);
        assert_eq!(x, "x");
        assert!(ctx.take_records().is_empty());
    }

    #[test]
    fn test_asymmetric_pads_emit_one_pad() {
        let graph = conv_graph();
        let mut ctx = MapContext::new(&graph);
        let node = graph.get_node("conv_0").unwrap();

        let (pads, x) = pad_if_asymmetric(node, &[0, 0, 1, 1], "x", &mut ctx).unwrap();
        assert_eq!(pads, vec![0, 0]);
        assert_eq!(x, "conv_0_padded");

        let records = ctx.take_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].op, "pad2d");
        assert_eq!(records[0].output(), "conv_0_padded");
        assert_eq!(records[0].get_attr("paddings"), Some(&Value::Ints(vec![0, 1, 0, 1])));
    }

    #[test]
    fn test_pad_reflect_2d() {
        let out = translate(
            vec![
                GraphNode::input("x", DataType::Float32, &[1, 3, 8, 8]),
                GraphNode::op("Pad", "pad_0", &["x"], &["y"])
                    .with_attr("pads", vec![0i64, 0, 1, 2, 0, 0, 3, 4])
                    .with_attr("mode", "reflect"),
            ],
            "pad_0",
            pad,
        )
        .unwrap();

        let record = &out.records[0];
        assert_eq!(record.op, "pad2d");
        assert_eq!(record.get_attr("paddings"), Some(&Value::Ints(vec![1, 3, 2, 4])));
        assert_eq!(record.get_attr("mode"), Some(&Value::str("reflect")));
    }

    #[test]
    fn test_pad_constant_generic() {
        let out = translate(
            vec![
                GraphNode::input("x", DataType::Float32, &[2, 3, 4]),
                GraphNode::op("Pad", "pad_0", &["x"], &["y"])
                    .with_attr("pads", vec![0i64, 1, 0, 0, 1, 0])
                    .with_attr("value", 1.5f32),
            ],
            "pad_0",
            pad,
        )
        .unwrap();

        let record = &out.records[0];
        assert_eq!(record.op, "pad");
        assert_eq!(record.get_attr("paddings"), Some(&Value::Ints(vec![0, 0, 1, 1, 0, 0])));
        assert_eq!(record.get_attr("pad_value"), Some(&Value::Float(1.5)));
    }

    #[test]
    fn test_pad_v11_folds_inputs() {
        let out = translate(
            vec![
                GraphNode::input("x", DataType::Float32, &[1, 1, 4, 4]),
                GraphNode::data("pads", Tensor::vec_i64(&[0, 0, 1, 1, 0, 0, 1, 1])),
                GraphNode::op("Pad", "pad_0", &["x", "pads"], &["y"]),
            ],
            "pad_0",
            pad_v11,
        )
        .unwrap();

        assert_eq!(out.ops(), vec!["pad2d"]);
        assert!(out.omitted.contains("pads"));
    }
}
