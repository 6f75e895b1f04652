//! Slice

use crate::error::{ConvertError, ConvertResult};
use crate::fluid::{Inputs, OperationRecord, Value};
use crate::graph::GraphNode;
use crate::tensor::DataType;

use super::context::MapContext;
use super::shape::constant_ints;

/// Largest end index Fluid accepts
pub const MAX_SLICE_END: i64 = i32::MAX as i64;

fn clamp_ends(ends: Vec<i64>) -> Vec<i64> {
    ends.into_iter().map(|e| e.min(MAX_SLICE_END)).collect()
}

/// `Slice` in both the attribute form and the input form
///
/// In the input form, constant starts and ends are folded into attributes;
/// dynamic ones are cast to int32 and referenced as variables. Only unit
/// steps are supported.
pub fn slice(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let record = OperationRecord::new("slice", Inputs::var(x.name.as_str()), node.output());

    if node.input_count() <= 1 {
        let starts: Vec<i64> = node.attr("starts")?;
        let ends: Vec<i64> = node.attr("ends")?;
        let axes: Vec<i64> = node.attr_or("axes", (0..starts.len() as i64).collect())?;
        ctx.emit(
            record
                .attr("axes", axes)
                .attr("starts", starts)
                .attr("ends", clamp_ends(ends)),
        );
        return Ok(());
    }

    if node.has_input(4) {
        let steps = constant_ints(node, 4, ctx)?
            .ok_or_else(|| ConvertError::unsupported(&node.name, "steps must be constant"))?;
        if steps.iter().any(|&s| s != 1) {
            return Err(ConvertError::unsupported(
                &node.name,
                format!("steps {:?}, only 1 is supported", steps),
            ));
        }
        ctx.omit_input_if_unshared(node, 4);
    }

    let starts = ctx.input(node, 1)?;
    let ends = ctx.input(node, 2)?;
    let starts_value = starts.constant_value().map(|t| t.to_i64_vec());
    let ends_value = ends.constant_value().map(|t| t.to_i64_vec());

    let axes = if node.has_input(3) {
        let axes = constant_ints(node, 3, ctx)?
            .ok_or_else(|| ConvertError::unsupported(&node.name, "axes must be constant"))?;
        ctx.omit_input_if_unshared(node, 3);
        axes
    } else {
        let n = match &starts_value {
            Some(v) => v.len() as i64,
            None => starts.known_shape()?.first().copied().unwrap_or(1),
        };
        (0..n).collect()
    };

    if let (Some(starts_value), Some(ends_value)) = (starts_value, ends_value) {
        ctx.omit_input_if_unshared(node, 1);
        ctx.omit_input_if_unshared(node, 2);
        ctx.emit(
            record
                .attr("axes", axes)
                .attr("starts", starts_value)
                .attr("ends", clamp_ends(ends_value)),
        );
        return Ok(());
    }

    let starts_var = cast_to_int32(&starts, ctx);
    let ends_var = cast_to_int32(&ends, ctx);
    ctx.emit(
        record
            .attr("axes", axes)
            .attr("starts", Value::var(starts_var))
            .attr("ends", Value::var(ends_var)),
    );
    Ok(())
}

fn cast_to_int32(input: &GraphNode, ctx: &mut MapContext<'_>) -> String {
    if input.dtype == Some(DataType::Int32) {
        return input.name.clone();
    }
    let cast = format!("{}_cast", input.name);
    ctx.emit(
        OperationRecord::new("cast", Inputs::var(input.name.as_str()), cast.as_str())
            .attr("dtype", DataType::Int32),
    );
    cast
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::test_util::translate;
    use crate::tensor::Tensor;

    fn x() -> GraphNode {
        GraphNode::input("x", DataType::Float32, &[4, 8])
    }

    #[test]
    fn test_attribute_form_clamps_end() {
        let nodes = vec![
            x(),
            GraphNode::op("Slice", "slice_0", &["x"], &["y"])
                .with_attr("starts", vec![1i64])
                .with_attr("ends", vec![2147483648i64])
                .with_attr("axes", vec![1i64]),
        ];
        let out = translate(nodes, "slice_0", slice).unwrap();

        let record = &out.records[0];
        assert_eq!(record.get_attr("ends"), Some(&Value::Ints(vec![2147483647])));
        assert_eq!(record.get_attr("axes"), Some(&Value::Ints(vec![1])));
    }

    #[test]
    fn test_input_form_constant_folded() {
        let nodes = vec![
            x(),
            GraphNode::data("starts", Tensor::vec_i64(&[0, 2])),
            GraphNode::data("ends", Tensor::vec_i64(&[2, i64::MAX])),
            GraphNode::op("Slice", "slice_0", &["x", "starts", "ends"], &["y"]),
        ];
        let out = translate(nodes, "slice_0", slice).unwrap();

        assert_eq!(out.ops(), vec!["slice"]);
        let record = &out.records[0];
        assert_eq!(record.get_attr("axes"), Some(&Value::Ints(vec![0, 1])));
        assert_eq!(record.get_attr("starts"), Some(&Value::Ints(vec![0, 2])));
        assert_eq!(record.get_attr("ends"), Some(&Value::Ints(vec![2, 2147483647])));
        assert!(out.omitted.contains("starts"));
        assert!(out.omitted.contains("ends"));
    }

    #[test]
    fn test_input_form_dynamic_casts() {
        let nodes = vec![
            x(),
            GraphNode::input("s", DataType::Int64, &[1]),
            GraphNode::input("e", DataType::Int32, &[1]),
            GraphNode::data("axes", Tensor::vec_i64(&[1])),
            GraphNode::op("Slice", "slice_0", &["x", "s", "e", "axes"], &["y"]),
        ];
        let out = translate(nodes, "slice_0", slice).unwrap();

        assert_eq!(out.ops(), vec!["cast", "slice"]);
        let record = &out.records[1];
        assert_eq!(record.get_attr("starts"), Some(&Value::var("s_cast")));
        assert_eq!(record.get_attr("ends"), Some(&Value::var("e")));
    }

    #[test]
    fn test_steps_must_be_one() {
        let nodes = vec![
            x(),
            GraphNode::data("starts", Tensor::vec_i64(&[0])),
            GraphNode::data("ends", Tensor::vec_i64(&[4])),
            GraphNode::data("axes", Tensor::vec_i64(&[0])),
            GraphNode::data("steps", Tensor::vec_i64(&[2])),
            GraphNode::op("Slice", "slice_0", &["x", "starts", "ends", "axes", "steps"], &["y"]),
        ];
        let err = translate(nodes, "slice_0", slice).err().unwrap();
        assert!(matches!(err, ConvertError::UnsupportedConfiguration { .. }));
    }
}
