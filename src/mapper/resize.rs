//! Resampling and region-of-interest ops

use crate::error::ConvertResult;
use crate::fluid::{Inputs, OperationRecord, Value};
use crate::graph::GraphNode;

use super::context::MapContext;

fn interpolate(node: &GraphNode, scales_idx: usize, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let scales = ctx.input(node, scales_idx)?;
    let mode: String = node.attr_or("mode", "nearest".to_string())?;

    let op = if mode.contains("linear") {
        if mode != "bilinear" {
            log::warn!(
                "resize mode `{}` on `{}` is not supported, using bilinear",
                mode,
                node.name
            );
        }
        "resize_bilinear".to_string()
    } else {
        format!("resize_{}", mode)
    };

    ctx.emit(
        OperationRecord::new(
            &op,
            Inputs::kw([("input", x.name.as_str()), ("scale", scales.name.as_str())]),
            node.output(),
        )
        .named(&node.name),
    );
    Ok(())
}

/// `Resize(x, scales)` (opset 10)
pub fn resize(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    interpolate(node, 1, ctx)
}

/// `Resize(x, roi, scales)` (opset 11)
pub fn resize_v11(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    interpolate(node, 2, ctx)
}

/// `Upsample(x, scales)`
pub fn upsample(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    interpolate(node, 1, ctx)
}

/// `RoiAlign` → `roi_align`
pub fn roi_align(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let rois = ctx.input(node, 1)?;
    let pooled_height: i64 = node.attr_or("output_height", 1)?;
    let pooled_width: i64 = node.attr_or("output_width", 1)?;
    let spatial_scale: f32 = node.attr_or("spatial_scale", 1.0)?;
    let sampling_ratio: i64 = node.attr_or("sampling_ratio", 0)?;

    ctx.emit(
        OperationRecord::new(
            "roi_align",
            Inputs::kw([("input", x.name.as_str()), ("rois", rois.name.as_str())]),
            node.output(),
        )
        .attr("pooled_height", pooled_height)
        .attr("pooled_width", pooled_width)
        .attr("spatial_scale", spatial_scale)
        .attr("sampling_ratio", sampling_ratio),
    );
    Ok(())
}

/// `MaxRoiPool` → `roi_pool`
pub fn max_roi_pool(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let x = ctx.input(node, 0)?;
    let rois = ctx.input(node, 1)?;
    let pooled_shape: Vec<i64> = node.attr("pooled_shape")?;
    if pooled_shape.len() != 2 {
        return Err(crate::error::ConvertError::unsupported(
            &node.name,
            format!("pooled_shape {:?}", pooled_shape),
        ));
    }
    let spatial_scale: f32 = node.attr_or("spatial_scale", 1.0)?;

    ctx.emit(
        OperationRecord::new(
            "roi_pool",
            Inputs::kw([("input", x.name.as_str()), ("rois", rois.name.as_str())]),
            node.output(),
        )
        .attr("pooled_height", pooled_shape[0])
        .attr("pooled_width", pooled_shape[1])
        .attr("spatial_scale", Value::from(spatial_scale)),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::Operand;
    use crate::mapper::test_util::translate;
    use crate::tensor::{DataType, Tensor};

    fn scales() -> GraphNode {
        GraphNode::data("scales", Tensor::from_f32(&[4], vec![1.0, 1.0, 2.0, 2.0]).unwrap())
    }

    #[test]
    fn test_upsample_nearest() {
        let nodes = vec![
            GraphNode::input("x", DataType::Float32, &[1, 3, 4, 4]),
            scales(),
            GraphNode::op("Upsample", "up", &["x", "scales"], &["y"]),
        ];
        let out = translate(nodes, "up", upsample).unwrap();
        assert_eq!(out.ops(), vec!["resize_nearest"]);
        assert_eq!(out.records[0].inputs.get("scale"), Some(&Operand::from("scales")));
    }

    #[test]
    fn test_resize_v11_linear_to_bilinear() {
        let nodes = vec![
            GraphNode::input("x", DataType::Float32, &[1, 3, 4, 4]),
            GraphNode::data("roi", Tensor::from_f32(&[0], vec![]).unwrap()),
            scales(),
            GraphNode::op("Resize", "rs", &["x", "roi", "scales"], &["y"]).with_attr("mode", "linear"),
        ];
        let out = translate(nodes, "rs", resize_v11).unwrap();
        assert_eq!(out.ops(), vec!["resize_bilinear"]);
        assert_eq!(out.records[0].inputs.get("scale"), Some(&Operand::from("scales")));
    }

    #[test]
    fn test_max_roi_pool() {
        let nodes = vec![
            GraphNode::input("x", DataType::Float32, &[1, 3, 8, 8]),
            GraphNode::input("rois", DataType::Float32, &[2, 5]),
            GraphNode::op("MaxRoiPool", "rp", &["x", "rois"], &["y"])
                .with_attr("pooled_shape", vec![2i64, 3]),
        ];
        let out = translate(nodes, "rp", max_roi_pool).unwrap();
        assert_eq!(out.records[0].get_attr("pooled_width"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_roi_align() {
        let nodes = vec![
            GraphNode::input("x", DataType::Float32, &[1, 3, 8, 8]),
            GraphNode::input("rois", DataType::Float32, &[2, 4]),
            GraphNode::op("RoiAlign", "ra", &["x", "rois"], &["y"])
                .with_attr("output_height", 7i64)
                .with_attr("spatial_scale", 0.25f32),
        ];
        let out = translate(nodes, "ra", roi_align).unwrap();
        let record = &out.records[0];
        assert_eq!(record.get_attr("pooled_height"), Some(&Value::Int(7)));
        assert_eq!(record.get_attr("spatial_scale"), Some(&Value::Float(0.25)));
    }
}
