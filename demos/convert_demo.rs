//! Convert a small conv net and print the Fluid program
//!
//! Run with: cargo run --example convert_demo

use fluid_converter::logger::init_log;
use fluid_converter::prelude::*;
use log::LevelFilter;

fn build_graph() -> ConvertResult<Graph> {
    let weight = Tensor::from_f32(&[8, 3, 3, 3], vec![0.1; 8 * 3 * 3 * 3])?;
    let bias = Tensor::from_f32(&[8], vec![0.0; 8])?;
    let fc = Tensor::from_f32(&[8, 10], vec![0.05; 80])?;

    Graph::new(
        vec![
            GraphNode::input("image", DataType::Float32, &[0, 3, 32, 32]),
            GraphNode::data("conv_w", weight),
            GraphNode::data("conv_b", bias),
            GraphNode::data("fc_w", fc),
            GraphNode::op("Conv", "conv_0", &["image", "conv_w", "conv_b"], &["conv_out"])
                .with_attr("kernel_shape", vec![3i64, 3])
                .with_attr("strides", vec![2i64, 2])
                .with_attr("auto_pad", "SAME_UPPER"),
            GraphNode::op("Relu", "relu_0", &["conv_out"], &["relu_out"]),
            GraphNode::op("GlobalAveragePool", "gap_0", &["relu_out"], &["pooled"]),
            GraphNode::op("Flatten", "flatten_0", &["pooled"], &["flat"]).with_attr("axis", 1i64),
            GraphNode::op("Gemm", "fc_0", &["flat", "fc_w"], &["logits"]),
            GraphNode::op("Softmax", "softmax_0", &["logits"], &["prob"]),
        ],
        vec!["prob".to_string()],
    )
}

fn main() -> ConvertResult<()> {
    init_log(LevelFilter::Info)?;

    let graph = build_graph()?;
    let program = convert_graph(&graph, ConvertOptions::default().with_opset(11))?;

    println!("# opset {}", program.opset_version);
    print!("{}", program.render());
    for info in program.weight_infos() {
        println!("# param {} {} {:?}", info.name, info.dtype, info.shape);
    }
    Ok(())
}
