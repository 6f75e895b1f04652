//! Fluid record → ONNX node translators

use rustc_hash::FxHashMap;

use crate::error::{ConvertError, ConvertResult};
use crate::fluid::{Operand, OperationRecord, Value};
use crate::graph::GraphNode;
use crate::mapper::DIRECT_MAPPINGS;
use crate::tensor::{DataType, Tensor};

/// Per-run export state
#[derive(Debug)]
pub struct ExportContext {
    opset_version: i64,
    counters: FxHashMap<String, usize>,
}

impl ExportContext {
    /// Create a context targeting `opset_version`
    pub fn new(opset_version: i64) -> Self {
        Self {
            opset_version,
            counters: FxHashMap::default(),
        }
    }

    /// Target opset version
    pub fn opset_version(&self) -> i64 {
        self.opset_version
    }

    /// Fresh node name for `op_type` (`Conv_0`, `Conv_1`, ...)
    pub fn node_name(&mut self, op_type: &str) -> String {
        let counter = self.counters.entry(op_type.to_string()).or_insert(0);
        let name = format!("{}_{}", op_type, counter);
        *counter += 1;
        name
    }
}

/// Reverse translator signature
pub type ExportTranslator =
    fn(&OperationRecord, &mut ExportContext) -> ConvertResult<Vec<GraphNode>>;

/// Translator for a Fluid op, if one exists
pub fn lookup(op: &str) -> Option<ExportTranslator> {
    match op {
        "data" => Some(feed),
        "create_parameter" => Some(parameter),
        "fill_constant" => Some(fill_constant),
        "elementwise_add" | "elementwise_sub" | "elementwise_mul" | "elementwise_div"
        | "elementwise_pow" => Some(elementwise),
        "conv2d" | "conv3d" => Some(conv),
        "pool2d" | "pool3d" => Some(pool),
        "pad2d" => Some(pad2d),
        "reshape" => Some(reshape),
        "transpose" => Some(transpose),
        "concat" => Some(concat),
        "matmul" => Some(matmul),
        "cast" => Some(cast),
        op if DIRECT_MAPPINGS.iter().any(|m| m.fluid_op == op) => Some(directly_unmap),
        _ => None,
    }
}

fn op_node(ctx: &mut ExportContext, op_type: &str, inputs: &[&str], output: &str) -> GraphNode {
    let name = ctx.node_name(op_type);
    GraphNode::op(op_type, &name, inputs, &[output])
}

fn single_input(record: &OperationRecord) -> ConvertResult<String> {
    match record.inputs.vars().as_slice() {
        [x] => Ok(x.to_string()),
        other => Err(ConvertError::unsupported(
            record.output(),
            format!("{} takes one variable input, got {}", record.op, other.len()),
        )),
    }
}

fn kw_input(record: &OperationRecord, key: &str) -> ConvertResult<String> {
    match record.inputs.get(key) {
        Some(Operand::Var(v)) => Ok(v.clone()),
        _ => Err(ConvertError::UnresolvedInput {
            node: record.output().to_string(),
            input: key.to_string(),
        }),
    }
}

fn missing(record: &OperationRecord, attr: &str) -> ConvertError {
    ConvertError::MissingAttribute {
        node: record.output().to_string(),
        attr: attr.to_string(),
    }
}

fn ints(record: &OperationRecord, attr: &str) -> ConvertResult<Vec<i64>> {
    record
        .get_attr(attr)
        .and_then(Value::as_ints)
        .map(<[i64]>::to_vec)
        .ok_or_else(|| missing(record, attr))
}

fn ints_or(record: &OperationRecord, attr: &str, default: Vec<i64>) -> Vec<i64> {
    record
        .get_attr(attr)
        .and_then(Value::as_ints)
        .map(<[i64]>::to_vec)
        .unwrap_or(default)
}

fn flag(record: &OperationRecord, attr: &str) -> bool {
    matches!(record.get_attr(attr), Some(Value::Bool(true)))
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Float(v) => Some(*v),
        Value::Int(v) => Some(*v as f64),
        Value::Bool(v) => Some(f64::from(u8::from(*v))),
        _ => None,
    }
}

/// ONNX `pads` (all begins, then all ends) from a Fluid padding list
///
/// One entry per axis is symmetric; two per axis are `(before, after)` pairs.
fn onnx_pads(record: &OperationRecord, padding: &[i64], rank: usize) -> ConvertResult<Vec<i64>> {
    if padding.len() == rank {
        return Ok(padding.iter().chain(padding).copied().collect());
    }
    if padding.len() == rank * 2 {
        let begins = padding.iter().step_by(2);
        let ends = padding.iter().skip(1).step_by(2);
        return Ok(begins.chain(ends).copied().collect());
    }
    Err(ConvertError::unsupported(
        record.output(),
        format!("padding {:?} does not fit spatial rank {}", padding, rank),
    ))
}

/// `data` → graph input
pub fn feed(record: &OperationRecord, _ctx: &mut ExportContext) -> ConvertResult<Vec<GraphNode>> {
    let dtype = match record.get_attr("dtype") {
        Some(Value::DType(d)) => *d,
        _ => DataType::Float32,
    };
    let shape = ints(record, "shape")?;
    Ok(vec![GraphNode::input(record.output(), dtype, &shape)])
}

/// `create_parameter` declares a weight exported separately
pub fn parameter(_record: &OperationRecord, _ctx: &mut ExportContext) -> ConvertResult<Vec<GraphNode>> {
    Ok(Vec::new())
}

/// `fill_constant` → `Constant`, or `ConstantOfShape` for a runtime shape
pub fn fill_constant(record: &OperationRecord, ctx: &mut ExportContext) -> ConvertResult<Vec<GraphNode>> {
    let dtype = match record.get_attr("dtype") {
        Some(Value::DType(d)) => *d,
        _ => DataType::Float32,
    };
    let value = record
        .get_attr("value")
        .and_then(number)
        .ok_or_else(|| missing(record, "value"))?;
    let output = record.output();

    match record.get_attr("shape") {
        Some(Value::Var(shape)) => {
            let scalar = Tensor::from_f64(&[1], vec![value])?.cast(dtype)?;
            Ok(vec![op_node(ctx, "ConstantOfShape", &[shape.as_str()], output)
                .with_attr("value", scalar)])
        }
        Some(Value::Ints(shape)) => {
            let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
            let len = dims.iter().product();
            let tensor = Tensor::from_f64(&dims, vec![value; len])?.cast(dtype)?;
            Ok(vec![op_node(ctx, "Constant", &[], output).with_attr("value", tensor)])
        }
        _ => Err(missing(record, "shape")),
    }
}

/// `elementwise_*` → `Add` / `Sub` / `Mul` / `Div` / `Pow`
pub fn elementwise(record: &OperationRecord, ctx: &mut ExportContext) -> ConvertResult<Vec<GraphNode>> {
    let op_type = match record.op.as_str() {
        "elementwise_add" => "Add",
        "elementwise_sub" => "Sub",
        "elementwise_mul" => "Mul",
        "elementwise_div" => "Div",
        "elementwise_pow" => "Pow",
        other => return Err(ConvertError::Internal(format!("{} is not elementwise", other))),
    };
    if let Some(axis) = record.get_attr("axis").and_then(Value::as_int) {
        if axis != -1 {
            return Err(ConvertError::unsupported(
                record.output(),
                format!("broadcast axis {}", axis),
            ));
        }
    }

    let x = kw_input(record, "x")?;
    let y = kw_input(record, "y")?;
    Ok(vec![op_node(ctx, op_type, &[x.as_str(), y.as_str()], record.output())])
}

/// `conv2d` / `conv3d` → `Conv`
pub fn conv(record: &OperationRecord, ctx: &mut ExportContext) -> ConvertResult<Vec<GraphNode>> {
    let x = single_input(record)?;
    let weight = match record.get_attr("param_attr") {
        Some(Value::Str(w)) => w.clone(),
        _ => return Err(missing(record, "param_attr")),
    };
    let mut inputs = vec![x.as_str(), weight.as_str()];
    if let Some(Value::Str(bias)) = record.get_attr("bias_attr") {
        inputs.push(bias.as_str());
    }

    let kernel = ints(record, "filter_size")?;
    let rank = kernel.len();
    let pads = onnx_pads(record, &ints_or(record, "padding", vec![0; rank]), rank)?;
    let groups = record.get_attr("groups").and_then(Value::as_int).unwrap_or(1);

    Ok(vec![op_node(ctx, "Conv", &inputs, record.output())
        .with_attr("kernel_shape", kernel)
        .with_attr("strides", ints_or(record, "stride", vec![1; rank]))
        .with_attr("pads", pads)
        .with_attr("dilations", ints_or(record, "dilation", vec![1; rank]))
        .with_attr("group", groups)])
}

/// `pool2d` / `pool3d` → `MaxPool` / `AveragePool` or their global forms
///
/// `ceil_mode` needs opset 10.
pub fn pool(record: &OperationRecord, ctx: &mut ExportContext) -> ConvertResult<Vec<GraphNode>> {
    let x = single_input(record)?;
    let is_max = match record.get_attr("pool_type") {
        Some(Value::Str(t)) if t == "max" => true,
        Some(Value::Str(t)) if t == "avg" => false,
        other => {
            return Err(ConvertError::unsupported(
                record.output(),
                format!("pool_type {:?}", other),
            ))
        }
    };

    if flag(record, "global_pooling") {
        let op_type = if is_max { "GlobalMaxPool" } else { "GlobalAveragePool" };
        return Ok(vec![op_node(ctx, op_type, &[x.as_str()], record.output())]);
    }

    let kernel = ints(record, "pool_size")?;
    let rank = kernel.len();
    let pads = onnx_pads(record, &ints_or(record, "pool_padding", vec![0; rank]), rank)?;
    let op_type = if is_max { "MaxPool" } else { "AveragePool" };

    let mut node = op_node(ctx, op_type, &[x.as_str()], record.output())
        .with_attr("kernel_shape", kernel)
        .with_attr("strides", ints_or(record, "pool_stride", vec![1; rank]))
        .with_attr("pads", pads);
    if flag(record, "ceil_mode") {
        if ctx.opset_version() < 10 {
            return Err(ConvertError::unsupported(
                record.output(),
                format!("ceil_mode needs opset 10, exporting opset {}", ctx.opset_version()),
            ));
        }
        node = node.with_attr("ceil_mode", 1i64);
    }
    if !is_max && !flag(record, "exclusive") {
        node = node.with_attr("count_include_pad", 1i64);
    }
    Ok(vec![node])
}

/// `pad2d` → `Pad` on the two spatial axes of NCHW
///
/// Opset 11 takes pads as an input tensor, older opsets as an attribute.
pub fn pad2d(record: &OperationRecord, ctx: &mut ExportContext) -> ConvertResult<Vec<GraphNode>> {
    let x = single_input(record)?;
    let paddings = ints(record, "paddings")?;
    let [top, bottom, left, right] = match paddings.as_slice() {
        &[t, b, l, r] => [t, b, l, r],
        _ => {
            return Err(ConvertError::unsupported(
                record.output(),
                format!("paddings {:?}, expected 4 values", paddings),
            ))
        }
    };
    let pads = vec![0, 0, top, left, 0, 0, bottom, right];
    let mode = match record.get_attr("mode") {
        Some(Value::Str(m)) => m.clone(),
        _ => "constant".to_string(),
    };
    let value = record.get_attr("pad_value").and_then(number).unwrap_or(0.0);
    let output = record.output();

    if ctx.opset_version() < 11 {
        return Ok(vec![op_node(ctx, "Pad", &[x.as_str()], output)
            .with_attr("pads", pads)
            .with_attr("mode", mode)
            .with_attr("value", value as f32)]);
    }

    let pads_name = format!("{}_pads", output);
    let value_name = format!("{}_pad_value", output);
    Ok(vec![
        op_node(ctx, "Constant", &[], pads_name.as_str())
            .with_attr("value", Tensor::vec_i64(&pads)),
        op_node(ctx, "Constant", &[], value_name.as_str())
            .with_attr("value", Tensor::from_f64(&[1], vec![value])?.cast(DataType::Float32)?),
        op_node(ctx, "Pad", &[x.as_str(), pads_name.as_str(), value_name.as_str()], output)
            .with_attr("mode", mode),
    ])
}

/// `reshape` → `Reshape`, with a literal shape lifted into a `Constant`
pub fn reshape(record: &OperationRecord, ctx: &mut ExportContext) -> ConvertResult<Vec<GraphNode>> {
    let x = single_input(record)?;
    let output = record.output();
    match record.get_attr("shape") {
        Some(Value::Var(shape)) => {
            Ok(vec![op_node(ctx, "Reshape", &[x.as_str(), shape.as_str()], output)])
        }
        Some(Value::Ints(shape)) => {
            let shape_name = format!("{}_shape", output);
            Ok(vec![
                op_node(ctx, "Constant", &[], shape_name.as_str())
                    .with_attr("value", Tensor::vec_i64(shape)),
                op_node(ctx, "Reshape", &[x.as_str(), shape_name.as_str()], output),
            ])
        }
        _ => Err(missing(record, "shape")),
    }
}

/// `transpose` → `Transpose`
pub fn transpose(record: &OperationRecord, ctx: &mut ExportContext) -> ConvertResult<Vec<GraphNode>> {
    let x = single_input(record)?;
    let perm = ints(record, "perm")?;
    Ok(vec![op_node(ctx, "Transpose", &[x.as_str()], record.output()).with_attr("perm", perm)])
}

/// `concat` → `Concat`
pub fn concat(record: &OperationRecord, ctx: &mut ExportContext) -> ConvertResult<Vec<GraphNode>> {
    let inputs = record.inputs.vars();
    let axis = record.get_attr("axis").and_then(Value::as_int).unwrap_or(0);
    Ok(vec![op_node(ctx, "Concat", &inputs, record.output()).with_attr("axis", axis)])
}

/// `matmul` → `MatMul`, or `Gemm` when it transposes or scales
pub fn matmul(record: &OperationRecord, ctx: &mut ExportContext) -> ConvertResult<Vec<GraphNode>> {
    let x = kw_input(record, "x")?;
    let y = kw_input(record, "y")?;
    let trans_x = flag(record, "transpose_x");
    let trans_y = flag(record, "transpose_y");
    let alpha = record.get_attr("alpha").and_then(number).unwrap_or(1.0);

    if !trans_x && !trans_y && alpha == 1.0 {
        return Ok(vec![op_node(ctx, "MatMul", &[x.as_str(), y.as_str()], record.output())]);
    }
    Ok(vec![op_node(ctx, "Gemm", &[x.as_str(), y.as_str()], record.output())
        .with_attr("transA", i64::from(trans_x))
        .with_attr("transB", i64::from(trans_y))
        .with_attr("alpha", alpha as f32)])
}

/// `cast` → `Cast`
pub fn cast(record: &OperationRecord, ctx: &mut ExportContext) -> ConvertResult<Vec<GraphNode>> {
    let x = single_input(record)?;
    let dtype = match record.get_attr("dtype") {
        Some(Value::DType(d)) => *d,
        _ => return Err(missing(record, "dtype")),
    };
    Ok(vec![
        op_node(ctx, "Cast", &[x.as_str()], record.output()).with_attr("to", dtype.to_onnx())
    ])
}

/// Reverse of the direct mapping table
///
/// Attribute renames are undone and `name` is dropped.
pub fn directly_unmap(record: &OperationRecord, ctx: &mut ExportContext) -> ConvertResult<Vec<GraphNode>> {
    let mapping = DIRECT_MAPPINGS
        .iter()
        .find(|m| m.fluid_op == record.op)
        .ok_or_else(|| ConvertError::Internal(format!("no direct mapping for {}", record.op)))?;
    let x = single_input(record)?;

    let mut node = op_node(ctx, mapping.source, &[x.as_str()], record.output());
    for (key, value) in &record.attrs {
        if key == "name" {
            continue;
        }
        let source_key = mapping
            .attr_renames
            .iter()
            .find(|(_, to)| *to == key.as_str())
            .map(|(from, _)| *from)
            .unwrap_or(key.as_str());
        if let Some(attr) = value.to_attribute() {
            node = node.with_attr(source_key, attr);
        }
    }
    Ok(vec![node])
}
