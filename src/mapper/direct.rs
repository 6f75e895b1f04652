//! Direct op mapping table
//!
//! Source ops that translate 1:1 into a single Fluid layer. Each entry
//! declares the Fluid op, attribute renames and defaults, optional
//! input/output permutations, whether a `name` attribute is emitted and an
//! optional trailing cast of the output.

use indexmap::IndexMap;

use crate::error::{ConvertError, ConvertResult};
use crate::fluid::{Inputs, OperationRecord, Value};
use crate::graph::GraphNode;
use crate::tensor::DataType;

use super::context::MapContext;

/// One row of the direct mapping table
#[derive(Debug, Clone)]
pub struct DirectMapping {
    /// Source op type
    pub source: &'static str,
    /// Fluid layer
    pub fluid_op: &'static str,
    /// Source attribute → Fluid attribute; `""` or `"_"` drops it
    pub attr_renames: &'static [(&'static str, &'static str)],
    /// Fluid attribute defaults
    pub defaults: &'static [(&'static str, Value)],
    /// Reordering of source inputs
    pub input_perm: Option<&'static [usize]>,
    /// Reordering of source outputs
    pub output_perm: Option<&'static [usize]>,
    /// Emit a `name` attribute
    pub fill_name_field: bool,
    /// Cast the output to this dtype afterwards
    pub output_cast: Option<DataType>,
}

impl DirectMapping {
    const fn simple(source: &'static str, fluid_op: &'static str) -> Self {
        Self {
            source,
            fluid_op,
            attr_renames: &[],
            defaults: &[],
            input_perm: None,
            output_perm: None,
            fill_name_field: true,
            output_cast: None,
        }
    }

    const fn renames(mut self, renames: &'static [(&'static str, &'static str)]) -> Self {
        self.attr_renames = renames;
        self
    }

    const fn defaults(mut self, defaults: &'static [(&'static str, Value)]) -> Self {
        self.defaults = defaults;
        self
    }

    const fn unnamed(mut self) -> Self {
        self.fill_name_field = false;
        self
    }

    const fn cast_output(mut self, dtype: DataType) -> Self {
        self.output_cast = Some(dtype);
        self
    }
}

const REDUCE_RENAMES: &[(&str, &str)] = &[("axes", "dim"), ("keepdims", "keep_dim")];
const REDUCE_DEFAULTS: &[(&str, Value)] = &[("keep_dim", Value::Int(1))];
const CLIP_DEFAULTS: &[(&str, Value)] = &[
    ("min", Value::Float(-(f32::MAX as f64))),
    ("max", Value::Float(f32::MAX as f64)),
];
const LEAKY_RELU_DEFAULTS: &[(&str, Value)] = &[("alpha", Value::Float(0.01))];
const ELU_DEFAULTS: &[(&str, Value)] = &[("alpha", Value::Float(1.0))];
const THRESHOLDED_RELU_DEFAULTS: &[(&str, Value)] = &[("threshold", Value::Float(1.0))];
const HARD_SIGMOID_DEFAULTS: &[(&str, Value)] =
    &[("slope", Value::Float(0.2)), ("offset", Value::Float(0.5))];
const SOFTMAX_DEFAULTS: &[(&str, Value)] = &[("axis", Value::Int(1))];

/// The direct mapping table
pub static DIRECT_MAPPINGS: &[DirectMapping] = &[
    DirectMapping::simple("Shape", "shape")
        .unnamed()
        .cast_output(DataType::Int64),
    DirectMapping::simple("Clip", "clip").defaults(CLIP_DEFAULTS),
    DirectMapping::simple("Erf", "erf").unnamed(),
    DirectMapping::simple("Ceil", "ceil"),
    DirectMapping::simple("ReduceMean", "reduce_mean")
        .renames(REDUCE_RENAMES)
        .defaults(REDUCE_DEFAULTS),
    DirectMapping::simple("ReduceSum", "reduce_sum")
        .renames(REDUCE_RENAMES)
        .defaults(REDUCE_DEFAULTS),
    DirectMapping::simple("ReduceMin", "reduce_min")
        .renames(REDUCE_RENAMES)
        .defaults(REDUCE_DEFAULTS),
    DirectMapping::simple("ReduceMax", "reduce_max")
        .renames(REDUCE_RENAMES)
        .defaults(REDUCE_DEFAULTS),
    // activations
    DirectMapping::simple("Relu", "relu"),
    DirectMapping::simple("LeakyRelu", "leaky_relu").defaults(LEAKY_RELU_DEFAULTS),
    DirectMapping::simple("Elu", "elu").defaults(ELU_DEFAULTS),
    DirectMapping::simple("ThresholdedRelu", "thresholded_relu")
        .renames(&[("alpha", "threshold")])
        .defaults(THRESHOLDED_RELU_DEFAULTS),
    DirectMapping::simple("Tanh", "tanh"),
    DirectMapping::simple("Sigmoid", "sigmoid"),
    DirectMapping::simple("HardSigmoid", "hard_sigmoid")
        .renames(&[("alpha", "slope"), ("beta", "offset")])
        .defaults(HARD_SIGMOID_DEFAULTS),
    DirectMapping::simple("Softsign", "softsign"),
    DirectMapping::simple("Softplus", "softplus"),
    DirectMapping::simple("Exp", "exp"),
    DirectMapping::simple("Log", "log"),
    DirectMapping::simple("Reciprocal", "reciprocal"),
    DirectMapping::simple("Softmax", "softmax").defaults(SOFTMAX_DEFAULTS),
    DirectMapping::simple("Sqrt", "sqrt"),
    DirectMapping::simple("Floor", "floor"),
    DirectMapping::simple("Abs", "abs"),
];

/// Look up the table entry for a source op type
pub fn lookup(op_type: &str) -> Option<&'static DirectMapping> {
    DIRECT_MAPPINGS.iter().find(|m| m.source == op_type)
}

/// Check if an op type is directly mapped
pub fn is_directly_mapped(op_type: &str) -> bool {
    lookup(op_type).is_some()
}

fn permute<'a>(items: &'a [String], perm: Option<&[usize]>) -> Vec<&'a String> {
    match perm {
        Some(perm) => perm.iter().filter_map(|&i| items.get(i)).collect(),
        None => items.iter().collect(),
    }
}

/// Translate a directly mapped node into one Fluid record
///
/// The node must have exactly one non-empty input.
pub fn directly_map(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let mapping = lookup(&node.op_type).ok_or_else(|| {
        ConvertError::Internal(format!("no direct mapping for {}", node.op_type))
    })?;

    let inputs: Vec<&String> = permute(&node.inputs, mapping.input_perm)
        .into_iter()
        .filter(|i| !i.is_empty())
        .collect();
    if inputs.len() != 1 {
        return Err(ConvertError::unsupported(
            &node.name,
            format!(
                "{} is directly mapped and takes exactly one input, got {}",
                node.op_type,
                inputs.len()
            ),
        ));
    }
    let input = inputs[0];
    ctx.graph
        .get_producer(input)
        .ok_or_else(|| ConvertError::UnresolvedInput {
            node: node.name.clone(),
            input: input.clone(),
        })?;

    let outputs = permute(&node.outputs, mapping.output_perm);
    let output = outputs
        .first()
        .map(|s| s.as_str())
        .unwrap_or(node.name.as_str());

    let mut attrs: IndexMap<String, Value> = mapping
        .defaults
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    for (key, value) in &node.attributes {
        let renamed = mapping
            .attr_renames
            .iter()
            .find(|(from, _)| *from == key.as_str())
            .map(|(_, to)| *to)
            .unwrap_or(key.as_str());
        if renamed.is_empty() || renamed == "_" {
            continue;
        }
        attrs.insert(renamed.to_string(), Value::from(value));
    }

    let mut record = OperationRecord::new(mapping.fluid_op, Inputs::var(input.as_str()), output);
    record.attrs = attrs;
    if mapping.fill_name_field {
        record = record.named(&node.name);
    }
    ctx.emit(record);

    if let Some(dtype) = mapping.output_cast {
        ctx.emit(OperationRecord::new("cast", Inputs::var(output), output).attr("dtype", dtype));
    }

    Ok(())
}
