//! Recurrent layers
//!
//! `GRU` and `LSTM` lower onto `dynamic_gru` / `dynamic_lstm`. Fluid runs
//! those over LoD sequences, so the time-major ONNX input is made
//! batch-major, projected through `W` with a single `mul`, and given a
//! uniform LoD of `seq_len` steps per batch entry. The recurrence weight is
//! rearranged into Fluid's `[hidden, gates * hidden]` layout and registered
//! as a parameter; the ONNX `R` node itself is dropped.

use ndarray::{s, Axis, Ix2, Ix3};

use crate::error::{ConvertError, ConvertResult};
use crate::fluid::{Inputs, Operand, OperationRecord, Value};
use crate::graph::GraphNode;
use crate::tensor::{DataType, Tensor};

use super::context::MapContext;
use super::gather::{gather_record, transpose_record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    Gru,
    Lstm,
}

impl Cell {
    fn gates(self) -> usize {
        match self {
            Cell::Gru => 3,
            Cell::Lstm => 4,
        }
    }

    fn op(self) -> &'static str {
        match self {
            Cell::Gru => "dynamic_gru",
            Cell::Lstm => "dynamic_lstm",
        }
    }

    /// Suffixes of the projected input and input weight
    fn projection_suffixes(self) -> (&'static str, &'static str) {
        match self {
            Cell::Gru => ("_x0", "_w0"),
            Cell::Lstm => ("_x_reshape", "_w_reshape"),
        }
    }

    /// Fluid activation attribute keys paired with ONNX defaults
    fn activations(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Cell::Gru => &[("gate_activation", "sigmoid"), ("candidate_activation", "tanh")],
            Cell::Lstm => &[
                ("gate_activation", "sigmoid"),
                ("cell_activation", "tanh"),
                ("candidate_activation", "tanh"),
            ],
        }
    }

    /// `size` argument of the Fluid layer
    fn size(self, hidden: i64) -> i64 {
        match self {
            Cell::Gru => hidden,
            Cell::Lstm => hidden * 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Reverse,
    Bidirectional,
}

impl Direction {
    fn parse(node: &GraphNode) -> ConvertResult<Self> {
        let direction: String = node.attr_or("direction", "forward".to_string())?;
        match direction.as_str() {
            "forward" => Ok(Direction::Forward),
            "reverse" => Ok(Direction::Reverse),
            "bidirectional" => Ok(Direction::Bidirectional),
            other => Err(ConvertError::unsupported(
                &node.name,
                format!("direction `{}`", other),
            )),
        }
    }

    fn count(self) -> i64 {
        match self {
            Direction::Bidirectional => 2,
            _ => 1,
        }
    }
}

/// Everything the lowering needs after validation
struct Recurrent<'a> {
    node: &'a GraphNode,
    cell: Cell,
    direction: Direction,
    hidden: i64,
    seq_len: i64,
    batch: i64,
    activations: Vec<(&'static str, String)>,
}

impl Recurrent<'_> {
    fn var(&self, suffix: &str) -> String {
        format!("{}{}", self.node.name, suffix)
    }

    fn gate_width(&self) -> i64 {
        self.hidden * self.cell.gates() as i64
    }

    /// Uniform LoD: `seq_len` steps for every batch entry
    fn target_lod(&self) -> Vec<i64> {
        (0..=self.batch).map(|i| self.seq_len * i).collect()
    }

    fn lod_reset(&self, var: &str) -> OperationRecord {
        OperationRecord::new("lod_reset", Inputs::var(var), var).attr("target_lod", self.target_lod())
    }

    fn layer(
        &self,
        input: &str,
        outputs: Vec<String>,
        is_reverse: bool,
        param: &str,
        bias: Option<&str>,
    ) -> OperationRecord {
        let inputs = Inputs::list([
            Operand::from(input),
            Operand::from(Value::Int(self.cell.size(self.hidden))),
        ]);
        let mut record = OperationRecord::with_outputs(self.cell.op(), inputs, outputs)
            .attr("is_reverse", is_reverse);
        for (key, activation) in &self.activations {
            record = record.attr(key, Value::str(activation.as_str()));
        }
        record = record
            .attr("param_attr", Value::str(param))
            .attr("bias_attr", bias.map(Value::str).unwrap_or(Value::Bool(false)));
        match self.cell {
            Cell::Gru => record.attr("origin_mode", true),
            Cell::Lstm => record.attr("use_peepholes", false),
        }
    }

    /// Outputs of one Fluid layer call: the hidden sequence, plus the cell
    /// sequence for LSTM
    fn layer_outputs(&self, hidden: &str, cell: &str) -> Vec<String> {
        match self.cell {
            Cell::Gru => vec![hidden.to_string()],
            Cell::Lstm => vec![hidden.to_string(), cell.to_string()],
        }
    }
}

/// `GRU` → `dynamic_gru`
pub fn gru(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let linear_before_reset: i64 = node.attr_or("linear_before_reset", 0)?;
    if linear_before_reset != 0 {
        return Err(ConvertError::unsupported(
            &node.name,
            "only linear_before_reset = 0 is supported",
        ));
    }
    recurrent(node, Cell::Gru, ctx)
}

/// `LSTM` → `dynamic_lstm` without peepholes
pub fn lstm(node: &GraphNode, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    let input_forget: i64 = node.attr_or("input_forget", 0)?;
    if input_forget != 0 {
        return Err(ConvertError::unsupported(
            &node.name,
            "only input_forget = 0 is supported",
        ));
    }
    if node.has_input(7) {
        return Err(ConvertError::unsupported(&node.name, "peephole weights are not supported"));
    }
    recurrent(node, Cell::Lstm, ctx)
}

fn hidden_size(
    node: &GraphNode,
    cell: Cell,
    w: &GraphNode,
    r: &GraphNode,
    b: Option<&GraphNode>,
    h0: Option<&GraphNode>,
) -> ConvertResult<i64> {
    if let Some(hidden) = node.attr_opt::<i64>("hidden_size")? {
        return Ok(hidden);
    }
    let gates = cell.gates() as i64;
    let last = |n: &GraphNode| n.shape().and_then(|s| s.last().copied());
    let second_last = |n: &GraphNode| n.shape().and_then(|s| s.iter().rev().nth(1).copied());

    last(r)
        .or_else(|| second_last(w).map(|d| d / gates))
        .or_else(|| b.and_then(last).map(|d| d / (2 * gates)))
        .or_else(|| h0.and_then(last))
        .ok_or_else(|| ConvertError::MissingAttribute {
            node: node.name.clone(),
            attr: "hidden_size".to_string(),
        })
}

fn activations(node: &GraphNode, cell: Cell) -> ConvertResult<Vec<(&'static str, String)>> {
    let keys = cell.activations();
    let given: Vec<String> = node
        .attr_or(
            "activations",
            keys.iter().map(|(_, default)| default.to_string()).collect(),
        )?;
    if given.len() < keys.len() {
        return Err(ConvertError::unsupported(
            &node.name,
            format!("expected {} activations, got {}", keys.len(), given.len()),
        ));
    }
    Ok(keys
        .iter()
        .zip(given)
        .map(|((key, _), activation)| (*key, activation.to_lowercase()))
        .collect())
}

/// Rearrange direction `dir` of `R` (`[dirs, gates * H, H]`) into Fluid's
/// `[H, gates * H]` layout: the first two gates and the remaining gates are
/// each transposed and flattened, then laid out back to back.
fn regroup_recurrence(r: &Tensor, dir: usize, hidden: usize, gates: usize) -> ConvertResult<Tensor> {
    let r = r.to_f32_array().into_dimensionality::<Ix3>()?;
    let weight = r.index_axis(Axis(0), dir);
    let split = 2 * hidden;

    let mut data: Vec<f32> = weight.slice(s![..split, ..]).t().iter().copied().collect();
    data.extend(weight.slice(s![split.., ..]).t().iter().copied());
    Tensor::from_f32(&[hidden, gates * hidden], data)
}

/// Plain row-major reshape of a unidirectional `R` into `[H, gates * H]`
fn reshape_recurrence(r: &Tensor, hidden: usize, gates: usize) -> ConvertResult<Tensor> {
    r.reshape(&[hidden, gates * hidden])
}

/// Recurrent half of `B` (`[dirs, 2 * gates * H]`) for direction `dir`
fn recurrent_bias(b: &Tensor, dir: usize, width: usize) -> ConvertResult<Tensor> {
    let b = b.to_f32_array().into_dimensionality::<Ix2>()?;
    let data: Vec<f32> = b.slice(s![dir..dir + 1, width..2 * width]).iter().copied().collect();
    Tensor::from_f32(&[1, width], data)
}

fn recurrent(node: &GraphNode, cell: Cell, ctx: &mut MapContext<'_>) -> ConvertResult<()> {
    if node.has_attr("clip") {
        return Err(ConvertError::unsupported(&node.name, "clipping is not supported"));
    }

    let x = ctx.input(node, 0)?;
    let w = ctx.input(node, 1)?;
    let r = ctx.input(node, 2)?;
    let b = ctx.optional_input(node, 3)?;
    let h0 = ctx.optional_input(node, 5)?;
    if node.has_input(4) {
        log::warn!("sequence_lens of `{}` is ignored", node.name);
    }
    if h0.is_some() {
        log::warn!("initial hidden state of `{}` is ignored", node.name);
    }
    if cell == Cell::Lstm && node.has_input(6) {
        log::warn!("initial cell state of `{}` is ignored", node.name);
    }

    let r_value = r.constant_value().ok_or_else(|| {
        ConvertError::unsupported(&node.name, "recurrence weight must be constant")
    })?;
    let b_value = match &b {
        Some(b) => Some(b.constant_value().ok_or_else(|| {
            ConvertError::unsupported(&node.name, "bias must be constant")
        })?),
        None => None,
    };

    let x_shape = x.known_shape()?.to_vec();
    let w_shape = w.known_shape()?.to_vec();
    if x_shape.len() != 3 || w_shape.len() != 3 {
        return Err(ConvertError::unsupported(
            &node.name,
            format!("expected rank-3 X and W, got {:?} and {:?}", x_shape, w_shape),
        ));
    }

    let rnn = Recurrent {
        node,
        cell,
        direction: Direction::parse(node)?,
        hidden: hidden_size(node, cell, &w, &r, b.as_ref(), h0.as_ref())?,
        seq_len: x_shape[0],
        batch: x_shape[1],
        activations: activations(node, cell)?,
    };
    let gate_width = rnn.gate_width();
    let dirs = rnn.direction.count();

    // X [T, B, I] → [B * T, I]; W [D, G*H, I] → [I, D*G*H]
    let (x_suffix, w_suffix) = cell.projection_suffixes();
    let x0 = rnn.var(x_suffix);
    let w0 = rnn.var(w_suffix);
    ctx.emit(transpose_record(&x.name, vec![1, 0, 2], &x0));
    ctx.emit(
        OperationRecord::new("reshape", Inputs::var(x0.as_str()), x0.as_str())
            .attr("shape", vec![x_shape[1] * x_shape[0], x_shape[2]]),
    );
    ctx.emit(
        OperationRecord::new("reshape", Inputs::var(w.name.as_str()), w0.as_str())
            .attr("shape", vec![w_shape[0] * w_shape[1], w_shape[2]])
            .named(&w0),
    );
    ctx.emit(transpose_record(&w0, vec![1, 0], &w0));
    ctx.omit_input(node, 1);
    ctx.omit_input(node, 2);

    let fc = rnn.var("_fc");
    let mm = if b.is_some() { rnn.var("_mm") } else { fc.clone() };
    ctx.emit(OperationRecord::new(
        "mul",
        Inputs::kw([("x", x0.as_str()), ("y", w0.as_str())]),
        mm.as_str(),
    ));

    if let Some(b) = &b {
        let bi = rnn.var("_bi");
        let bh = rnn.var("_bh");
        let bi0 = rnn.var("_bi0");
        ctx.emit(
            OperationRecord::with_outputs("split", Inputs::var(b.name.as_str()), [bi.as_str(), bh.as_str()])
                .attr("dim", 1i64)
                .attr("num_or_sections", vec![gate_width, gate_width]),
        );
        ctx.emit(
            OperationRecord::new("reshape", Inputs::var(bi.as_str()), bi0.as_str())
                .attr("shape", vec![gate_width * dirs])
                .named(&bi0),
        );
        ctx.emit(
            OperationRecord::new(
                "elementwise_add",
                Inputs::kw([("x", mm.as_str()), ("y", bi0.as_str())]),
                fc.as_str(),
            )
            .attr("axis", 1i64),
        );
    }

    match rnn.direction {
        Direction::Bidirectional => bidirectional(&rnn, &fc, &r_value, b_value.as_ref(), ctx),
        Direction::Forward | Direction::Reverse => {
            unidirectional(&rnn, &fc, &r, &r_value, b_value.as_ref(), ctx)
        }
    }
}

fn bidirectional(
    rnn: &Recurrent<'_>,
    fc: &str,
    r_value: &Tensor,
    b_value: Option<&Tensor>,
    ctx: &mut MapContext<'_>,
) -> ConvertResult<()> {
    let hidden = rnn.hidden as usize;
    let gates = rnn.cell.gates();
    let gate_width = rnn.gate_width();

    let ipt = [rnn.var("_ipt_forward"), rnn.var("_ipt_backward")];
    ctx.emit(
        OperationRecord::with_outputs("split", Inputs::var(fc), ipt.iter().map(String::as_str))
            .attr("dim", 1i64)
            .attr("num_or_sections", vec![gate_width, gate_width]),
    );

    let mut ys = Vec::with_capacity(2);
    let mut cells = Vec::with_capacity(2);
    for (dir, tag) in ["forward", "backward"].into_iter().enumerate() {
        let param = rnn.var(&format!("_r_{}", tag));
        ctx.register_weight(param.as_str(), regroup_recurrence(r_value, dir, hidden, gates)?);

        let bias = match b_value {
            Some(b) => {
                let name = rnn.var(&format!("_b_{}", tag));
                ctx.register_weight(name.as_str(), recurrent_bias(b, dir, gate_width as usize)?);
                Some(name)
            }
            None => None,
        };

        let y = rnn.var(&format!("_y_{}", tag));
        let c = rnn.var(&format!("_cell_{}", tag));
        ctx.emit(rnn.lod_reset(&ipt[dir]));
        ctx.emit(rnn.layer(
            &ipt[dir],
            rnn.layer_outputs(&y, &c),
            dir == 1,
            &param,
            bias.as_deref(),
        ));
        ys.push(y);
        cells.push(c);
    }

    // [B*T, H] per direction → [T, D, B, H]
    let per_step = vec![rnn.batch, 1, rnn.seq_len, rnn.hidden];
    for y in &ys {
        ctx.emit(
            OperationRecord::new("reshape", Inputs::var(y.as_str()), y.as_str())
                .attr("shape", per_step.clone()),
        );
    }
    let stacked = rnn.var(&format!("_{}", rnn.cell.op()));
    ctx.emit(
        OperationRecord::new("concat", Inputs::list(ys.iter()), stacked.as_str()).attr("axis", 1i64),
    );
    ctx.emit(transpose_record(&stacked, vec![2, 1, 0, 3], rnn.node.output()));

    if rnn.node.has_output(1) {
        last_state_bidirectional(rnn, &ys, "hidden", &rnn.node.outputs[1], ctx);
    }
    if rnn.cell == Cell::Lstm && rnn.node.has_output(2) {
        for c in &cells {
            ctx.emit(
                OperationRecord::new("reshape", Inputs::var(c.as_str()), c.as_str())
                    .attr("shape", per_step.clone()),
            );
        }
        last_state_bidirectional(rnn, &cells, "cell", &rnn.node.outputs[2], ctx);
    }
    Ok(())
}

/// Last step of each direction, stacked into `[2, B, H]`. The forward pass
/// ends at step `T - 1`, the backward pass at step 0.
fn last_state_bidirectional(
    rnn: &Recurrent<'_>,
    seqs: &[String],
    kind: &str,
    output: &str,
    ctx: &mut MapContext<'_>,
) {
    let mut lasts = Vec::with_capacity(seqs.len());
    for (seq, (tag, step)) in seqs.iter().zip([("forward", rnn.seq_len - 1), ("backward", 0)]) {
        ctx.emit(transpose_record(seq, vec![2, 1, 0, 3], seq));
        let index = rnn.var(&format!("_{}_gather_index_{}", kind, tag));
        ctx.emit(gather_index(&index, step));
        let last = rnn.var(&format!("_last_{}_{}", kind, tag));
        ctx.emit(gather_record(seq, &index, &last));
        lasts.push(last);
    }
    ctx.emit(OperationRecord::new("concat", Inputs::list(lasts), output).attr("axis", 1i64));
    ctx.emit(
        OperationRecord::new("squeeze", Inputs::var(output), output).attr("axes", vec![0i64]),
    );
}

fn unidirectional(
    rnn: &Recurrent<'_>,
    fc: &str,
    r: &GraphNode,
    r_value: &Tensor,
    b_value: Option<&Tensor>,
    ctx: &mut MapContext<'_>,
) -> ConvertResult<()> {
    let hidden = rnn.hidden as usize;
    let gates = rnn.cell.gates();
    let is_reverse = rnn.direction == Direction::Reverse;

    let param = format!("{}_reshaped", r.name);
    let weight = match rnn.cell {
        Cell::Gru => regroup_recurrence(r_value, 0, hidden, gates)?,
        Cell::Lstm => reshape_recurrence(r_value, hidden, gates)?,
    };
    ctx.register_weight(param.as_str(), weight);

    let bias = match b_value {
        Some(b) => {
            let name = rnn.var("_bh");
            ctx.register_weight(name.as_str(), recurrent_bias(b, 0, rnn.gate_width() as usize)?);
            Some(name)
        }
        None => None,
    };

    let y = rnn.var(&format!("_{}", rnn.cell.op()));
    let c = rnn.var(&format!("_{}_cell", rnn.cell.op()));
    ctx.emit(rnn.lod_reset(fc));
    ctx.emit(rnn.layer(fc, rnn.layer_outputs(&y, &c), is_reverse, &param, bias.as_deref()));

    // [B*T, H] → [T, B, H]
    let to_time_major = |seq: &str, ctx: &mut MapContext<'_>| {
        ctx.emit(
            OperationRecord::new("reshape", Inputs::var(seq), seq)
                .attr("shape", vec![rnn.batch, rnn.seq_len, rnn.hidden]),
        );
        ctx.emit(transpose_record(seq, vec![1, 0, 2], seq));
    };
    to_time_major(y.as_str(), ctx);
    ctx.emit(
        OperationRecord::new("unsqueeze", Inputs::var(y.as_str()), rnn.node.output())
            .attr("axes", vec![1i64]),
    );
    if rnn.cell == Cell::Lstm {
        to_time_major(c.as_str(), ctx);
    }

    let last_step = if is_reverse { 0 } else { rnn.seq_len - 1 };
    if rnn.node.has_output(1) {
        let index = rnn.var("_hidden_gather_index");
        ctx.emit(gather_index(&index, last_step));
        ctx.emit(gather_record(&y, &index, &rnn.node.outputs[1]));
    }
    if rnn.cell == Cell::Lstm && rnn.node.has_output(2) {
        let index = rnn.var("_cell_gather_index");
        ctx.emit(gather_index(&index, last_step));
        ctx.emit(gather_record(&c, &index, &rnn.node.outputs[2]));
    }
    Ok(())
}

fn gather_index(output: &str, step: i64) -> OperationRecord {
    OperationRecord::new("fill_constant", Inputs::None, output)
        .attr("shape", vec![1i64])
        .attr("dtype", DataType::Int32)
        .attr("value", step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::test_util::translate;

    const T: i64 = 2;
    const B: i64 = 1;
    const I: i64 = 3;

    fn iota(shape: &[usize]) -> Tensor {
        let len: usize = shape.iter().product();
        Tensor::from_f32(shape, (0..len).map(|v| v as f32).collect()).unwrap()
    }

    fn rnn_nodes(op: GraphNode, gates: usize, hidden: usize, dirs: usize, bias: bool) -> Vec<GraphNode> {
        let mut nodes = vec![
            GraphNode::input("x", DataType::Float32, &[T, B, I]),
            GraphNode::data("W", iota(&[dirs, gates * hidden, I as usize])),
            GraphNode::data("R", iota(&[dirs, gates * hidden, hidden])),
        ];
        if bias {
            nodes.push(GraphNode::data("B", iota(&[dirs, 2 * gates * hidden])));
        }
        nodes.push(op);
        nodes
    }

    #[test]
    fn test_bidirectional_gru_registers_regrouped_weights() {
        let op = GraphNode::op("GRU", "gru_0", &["x", "W", "R", "B"], &["y", "y_h"])
            .with_attr("direction", "bidirectional")
            .with_attr("hidden_size", 2i64);
        let out = translate(rnn_nodes(op, 3, 2, 2, true), "gru_0", gru).unwrap();

        let forward = out.weights.get("gru_0_r_forward").unwrap();
        assert_eq!(forward.shape(), vec![2, 6]);
        assert_eq!(
            forward.to_f64_vec(),
            vec![0.0, 2.0, 4.0, 6.0, 1.0, 3.0, 5.0, 7.0, 8.0, 10.0, 9.0, 11.0]
        );
        assert_eq!(out.weights.get("gru_0_r_backward").unwrap().shape(), vec![2, 6]);

        let bias = out.weights.get("gru_0_b_backward").unwrap();
        assert_eq!(bias.shape(), vec![1, 6]);
        assert_eq!(bias.to_f64_vec()[0], 18.0);

        assert!(out.omitted.contains("W"));
        assert!(out.omitted.contains("R"));
        assert!(!out.omitted.contains("B"));

        let layers: Vec<_> = out.records.iter().filter(|r| r.op == "dynamic_gru").collect();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[1].get_attr("is_reverse"), Some(&Value::Bool(true)));
        assert_eq!(layers[1].get_attr("param_attr"), Some(&Value::str("gru_0_r_backward")));
        assert_eq!(layers[0].get_attr("origin_mode"), Some(&Value::Bool(true)));

        let output = out.records.iter().find(|r| r.output() == "y").unwrap();
        assert_eq!(output.get_attr("perm"), Some(&Value::Ints(vec![2, 1, 0, 3])));
        assert_eq!(out.records.last().unwrap().op, "squeeze");
    }

    #[test]
    fn test_bidirectional_lstm_weight_layout() {
        let op = GraphNode::op("LSTM", "lstm_0", &["x", "W", "R"], &["y"])
            .with_attr("direction", "bidirectional");
        let out = translate(rnn_nodes(op, 4, 1, 2, false), "lstm_0", lstm).unwrap();

        assert_eq!(out.weights.get("lstm_0_r_forward").unwrap().shape(), vec![1, 4]);
        assert_eq!(out.weights.get("lstm_0_r_backward").unwrap().shape(), vec![1, 4]);

        let layer = out.records.iter().find(|r| r.op == "dynamic_lstm").unwrap();
        assert_eq!(layer.outputs, vec!["lstm_0_y_forward", "lstm_0_cell_forward"]);
        assert_eq!(layer.get_attr("bias_attr"), Some(&Value::Bool(false)));
        assert_eq!(layer.get_attr("use_peepholes"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_unidirectional_gru_lowering() {
        let op = GraphNode::op("GRU", "gru_0", &["x", "W", "R"], &["y"]).with_attr("hidden_size", 2i64);
        let out = translate(rnn_nodes(op, 3, 2, 1, false), "gru_0", gru).unwrap();

        assert_eq!(
            out.ops(),
            vec![
                "transpose",
                "reshape",
                "reshape",
                "transpose",
                "mul",
                "lod_reset",
                "dynamic_gru",
                "reshape",
                "transpose",
                "unsqueeze"
            ]
        );
        assert_eq!(out.records[4].output(), "gru_0_fc");
        assert_eq!(out.records[5].get_attr("target_lod"), Some(&Value::Ints(vec![0, 2])));
        assert_eq!(out.weights.get("R_reshaped").unwrap().shape(), vec![2, 6]);
        assert_eq!(out.records.last().unwrap().output(), "y");
    }

    #[test]
    fn test_unidirectional_lstm_with_bias_and_states() {
        let op = GraphNode::op("LSTM", "lstm_0", &["x", "W", "R", "B"], &["y", "y_h", "y_c"])
            .with_attr("hidden_size", 1i64)
            .with_attr("activations", vec!["Sigmoid".to_string(), "Tanh".to_string(), "Relu".to_string()]);
        let out = translate(rnn_nodes(op, 4, 1, 1, true), "lstm_0", lstm).unwrap();

        assert_eq!(out.records[4].output(), "lstm_0_mm");
        let bias = out.weights.get("lstm_0_bh").unwrap();
        assert_eq!(bias.to_f64_vec(), vec![4.0, 5.0, 6.0, 7.0]);
        assert_eq!(out.weights.get("R_reshaped").unwrap().shape(), vec![1, 4]);

        let layer = out.records.iter().find(|r| r.op == "dynamic_lstm").unwrap();
        assert_eq!(layer.get_attr("candidate_activation"), Some(&Value::str("relu")));
        assert_eq!(layer.get_attr("bias_attr"), Some(&Value::str("lstm_0_bh")));

        let cell = out.records.iter().find(|r| r.output() == "y_c").unwrap();
        assert_eq!(cell.op, "gather");
        assert_eq!(cell.inputs.vars(), vec!["lstm_0_dynamic_lstm_cell", "lstm_0_cell_gather_index"]);
    }

    #[test]
    fn test_reverse_last_hidden_uses_first_step() {
        let op = GraphNode::op("GRU", "gru_0", &["x", "W", "R"], &["y", "y_h"])
            .with_attr("hidden_size", 2i64)
            .with_attr("direction", "reverse");
        let out = translate(rnn_nodes(op, 3, 2, 1, false), "gru_0", gru).unwrap();

        let index = out
            .records
            .iter()
            .find(|r| r.output() == "gru_0_hidden_gather_index")
            .unwrap();
        assert_eq!(index.get_attr("value"), Some(&Value::Int(0)));
    }

    #[test]
    fn test_hidden_size_inferred_from_recurrence() {
        let op = GraphNode::op("GRU", "gru_0", &["x", "W", "R"], &["y"]);
        let out = translate(rnn_nodes(op, 3, 4, 1, false), "gru_0", gru).unwrap();
        let layer = out.records.iter().find(|r| r.op == "dynamic_gru").unwrap();
        assert_eq!(
            layer.inputs,
            Inputs::List(vec![Operand::from("gru_0_fc"), Operand::from(Value::Int(4))])
        );
    }

    #[test]
    fn test_clip_rejected() {
        let op = GraphNode::op("GRU", "gru_0", &["x", "W", "R"], &["y"]).with_attr("clip", 1.0f32);
        let err = translate(rnn_nodes(op, 3, 2, 1, false), "gru_0", gru).err().unwrap();
        assert!(matches!(err, ConvertError::UnsupportedConfiguration { .. }));
    }

    #[test]
    fn test_lstm_peepholes_rejected() {
        let mut nodes = rnn_nodes(
            GraphNode::op("LSTM", "lstm_0", &["x", "W", "R", "", "", "", "", "P"], &["y"]),
            4,
            1,
            1,
            false,
        );
        nodes.insert(0, GraphNode::data("P", iota(&[1, 3])));
        let err = translate(nodes, "lstm_0", lstm).err().unwrap();
        assert!(matches!(err, ConvertError::UnsupportedConfiguration { .. }));
    }
}
