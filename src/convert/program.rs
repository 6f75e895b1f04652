//! Conversion output

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{ConvertError, ConvertResult};
use crate::fluid::OperationRecord;
use crate::tensor::{DataType, Tensor};

/// Conversion statistics
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertStats {
    /// Source nodes visited
    pub nodes: usize,
    /// Records in the assembled program
    pub records: usize,
    /// Records dropped because their node was folded into a consumer
    pub records_dropped: usize,
    /// Registered parameters
    pub weights: usize,
    /// Nodes folded into consumers
    pub omitted_nodes: usize,
}

/// Name, dtype and shape of one parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeightInfo {
    /// Parameter name
    pub name: String,
    /// Element type
    pub dtype: DataType,
    /// Dimensions
    pub shape: Vec<i64>,
}

/// A translated Fluid program
#[derive(Debug, Clone)]
pub struct ConvertedProgram {
    /// Records in emission order
    pub records: Vec<OperationRecord>,
    /// Materialized parameters
    pub weights: IndexMap<String, Tensor>,
    /// Graph input names
    pub inputs: Vec<String>,
    /// Graph output names
    pub outputs: Vec<String>,
    /// Custom layer sources used by the program, keyed by op type
    pub custom_layers: IndexMap<String, String>,
    /// Shapes of the graph inputs, in declaration order
    pub input_shapes: Vec<Vec<i64>>,
    /// Opset version whose translators were used
    pub opset_version: i64,
    /// Run statistics
    pub stats: ConvertStats,
}

#[derive(Serialize)]
struct ProgramJson<'a> {
    opset_version: i64,
    inputs: &'a [String],
    outputs: &'a [String],
    input_shapes: &'a [Vec<i64>],
    records: &'a [OperationRecord],
    weights: Vec<WeightInfo>,
    custom_layers: Vec<&'a str>,
}

impl ConvertedProgram {
    /// Parameter summaries in registration order
    pub fn weight_infos(&self) -> Vec<WeightInfo> {
        self.weights
            .iter()
            .map(|(name, tensor)| WeightInfo {
                name: name.clone(),
                dtype: tensor.dtype(),
                shape: tensor.shape(),
            })
            .collect()
    }

    /// Records of one Fluid op
    pub fn records_of<'a>(&'a self, op: &'a str) -> impl Iterator<Item = &'a OperationRecord> + 'a {
        self.records.iter().filter(move |r| r.op == op)
    }

    /// Render the program body, one layer call per line
    ///
    /// Custom layer sources come first so the calls below can resolve them.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for source in self.custom_layers.values() {
            out.push_str(source.trim_end());
            out.push_str("\n\n");
        }
        for record in &self.records {
            out.push_str(&record.render());
            out.push('\n');
        }
        out
    }

    /// Serialize the program structure (records and parameter summaries)
    pub fn to_json(&self) -> ConvertResult<String> {
        let json = ProgramJson {
            opset_version: self.opset_version,
            inputs: &self.inputs,
            outputs: &self.outputs,
            input_shapes: &self.input_shapes,
            records: &self.records,
            weights: self.weight_infos(),
            custom_layers: self.custom_layers.keys().map(String::as_str).collect(),
        };
        serde_json::to_string_pretty(&json).map_err(|e| ConvertError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::Inputs;

    fn program() -> ConvertedProgram {
        let mut weights = IndexMap::new();
        weights.insert(
            "w".to_string(),
            Tensor::from_f32(&[2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap(),
        );
        ConvertedProgram {
            records: vec![
                OperationRecord::new("relu", Inputs::var("x"), "y"),
                OperationRecord::new("sigmoid", Inputs::var("y"), "z"),
            ],
            weights,
            inputs: vec!["x".to_string()],
            outputs: vec!["z".to_string()],
            custom_layers: IndexMap::new(),
            input_shapes: vec![vec![1, 4]],
            opset_version: 9,
            stats: ConvertStats::default(),
        }
    }

    #[test]
    fn test_render_lines() {
        let rendered = program().render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("y = fluid.layers.relu("));
    }

    #[test]
    fn test_json_summarizes_weights() {
        let json = program().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["weights"][0]["name"], "w");
        assert_eq!(value["weights"][0]["shape"], serde_json::json!([2, 2]));
        assert_eq!(value["records"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_records_of() {
        let program = program();
        assert_eq!(program.records_of("relu").count(), 1);
        assert_eq!(program.records_of("conv2d").count(), 0);
    }
}
