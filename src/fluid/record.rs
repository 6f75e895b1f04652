//! Operation records
//!
//! The unit of translation output: one Fluid layer call.

use indexmap::IndexMap;
use serde::Serialize;

use super::value::Value;

/// One input operand
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Operand {
    /// Program variable
    Var(String),
    /// Inline literal
    Literal(Value),
}

impl From<&str> for Operand {
    fn from(v: &str) -> Self {
        Operand::Var(v.to_string())
    }
}

impl From<String> for Operand {
    fn from(v: String) -> Self {
        Operand::Var(v)
    }
}

impl From<&String> for Operand {
    fn from(v: &String) -> Self {
        Operand::Var(v.clone())
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Literal(v)
    }
}

/// Inputs of a record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Inputs {
    /// No inputs (`data`, `fill_constant`, `create_parameter`, ...)
    None,
    /// Positional operands
    List(Vec<Operand>),
    /// Keyword operands in call order
    Keyword(IndexMap<String, Operand>),
}

impl Inputs {
    /// Single positional variable
    pub fn var(name: impl Into<String>) -> Self {
        Inputs::List(vec![Operand::Var(name.into())])
    }

    /// Positional operands
    pub fn list<I, O>(operands: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Operand>,
    {
        Inputs::List(operands.into_iter().map(Into::into).collect())
    }

    /// Keyword operands
    pub fn kw<I, K, O>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, O)>,
        K: Into<String>,
        O: Into<Operand>,
    {
        Inputs::Keyword(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Variables referenced by the inputs, in order
    pub fn vars(&self) -> Vec<&str> {
        let operands: Vec<&Operand> = match self {
            Inputs::None => Vec::new(),
            Inputs::List(list) => list.iter().collect(),
            Inputs::Keyword(map) => map.values().collect(),
        };
        operands
            .into_iter()
            .filter_map(|o| match o {
                Operand::Var(v) => Some(v.as_str()),
                Operand::Literal(_) => None,
            })
            .collect()
    }

    /// Keyword operand by name
    pub fn get(&self, key: &str) -> Option<&Operand> {
        match self {
            Inputs::Keyword(map) => map.get(key),
            _ => None,
        }
    }
}

/// One emitted Fluid operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationRecord {
    /// Fluid layer name (`conv2d`, `elementwise_add`, ...)
    pub op: String,
    /// Inputs
    pub inputs: Inputs,
    /// Output variables, primary first
    pub outputs: Vec<String>,
    /// Layer attributes in emission order
    pub attrs: IndexMap<String, Value>,
    /// Generated custom layer rather than a native Fluid op
    pub is_custom_layer: bool,
}

impl OperationRecord {
    /// Create a record with a single output
    pub fn new(op: &str, inputs: Inputs, output: impl Into<String>) -> Self {
        Self {
            op: op.to_string(),
            inputs,
            outputs: vec![output.into()],
            attrs: IndexMap::new(),
            is_custom_layer: false,
        }
    }

    /// Create a record with several outputs
    pub fn with_outputs<I, S>(op: &str, inputs: Inputs, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            op: op.to_string(),
            inputs,
            outputs: outputs.into_iter().map(Into::into).collect(),
            attrs: IndexMap::new(),
            is_custom_layer: false,
        }
    }

    /// Add an attribute (builder style)
    pub fn attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    /// Add a `name` attribute (builder style)
    pub fn named(self, name: &str) -> Self {
        self.attr("name", Value::str(name))
    }

    /// Primary output
    pub fn output(&self) -> &str {
        self.outputs.first().map(String::as_str).unwrap_or_default()
    }

    /// Attribute by key
    pub fn get_attr(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// Render as one line of Fluid program text
    pub fn render(&self) -> String {
        let mut args: Vec<String> = match &self.inputs {
            Inputs::None => Vec::new(),
            Inputs::List(list) if list.len() > 1 && self.op == "concat" => {
                vec![format!(
                    "[{}]",
                    list.iter().map(render_operand).collect::<Vec<_>>().join(", ")
                )]
            }
            Inputs::List(list) => list.iter().map(render_operand).collect(),
            Inputs::Keyword(map) => map
                .iter()
                .map(|(k, v)| format!("{}={}", k, render_operand(v)))
                .collect(),
        };
        args.extend(self.attrs.iter().map(|(k, v)| format!("{}={}", k, v.render())));

        let prefix = if self.is_custom_layer { "" } else { "fluid.layers." };
        format!(
            "{} = {}{}({})",
            self.outputs.join(", "),
            prefix,
            self.op,
            args.join(", ")
        )
    }
}

fn render_operand(operand: &Operand) -> String {
    match operand {
        Operand::Var(v) => v.clone(),
        Operand::Literal(value) => value.render(),
    }
}
