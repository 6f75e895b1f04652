//! Error types for fluid-converter
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Main error type for graph conversion
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Required attribute absent and no default supplied
    #[error("Missing attribute `{attr}` on node {node}")]
    MissingAttribute {
        /// Node name
        node: String,
        /// Attribute name
        attr: String,
    },

    /// Attribute present but not convertible to the requested type
    #[error("Attribute `{attr}` on node {node} is not a {expected}")]
    AttributeType {
        /// Node name
        node: String,
        /// Attribute name
        attr: String,
        /// Expected semantic type
        expected: &'static str,
    },

    /// Spatial rank outside the supported range
    #[error("Unsupported rank {rank} for {op_type}, expected {min}..={max}")]
    UnsupportedRank {
        /// Source op type
        op_type: String,
        /// Actual spatial rank
        rank: usize,
        /// Minimum supported
        min: usize,
        /// Maximum supported
        max: usize,
    },

    /// Structural precondition violated (clip, dilation, peepholes, ...)
    #[error("Unsupported configuration on node {node}: {reason}")]
    UnsupportedConfiguration {
        /// Node name
        node: String,
        /// What was rejected
        reason: String,
    },

    /// Op types without any translator, collected over the whole graph
    #[error("{} op(s) not supported yet: {}", .0.len(), .0.join(", "))]
    UnsupportedOps(Vec<String>),

    /// Declared dtype conflicts with the inferred dtype
    #[error("Dtype mismatch on node {node}: declared {declared}, inferred {inferred}")]
    DtypeMismatch {
        /// Node name
        node: String,
        /// Declared dtype
        declared: String,
        /// Inferred dtype
        inferred: String,
    },

    /// Unsupported opset version
    #[error("Unsupported opset version: {version}, minimum supported is {min}")]
    UnsupportedOpset {
        /// Requested version
        version: i64,
        /// Minimum supported
        min: i64,
    },

    /// Shape required for translation was not inferred
    #[error("Shape of `{0}` is unknown")]
    UnknownShape(String),

    /// Node lookup failed
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Two nodes share a name
    #[error("Duplicate node name: {0}")]
    DuplicateNode(String),

    /// Input reference resolves to neither a node output nor a placeholder
    #[error("Input `{input}` of node {node} does not resolve")]
    UnresolvedInput {
        /// Consuming node
        node: String,
        /// Tensor name
        input: String,
    },

    /// Tensor data malformed or of an unexpected type
    #[error("Invalid tensor: {0}")]
    InvalidTensor(String),

    /// A translator failed; carries the offending node identity
    #[error("Convert failed node: {node}, op_type is {op_type}: {source}")]
    Translation {
        /// Node name
        node: String,
        /// Source op type
        op_type: String,
        /// Underlying failure
        #[source]
        source: Box<ConvertError>,
    },

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Shorthand for [`ConvertError::UnsupportedConfiguration`]
    pub fn unsupported(node: &str, reason: impl Into<String>) -> Self {
        Self::UnsupportedConfiguration {
            node: node.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<ndarray::ShapeError> for ConvertError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::InvalidTensor(err.to_string())
    }
}

/// Result type alias for conversion operations
pub type ConvertResult<T> = Result<T, ConvertError>;
