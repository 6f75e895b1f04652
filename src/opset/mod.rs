//! Versioned translator tables
//!
//! Opset 9 is the base table. Later versions only list the ops whose
//! signature changed and fall back to the previous table for the rest.
//!
//! # Supported Versions
//!
//! | Opset | Changes |
//! |-------|---------|
//! | 9     | Base table |
//! | 10    | None |
//! | 11    | `Pad` and `Clip` read their parameters from inputs, `Resize` takes `roi` |

use std::str::FromStr;

use strum_macros::{Display, EnumIter, EnumString};

use crate::error::{ConvertError, ConvertResult};
use crate::mapper::{
    constant, conv, directly_map, elementwise, gather, math, norm, padding, pool, resize, rnn,
    shape, slice, Translator,
};

/// Opset versions with a translator table, ascending
pub const SUPPORTED_OPSETS: &[i64] = &[9, 10, 11];

/// Source op types with a translator
#[allow(missing_docs)]
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, EnumString, EnumIter, Display)]
pub enum OpType {
    Abs,
    Add,
    AveragePool,
    BatchNormalization,
    Cast,
    Ceil,
    Clip,
    Concat,
    Constant,
    ConstantOfShape,
    Conv,
    ConvTranspose,
    Div,
    Elu,
    Equal,
    Erf,
    Exp,
    Expand,
    Flatten,
    Floor,
    Gather,
    Gemm,
    GlobalAveragePool,
    GlobalMaxPool,
    Greater,
    #[strum(to_string = "GRU")]
    Gru,
    HardSigmoid,
    Identity,
    InstanceNormalization,
    LeakyRelu,
    Less,
    Log,
    #[strum(to_string = "LSTM")]
    Lstm,
    MatMul,
    MaxPool,
    MaxRoiPool,
    Mul,
    NonZero,
    Pad,
    Pow,
    #[strum(to_string = "PRelu")]
    PRelu,
    Range,
    Reciprocal,
    ReduceMax,
    ReduceMean,
    ReduceMin,
    ReduceSum,
    Relu,
    Reshape,
    Resize,
    RoiAlign,
    Shape,
    Shrink,
    Sigmoid,
    Slice,
    Softmax,
    Softplus,
    Softsign,
    Split,
    Sqrt,
    Squeeze,
    Sub,
    Sum,
    Tanh,
    ThresholdedRelu,
    Tile,
    Transpose,
    Unsqueeze,
    Upsample,
    Where,
}

impl OpType {
    /// Parse a source op type; `None` when no translator exists
    pub fn parse(op_type: &str) -> Option<Self> {
        Self::from_str(op_type).ok()
    }
}

/// Translators of one opset version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslatorSet {
    version: i64,
}

impl TranslatorSet {
    /// Opset version this table was selected for
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Translator for `op`
    pub fn get(&self, op: OpType) -> Translator {
        if self.version >= 11 {
            opset11(op)
        } else {
            opset9(op)
        }
    }

    /// Translator for a raw op type string
    pub fn lookup(&self, op_type: &str) -> Option<Translator> {
        OpType::parse(op_type).map(|op| self.get(op))
    }
}

/// Pick the highest supported opset not above `requested`
pub fn select_opset(requested: i64) -> ConvertResult<TranslatorSet> {
    SUPPORTED_OPSETS
        .iter()
        .rev()
        .find(|&&v| v <= requested)
        .map(|&version| TranslatorSet { version })
        .ok_or(ConvertError::UnsupportedOpset {
            version: requested,
            min: SUPPORTED_OPSETS[0],
        })
}

fn opset11(op: OpType) -> Translator {
    match op {
        OpType::Pad => padding::pad_v11,
        OpType::Clip => math::clip_v11,
        OpType::Resize => resize::resize_v11,
        _ => opset9(op),
    }
}

fn opset9(op: OpType) -> Translator {
    use OpType::*;

    match op {
        Abs | Ceil | Clip | Elu | Erf | Exp | Floor | HardSigmoid | LeakyRelu | Log
        | Reciprocal | ReduceMax | ReduceMean | ReduceMin | ReduceSum | Relu | Shape | Sigmoid
        | Softmax | Softplus | Softsign | Sqrt | Tanh | ThresholdedRelu => directly_map,

        Add | Sub | Mul | Div | Pow => elementwise::elementwise,
        Equal => elementwise::equal,
        Greater => elementwise::greater,
        Less => elementwise::less,
        Where => elementwise::where_op,

        Pad => padding::pad,
        Conv => conv::conv,
        ConvTranspose => conv::conv_transpose,
        AveragePool => pool::average_pool,
        MaxPool => pool::max_pool,
        GlobalAveragePool => pool::global_average_pool,
        GlobalMaxPool => pool::global_max_pool,

        Reshape => shape::reshape,
        Squeeze => shape::squeeze,
        Unsqueeze => shape::unsqueeze,
        Flatten => shape::flatten,
        Transpose => shape::transpose,
        Split => shape::split,
        Concat => shape::concat,
        Tile => shape::tile,
        Expand => shape::expand,
        Identity => shape::identity,
        NonZero => shape::nonzero,
        Range => shape::range,
        Cast => shape::cast,
        Slice => slice::slice,
        Gather => gather::gather,

        Constant => constant::constant,
        ConstantOfShape => constant::constant_of_shape,

        Gemm => math::gemm,
        MatMul => math::matmul,
        Sum => math::sum,
        PRelu => math::prelu,
        Shrink => math::shrink,

        BatchNormalization => norm::batch_norm,
        InstanceNormalization => norm::instance_norm,

        Gru => rnn::gru,
        Lstm => rnn::lstm,

        Resize => resize::resize,
        Upsample => resize::upsample,
        RoiAlign => resize::roi_align,
        MaxRoiPool => resize::max_roi_pool,
    }
}
