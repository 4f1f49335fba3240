//! Per-operator translation into IR nodes.
//!
//! Every translator is a free function taking the lowering context, the
//! node's operand indices and its builtin options, and returns the single
//! IR node that produces the operator's output (in NCHW layout).

mod binary;
mod concat;
mod conv2d;
mod depthwise_conv2d;
mod mean;
mod pool;
mod reshape;
mod resize_bilinear;
mod softmax;
mod transpose_conv;
mod unary;

use super::node_manager::NodeManager;
use super::{Error, Result};
use crate::ir::{Graph, NodeId, OvOp, PadType};
use crate::tflite::{
    BuiltinOperator, BuiltinOptions, FusedActivation, OpCode, Padding, TensorContext,
    TRANSPOSE_CONV_BIAS,
};

/// Borrowed state a translator works against.
pub struct LowerCx<'a> {
    pub graph: &'a mut Graph,
    pub nodes: &'a NodeManager,
    pub tensors: &'a TensorContext,
}

impl LowerCx<'_> {
    /// Node bound to the operand at `position`, which must be present.
    pub fn input(&self, op: &str, inputs: &[i32], position: usize) -> Result<NodeId> {
        let index = *inputs
            .get(position)
            .ok_or_else(|| Error::translation(op, format!("missing input {position}")))?;
        if index < 0 {
            return Err(Error::MissingOperand(index));
        }
        self.nodes.interim_node_output(index)
    }

    /// Like [`LowerCx::input`], but an absent or negative operand is `None`.
    pub fn optional_input(&self, inputs: &[i32], position: usize) -> Result<Option<NodeId>> {
        match inputs.get(position) {
            Some(&index) if index >= 0 => self.nodes.interim_node_output(index).map(Some),
            _ => Ok(None),
        }
    }

    /// Host dims of the operand at `position`.
    pub fn dims(&self, op: &str, inputs: &[i32], position: usize) -> Result<&[i32]> {
        let index = *inputs
            .get(position)
            .ok_or_else(|| Error::translation(op, format!("missing input {position}")))?;
        Ok(&self.tensors.tensor(index)?.dims)
    }

    pub fn is_param(&self, inputs: &[i32], position: usize) -> bool {
        inputs
            .get(position)
            .is_some_and(|&index| self.nodes.is_index_a_param(index))
    }

    pub fn transpose(&mut self, node: NodeId, order: &[i64]) -> Result<NodeId> {
        let order = self.graph.add_i64_constant(order);
        Ok(self.graph.add_op(OvOp::Transpose, &[node, order])?)
    }

    pub fn shape(&self, node: NodeId) -> &[usize] {
        &self.graph.node(node).shape
    }
}

/// One variant per operator the lowering can translate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpTranslator {
    Add,
    Mul,
    AveragePool2d,
    MaxPool2d,
    Concatenation,
    Conv2d,
    DepthwiseConv2d,
    TransposeConv { custom: bool },
    Dequantize,
    HardSwish,
    Logistic,
    Relu,
    Relu6,
    Tanh,
    Reshape,
    Softmax,
    Mean,
    ResizeBilinear,
}

impl OpTranslator {
    pub fn for_op_code(op: &OpCode) -> Result<Self> {
        use BuiltinOperator as B;
        let translator = match op {
            OpCode::Custom(name) if name == TRANSPOSE_CONV_BIAS => {
                OpTranslator::TransposeConv { custom: true }
            }
            OpCode::Builtin(code) => match code {
                B::Add => OpTranslator::Add,
                B::Mul => OpTranslator::Mul,
                B::AveragePool2d => OpTranslator::AveragePool2d,
                B::MaxPool2d => OpTranslator::MaxPool2d,
                B::Concatenation => OpTranslator::Concatenation,
                B::Conv2d => OpTranslator::Conv2d,
                B::DepthwiseConv2d => OpTranslator::DepthwiseConv2d,
                B::TransposeConv => OpTranslator::TransposeConv { custom: false },
                B::Dequantize => OpTranslator::Dequantize,
                B::HardSwish => OpTranslator::HardSwish,
                B::Logistic => OpTranslator::Logistic,
                B::Relu => OpTranslator::Relu,
                B::Relu6 => OpTranslator::Relu6,
                B::Tanh => OpTranslator::Tanh,
                B::Reshape => OpTranslator::Reshape,
                B::Softmax => OpTranslator::Softmax,
                B::Mean => OpTranslator::Mean,
                B::ResizeBilinear => OpTranslator::ResizeBilinear,
                _ => return Err(Error::UnsupportedOperator(op.to_string())),
            },
            OpCode::Custom(_) => return Err(Error::UnsupportedOperator(op.to_string())),
        };
        Ok(translator)
    }

    pub fn lower(
        self,
        cx: &mut LowerCx<'_>,
        inputs: &[i32],
        options: &BuiltinOptions,
    ) -> Result<NodeId> {
        match self {
            OpTranslator::Add => binary::lower_add(cx, inputs, options),
            OpTranslator::Mul => binary::lower_mul(cx, inputs, options),
            OpTranslator::AveragePool2d => pool::lower_average_pool2d(cx, inputs, options),
            OpTranslator::MaxPool2d => pool::lower_max_pool2d(cx, inputs, options),
            OpTranslator::Concatenation => concat::lower_concatenation(cx, inputs, options),
            OpTranslator::Conv2d => conv2d::lower_conv2d(cx, inputs, options),
            OpTranslator::DepthwiseConv2d => {
                depthwise_conv2d::lower_depthwise_conv2d(cx, inputs, options)
            }
            OpTranslator::TransposeConv { custom: false } => {
                transpose_conv::lower_transpose_conv(cx, inputs, options)
            }
            OpTranslator::TransposeConv { custom: true } => {
                transpose_conv::lower_transpose_conv_bias(cx, inputs, options)
            }
            OpTranslator::Dequantize => unary::lower_dequantize(cx, inputs),
            OpTranslator::HardSwish => unary::lower_unary(cx, inputs, "HARD_SWISH", OvOp::HSwish),
            OpTranslator::Logistic => unary::lower_unary(cx, inputs, "LOGISTIC", OvOp::Sigmoid),
            OpTranslator::Relu => unary::lower_unary(cx, inputs, "RELU", OvOp::Relu),
            OpTranslator::Relu6 => unary::lower_unary(
                cx,
                inputs,
                "RELU6",
                OvOp::Clamp { min: 0.0, max: 6.0 },
            ),
            OpTranslator::Tanh => unary::lower_unary(cx, inputs, "TANH", OvOp::Tanh),
            OpTranslator::Reshape => reshape::lower_reshape(cx, inputs, options),
            OpTranslator::Softmax => softmax::lower_softmax(cx, inputs),
            OpTranslator::Mean => mean::lower_mean(cx, inputs, options),
            OpTranslator::ResizeBilinear => {
                resize_bilinear::lower_resize_bilinear(cx, inputs, options)
            }
        }
    }
}

/// Append the fused activation after `node`.
pub fn apply_activation(
    graph: &mut Graph,
    node: NodeId,
    activation: FusedActivation,
) -> Result<NodeId> {
    let op = match activation {
        FusedActivation::None => return Ok(node),
        FusedActivation::Relu => OvOp::Relu,
        FusedActivation::ReluN1To1 => OvOp::Clamp { min: -1.0, max: 1.0 },
        FusedActivation::Relu6 => OvOp::Clamp { min: 0.0, max: 6.0 },
        FusedActivation::Tanh => OvOp::Tanh,
        FusedActivation::Sigmoid => OvOp::Sigmoid,
        FusedActivation::SignBit => {
            return Err(Error::translation("activation", "sign bit is not supported"))
        }
    };
    Ok(graph.add_op(op, &[node])?)
}

pub fn auto_pad(padding: Padding) -> Result<PadType> {
    match padding {
        Padding::Same => Ok(PadType::SameUpper),
        Padding::Valid => Ok(PadType::Valid),
        Padding::Unknown => Err(Error::translation("padding", "unknown padding type")),
    }
}

/// Add a per-channel bias of host shape `[C]` to an NCHW producer.
pub fn bias_add(graph: &mut Graph, node: NodeId, bias: NodeId, bias_dims: &[i32]) -> Result<NodeId> {
    let channels = *bias_dims
        .first()
        .ok_or_else(|| Error::translation("bias", "bias has no dims"))?;
    let mut pattern = vec![1i32; graph.node(node).rank().max(2)];
    pattern[1] = channels;
    let pattern = graph.add_i32_constant(&pattern);
    let bias = graph.add_op(OvOp::Reshape { special_zero: true }, &[bias, pattern])?;
    Ok(graph.add_op(OvOp::Add, &[node, bias])?)
}

/// Host `i32` parameter that must be strictly positive.
pub(crate) fn positive(op: &str, what: &str, value: i32) -> Result<usize> {
    if value <= 0 {
        return Err(Error::translation(op, format!("{what} must be positive, got {value}")));
    }
    Ok(value as usize)
}

/// Error for options that are not the variant the operator needs.
pub(crate) fn options_mismatch(op: &str, options: &BuiltinOptions) -> Error {
    Error::invalid(format!("{op}: unexpected options {options:?}"))
}
