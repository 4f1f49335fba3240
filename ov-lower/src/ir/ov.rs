//! OpenVINO-style node set. Each variant mirrors one opset node the
//! lowering emits.

use std::fmt;

/// Element types of the target engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Boolean,
    F16,
    F32,
    F64,
    I4,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl ElementType {
    pub fn bitwidth(self) -> usize {
        match self {
            ElementType::I4 => 4,
            ElementType::Boolean | ElementType::I8 | ElementType::U8 => 8,
            ElementType::F16 | ElementType::I16 | ElementType::U16 => 16,
            ElementType::F32 | ElementType::I32 | ElementType::U32 => 32,
            ElementType::F64 | ElementType::I64 | ElementType::U64 => 64,
        }
    }

    /// Bytes needed to hold `count` packed elements, `None` on overflow.
    pub fn byte_len(self, count: usize) -> Option<usize> {
        let bits = count.checked_mul(self.bitwidth())?;
        Some(bits / 8 + usize::from(bits % 8 != 0))
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::Boolean => "boolean",
            ElementType::F16 => "f16",
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
            ElementType::I4 => "i4",
            ElementType::I8 => "i8",
            ElementType::I16 => "i16",
            ElementType::I32 => "i32",
            ElementType::I64 => "i64",
            ElementType::U8 => "u8",
            ElementType::U16 => "u16",
            ElementType::U32 => "u32",
            ElementType::U64 => "u64",
        };
        f.write_str(name)
    }
}

/// How windowed ops derive padding. Pads are never given explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadType {
    SameUpper,
    Valid,
}

/// Attributes shared by Convolution, GroupConvolution and ConvolutionBackpropData.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvAttrs {
    pub strides: [usize; 2],
    pub dilations: [usize; 2],
    pub auto_pad: PadType,
}

/// Pool windows round their output extent down.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolAttrs {
    pub strides: [usize; 2],
    pub kernel: [usize; 2],
    pub auto_pad: PadType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateTransformMode {
    HalfPixel,
    Asymmetric,
    AlignCorners,
}

/// Linear (onnx flavour) interpolation to explicit target sizes.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolateAttrs {
    pub coordinate_transformation_mode: CoordinateTransformMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OvOp {
    /// Graph input, bound at execution time.
    Parameter,

    /// Immutable payload, raw little-endian bytes.
    Constant { data: Vec<u8> },

    /// inputs: data, order
    Transpose,

    /// inputs: data, shape pattern
    Reshape { special_zero: bool },

    /// Numpy-style broadcast.
    Add,

    /// Numpy-style broadcast.
    Multiply,

    /// inputs: data [N,C,H,W], filter [O,C,KH,KW]
    Convolution(ConvAttrs),

    /// inputs: data [N,C,H,W], filter [G,O/G,C/G,KH,KW]
    GroupConvolution(ConvAttrs),

    /// inputs: data [N,C,H,W], filter [C,O,KH,KW], optional spatial output shape
    ConvolutionBackpropData(ConvAttrs),

    MaxPool(PoolAttrs),

    AvgPool { attrs: PoolAttrs, exclude_pad: bool },

    Concat { axis: i64 },

    Relu,

    Clamp { min: f64, max: f64 },

    Tanh,

    Sigmoid,

    HSwish,

    Softmax { axis: usize },

    /// inputs: data, axes
    ReduceMean { keep_dims: bool },

    /// inputs: data, sizes, axes
    Interpolate(InterpolateAttrs),

    Convert { destination: ElementType },
}

impl OvOp {
    pub fn name(&self) -> &'static str {
        match self {
            OvOp::Parameter => "Parameter",
            OvOp::Constant { .. } => "Constant",
            OvOp::Transpose => "Transpose",
            OvOp::Reshape { .. } => "Reshape",
            OvOp::Add => "Add",
            OvOp::Multiply => "Multiply",
            OvOp::Convolution(_) => "Convolution",
            OvOp::GroupConvolution(_) => "GroupConvolution",
            OvOp::ConvolutionBackpropData(_) => "ConvolutionBackpropData",
            OvOp::MaxPool(_) => "MaxPool",
            OvOp::AvgPool { .. } => "AvgPool",
            OvOp::Concat { .. } => "Concat",
            OvOp::Relu => "Relu",
            OvOp::Clamp { .. } => "Clamp",
            OvOp::Tanh => "Tanh",
            OvOp::Sigmoid => "Sigmoid",
            OvOp::HSwish => "HSwish",
            OvOp::Softmax { .. } => "Softmax",
            OvOp::ReduceMean { .. } => "ReduceMean",
            OvOp::Interpolate(_) => "Interpolate",
            OvOp::Convert { .. } => "Convert",
        }
    }

    /// Short attribute summary for IR dumps. Empty when the op has none.
    pub fn attrs_summary(&self) -> String {
        match self {
            OvOp::Constant { data } => format!("{} bytes", data.len()),
            OvOp::Reshape { special_zero } => format!("special_zero={special_zero}"),
            OvOp::Convolution(a) | OvOp::GroupConvolution(a) | OvOp::ConvolutionBackpropData(a) => {
                format!(
                    "strides={:?} dilations={:?} auto_pad={:?}",
                    a.strides, a.dilations, a.auto_pad
                )
            }
            OvOp::MaxPool(a) | OvOp::AvgPool { attrs: a, .. } => format!(
                "kernel={:?} strides={:?} auto_pad={:?}",
                a.kernel, a.strides, a.auto_pad
            ),
            OvOp::Concat { axis } => format!("axis={axis}"),
            OvOp::Clamp { min, max } => format!("min={min} max={max}"),
            OvOp::Softmax { axis } => format!("axis={axis}"),
            OvOp::ReduceMean { keep_dims } => format!("keep_dims={keep_dims}"),
            OvOp::Interpolate(a) => format!("coord={:?}", a.coordinate_transformation_mode),
            OvOp::Convert { destination } => format!("to={destination}"),
            _ => String::new(),
        }
    }
}
