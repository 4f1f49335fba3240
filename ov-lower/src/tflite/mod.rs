//! Host-side view of a delegated TFLite partition.
//!
//! These types carry what the interpreter context exposes to a delegate:
//! tensor metadata and payloads keyed by operand index, plus the scheduled
//! nodes of the partition with their decoded builtin parameters.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lower::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorType {
    NoType,
    Float32,
    Int32,
    #[serde(rename = "uint8")]
    UInt8,
    Int64,
    String,
    Bool,
    Int16,
    Complex64,
    Int8,
    Float16,
    Float64,
    Complex128,
    #[serde(rename = "uint64")]
    UInt64,
    Resource,
    Variant,
    #[serde(rename = "uint32")]
    UInt32,
    #[serde(rename = "uint16")]
    UInt16,
    Int4,
}

impl TensorType {
    /// Storage width in bits, `None` for types without a fixed width.
    pub fn bit_width(self) -> Option<usize> {
        let bits = match self {
            TensorType::Int4 => 4,
            TensorType::UInt8 | TensorType::Int8 | TensorType::Bool => 8,
            TensorType::Int16 | TensorType::UInt16 | TensorType::Float16 => 16,
            TensorType::Float32 | TensorType::Int32 | TensorType::UInt32 => 32,
            TensorType::Int64 | TensorType::UInt64 | TensorType::Float64 | TensorType::Complex64 => 64,
            TensorType::Complex128 => 128,
            TensorType::NoType | TensorType::String | TensorType::Resource | TensorType::Variant => {
                return None
            }
        };
        Some(bits)
    }
}

/// Where the host keeps a tensor's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationType {
    /// Read-only weights mapped from the model file.
    MmapRo,
    #[default]
    ArenaRw,
    Dynamic,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorInfo {
    pub tensor_type: TensorType,
    pub dims: Vec<i32>,
    #[serde(default)]
    pub allocation: AllocationType,
    #[serde(default)]
    pub data: Option<Vec<u8>>,
}

impl TensorInfo {
    /// Arena tensor without a payload.
    pub fn new(tensor_type: TensorType, dims: Vec<i32>) -> Self {
        Self {
            tensor_type,
            dims,
            allocation: AllocationType::ArenaRw,
            data: None,
        }
    }

    pub fn constant_f32(dims: Vec<i32>, values: &[f32]) -> Self {
        Self {
            tensor_type: TensorType::Float32,
            dims,
            allocation: AllocationType::MmapRo,
            data: Some(values.iter().flat_map(|v| v.to_le_bytes()).collect()),
        }
    }

    pub fn constant_i32(dims: Vec<i32>, values: &[i32]) -> Self {
        Self {
            tensor_type: TensorType::Int32,
            dims,
            allocation: AllocationType::MmapRo,
            data: Some(values.iter().flat_map(|v| v.to_le_bytes()).collect()),
        }
    }

    pub fn num_dims(&self) -> usize {
        self.dims.len()
    }

    /// Product of the dims, `None` on overflow. Negative (unknown) dims
    /// count as zero.
    pub fn num_elements(&self) -> Option<usize> {
        self.dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d.max(0) as usize))
    }

    /// Expected payload size. `None` for types without a fixed width and
    /// for shapes whose size overflows.
    pub fn byte_size(&self) -> Option<usize> {
        let bits = self.num_elements()?.checked_mul(self.tensor_type.bit_width()?)?;
        Some(bits / 8 + usize::from(bits % 8 != 0))
    }

    /// Payload decoded as little-endian `i32`s. `None` unless the tensor is
    /// an `Int32` tensor that carries data.
    pub fn read_i32s(&self) -> Option<Vec<i32>> {
        if self.tensor_type != TensorType::Int32 {
            return None;
        }
        let data = self.data.as_ref()?;
        Some(
            data.chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        )
    }
}

/// Tensors visible to the delegate, keyed by operand index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TensorContext {
    tensors: BTreeMap<i32, TensorInfo>,
}

impl TensorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: i32, tensor: TensorInfo) -> Option<TensorInfo> {
        self.tensors.insert(index, tensor)
    }

    pub fn get(&self, index: i32) -> Option<&TensorInfo> {
        self.tensors.get(&index)
    }

    pub fn tensor(&self, index: i32) -> Result<&TensorInfo> {
        self.get(index).ok_or(Error::MissingOperand(index))
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

impl FromIterator<(i32, TensorInfo)> for TensorContext {
    fn from_iter<I: IntoIterator<Item = (i32, TensorInfo)>>(iter: I) -> Self {
        Self {
            tensors: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinOperator {
    Add,
    AveragePool2d,
    Concatenation,
    Conv2d,
    DepthwiseConv2d,
    Dequantize,
    FullyConnected,
    HardSwish,
    Logistic,
    MaxPool2d,
    Mean,
    Mul,
    Pad,
    Relu,
    Relu6,
    Reshape,
    ResizeBilinear,
    ResizeNearestNeighbor,
    Softmax,
    Sub,
    Tanh,
    TransposeConv,
    Custom,
}

/// Operation identity: a builtin code or a registered custom name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpCode {
    Builtin(BuiltinOperator),
    Custom(String),
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpCode::Builtin(op) => write!(f, "{op:?}"),
            OpCode::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Padding {
    #[default]
    Unknown,
    Same,
    Valid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusedActivation {
    #[default]
    None,
    Relu,
    ReluN1To1,
    Relu6,
    Tanh,
    SignBit,
    Sigmoid,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArithmeticOptions {
    pub activation: FusedActivation,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conv2dOptions {
    pub padding: Padding,
    pub stride_width: i32,
    pub stride_height: i32,
    pub dilation_width_factor: i32,
    pub dilation_height_factor: i32,
    pub activation: FusedActivation,
}

impl Default for Conv2dOptions {
    fn default() -> Self {
        Self {
            padding: Padding::Same,
            stride_width: 1,
            stride_height: 1,
            dilation_width_factor: 1,
            dilation_height_factor: 1,
            activation: FusedActivation::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthwiseConv2dOptions {
    pub padding: Padding,
    pub stride_width: i32,
    pub stride_height: i32,
    pub depth_multiplier: i32,
    pub dilation_width_factor: i32,
    pub dilation_height_factor: i32,
    pub activation: FusedActivation,
}

impl Default for DepthwiseConv2dOptions {
    fn default() -> Self {
        Self {
            padding: Padding::Same,
            stride_width: 1,
            stride_height: 1,
            depth_multiplier: 1,
            dilation_width_factor: 1,
            dilation_height_factor: 1,
            activation: FusedActivation::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pool2dOptions {
    pub padding: Padding,
    pub stride_width: i32,
    pub stride_height: i32,
    pub filter_width: i32,
    pub filter_height: i32,
    pub activation: FusedActivation,
}

impl Default for Pool2dOptions {
    fn default() -> Self {
        Self {
            padding: Padding::Valid,
            stride_width: 1,
            stride_height: 1,
            filter_width: 1,
            filter_height: 1,
            activation: FusedActivation::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcatenationOptions {
    pub axis: i32,
    pub activation: FusedActivation,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReducerOptions {
    pub keep_dims: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeBilinearOptions {
    pub align_corners: bool,
    pub half_pixel_centers: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftmaxOptions {
    pub beta: f32,
}

impl Default for SoftmaxOptions {
    fn default() -> Self {
        Self { beta: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransposeConvOptions {
    pub padding: Padding,
    pub stride_width: i32,
    pub stride_height: i32,
    pub activation: FusedActivation,
}

impl Default for TransposeConvOptions {
    fn default() -> Self {
        Self {
            padding: Padding::Same,
            stride_width: 1,
            stride_height: 1,
            activation: FusedActivation::None,
        }
    }
}

impl TransposeConvOptions {
    /// Decode the init blob of the `Convolution2DTransposeBias` custom op:
    /// padding, stride width and stride height as little-endian `i32`s.
    pub fn from_custom_data(data: &[u8]) -> Result<Self> {
        if data.len() < 12 {
            return Err(Error::invalid(format!(
                "transpose conv custom data is {} bytes, need 12",
                data.len()
            )));
        }
        let word = |i: usize| i32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
        let padding = match word(0) {
            0 => Padding::Unknown,
            1 => Padding::Same,
            2 => Padding::Valid,
            other => return Err(Error::invalid(format!("unknown padding code {other}"))),
        };
        Ok(Self {
            padding,
            stride_width: word(4),
            stride_height: word(8),
            activation: FusedActivation::None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReshapeOptions {
    pub new_shape: Vec<i32>,
}

/// Decoded builtin parameters. The variant is selected by the op code.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuiltinOptions {
    #[default]
    None,
    Add(ArithmeticOptions),
    Mul(ArithmeticOptions),
    Conv2d(Conv2dOptions),
    DepthwiseConv2d(DepthwiseConv2dOptions),
    Pool2d(Pool2dOptions),
    Concatenation(ConcatenationOptions),
    Reducer(ReducerOptions),
    ResizeBilinear(ResizeBilinearOptions),
    Softmax(SoftmaxOptions),
    TransposeConv(TransposeConvOptions),
    Reshape(ReshapeOptions),
}

/// One node of the partition in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledNode {
    pub id: i32,
    pub op: OpCode,
    pub inputs: Vec<i32>,
    pub outputs: Vec<i32>,
    #[serde(default)]
    pub options: BuiltinOptions,
}

impl ScheduledNode {
    pub fn builtin(
        id: i32,
        op: BuiltinOperator,
        inputs: Vec<i32>,
        outputs: Vec<i32>,
        options: BuiltinOptions,
    ) -> Self {
        Self {
            id,
            op: OpCode::Builtin(op),
            inputs,
            outputs,
            options,
        }
    }

    /// The `Convolution2DTransposeBias` custom op, with its init blob decoded.
    pub fn transpose_conv_bias(
        id: i32,
        inputs: Vec<i32>,
        outputs: Vec<i32>,
        custom_data: &[u8],
    ) -> Result<Self> {
        let options = TransposeConvOptions::from_custom_data(custom_data)?;
        Ok(Self {
            id,
            op: OpCode::Custom(TRANSPOSE_CONV_BIAS.to_string()),
            inputs,
            outputs,
            options: BuiltinOptions::TransposeConv(options),
        })
    }
}

/// Registered name of the fused transposed-convolution custom op.
pub const TRANSPOSE_CONV_BIAS: &str = "Convolution2DTransposeBias";

/// The partition handed to the delegate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    pub inputs: Vec<i32>,
    pub outputs: Vec<i32>,
    pub nodes: Vec<ScheduledNode>,
}

/// On-disk fixture: a partition plus every tensor it touches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubgraphFile {
    pub tensors: TensorContext,
    pub subgraph: Subgraph,
}

impl SubgraphFile {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
