//! Static shape inference for [`OvOp`] nodes.

use super::graph::{Graph, NodeId};
use super::ov::{ConvAttrs, ElementType, OvOp, PadType, PoolAttrs};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShapeError {
    #[error("node %{0} does not exist")]
    UnknownNode(NodeId),

    #[error("{op}: expected {expected} inputs, got {got}")]
    Arity {
        op: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{op}: input {input} must be an integer constant")]
    NotConstant { op: &'static str, input: usize },

    #[error("{op}: expected rank {expected}, got {got}")]
    Rank {
        op: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("cannot broadcast {lhs:?} with {rhs:?}")]
    Broadcast { lhs: Vec<usize>, rhs: Vec<usize> },

    #[error("element type mismatch: {lhs} vs {rhs}")]
    ElementType { lhs: ElementType, rhs: ElementType },

    #[error("{op}: data has {data} channels but filter expects {filter}")]
    ChannelMismatch {
        op: &'static str,
        data: usize,
        filter: usize,
    },

    #[error("invalid permutation {order:?} for rank {rank}")]
    Permutation { order: Vec<i64>, rank: usize },

    #[error("cannot reshape {from:?} into pattern {pattern:?}")]
    Reshape { from: Vec<usize>, pattern: Vec<i64> },

    #[error("axis {axis} out of range for rank {rank}")]
    Axis { axis: i64, rank: usize },

    #[error("{op}: window does not fit (input {input}, effective kernel {kernel})")]
    Window {
        op: &'static str,
        input: usize,
        kernel: usize,
    },

    #[error("{op}: strides and dilations must be non-zero")]
    ZeroStride { op: &'static str },

    #[error("constant payload is {got} bytes, shape needs {expected}")]
    ConstantSize { expected: usize, got: usize },

    #[error("element count of {0:?} overflows")]
    Overflow(Vec<usize>),

    #[error("{op}: {reason}")]
    Invalid { op: &'static str, reason: String },
}

type InferResult = Result<(Vec<usize>, ElementType), ShapeError>;

pub(crate) fn infer(graph: &Graph, op: &OvOp, inputs: &[NodeId]) -> InferResult {
    let name = op.name();
    match op {
        OvOp::Parameter | OvOp::Constant { .. } => Err(ShapeError::Invalid {
            op: name,
            reason: "source nodes are created directly".into(),
        }),
        OvOp::Transpose => {
            expect_arity(name, inputs, 2)?;
            let data = graph.node(inputs[0]);
            let order = constant(graph, name, inputs, 1)?;
            Ok((permute(&data.shape, &order)?, data.element_type))
        }
        OvOp::Reshape { special_zero } => {
            expect_arity(name, inputs, 2)?;
            let data = graph.node(inputs[0]);
            let pattern = constant(graph, name, inputs, 1)?;
            Ok((reshape(&data.shape, &pattern, *special_zero)?, data.element_type))
        }
        OvOp::Add | OvOp::Multiply => {
            expect_arity(name, inputs, 2)?;
            let lhs = graph.node(inputs[0]);
            let rhs = graph.node(inputs[1]);
            if lhs.element_type != rhs.element_type {
                return Err(ShapeError::ElementType {
                    lhs: lhs.element_type,
                    rhs: rhs.element_type,
                });
            }
            Ok((broadcast_numpy(&lhs.shape, &rhs.shape)?, lhs.element_type))
        }
        OvOp::Convolution(attrs) => {
            expect_arity(name, inputs, 2)?;
            let data = graph.node(inputs[0]);
            let filter = graph.node(inputs[1]);
            expect_rank(name, &data.shape, 4)?;
            expect_rank(name, &filter.shape, 4)?;
            if data.shape[1] != filter.shape[1] {
                return Err(ShapeError::ChannelMismatch {
                    op: name,
                    data: data.shape[1],
                    filter: filter.shape[1],
                });
            }
            let spatial = conv_spatial(name, &data.shape, &filter.shape[2..], attrs)?;
            Ok((
                vec![data.shape[0], filter.shape[0], spatial[0], spatial[1]],
                data.element_type,
            ))
        }
        OvOp::GroupConvolution(attrs) => {
            expect_arity(name, inputs, 2)?;
            let data = graph.node(inputs[0]);
            let filter = graph.node(inputs[1]);
            expect_rank(name, &data.shape, 4)?;
            expect_rank(name, &filter.shape, 5)?;
            let groups = filter.shape[0];
            if groups * filter.shape[2] != data.shape[1] {
                return Err(ShapeError::ChannelMismatch {
                    op: name,
                    data: data.shape[1],
                    filter: groups * filter.shape[2],
                });
            }
            let spatial = conv_spatial(name, &data.shape, &filter.shape[3..], attrs)?;
            Ok((
                vec![data.shape[0], groups * filter.shape[1], spatial[0], spatial[1]],
                data.element_type,
            ))
        }
        OvOp::ConvolutionBackpropData(attrs) => {
            if inputs.len() != 2 && inputs.len() != 3 {
                return Err(ShapeError::Arity {
                    op: name,
                    expected: 3,
                    got: inputs.len(),
                });
            }
            let data = graph.node(inputs[0]);
            let filter = graph.node(inputs[1]);
            expect_rank(name, &data.shape, 4)?;
            expect_rank(name, &filter.shape, 4)?;
            if data.shape[1] != filter.shape[0] {
                return Err(ShapeError::ChannelMismatch {
                    op: name,
                    data: data.shape[1],
                    filter: filter.shape[0],
                });
            }
            let spatial = if inputs.len() == 3 {
                let sizes = constant(graph, name, inputs, 2)?;
                if sizes.len() != 2 || sizes.iter().any(|&s| s <= 0) {
                    return Err(ShapeError::Invalid {
                        op: name,
                        reason: format!("output shape {sizes:?} is not two positive dims"),
                    });
                }
                [sizes[0] as usize, sizes[1] as usize]
            } else {
                backprop_spatial(name, &data.shape, &filter.shape[2..], attrs)?
            };
            Ok((
                vec![data.shape[0], filter.shape[1], spatial[0], spatial[1]],
                data.element_type,
            ))
        }
        OvOp::MaxPool(attrs) | OvOp::AvgPool { attrs, .. } => {
            expect_arity(name, inputs, 1)?;
            let data = graph.node(inputs[0]);
            expect_rank(name, &data.shape, 4)?;
            let spatial = pool_spatial(name, &data.shape, attrs)?;
            Ok((
                vec![data.shape[0], data.shape[1], spatial[0], spatial[1]],
                data.element_type,
            ))
        }
        OvOp::Concat { axis } => {
            if inputs.is_empty() {
                return Err(ShapeError::Arity {
                    op: name,
                    expected: 1,
                    got: 0,
                });
            }
            let first = graph.node(inputs[0]);
            let axis = normalize_axis(*axis, first.rank())?;
            let mut shape = first.shape.clone();
            for &id in &inputs[1..] {
                let other = graph.node(id);
                if other.element_type != first.element_type {
                    return Err(ShapeError::ElementType {
                        lhs: first.element_type,
                        rhs: other.element_type,
                    });
                }
                let compatible = other.rank() == first.rank()
                    && (0..first.rank()).all(|d| d == axis || other.shape[d] == first.shape[d]);
                if !compatible {
                    return Err(ShapeError::Invalid {
                        op: name,
                        reason: format!(
                            "{:?} does not match {:?} outside axis {axis}",
                            other.shape, first.shape
                        ),
                    });
                }
                shape[axis] += other.shape[axis];
            }
            Ok((shape, first.element_type))
        }
        OvOp::Relu | OvOp::Tanh | OvOp::Sigmoid | OvOp::HSwish => {
            expect_arity(name, inputs, 1)?;
            let data = graph.node(inputs[0]);
            Ok((data.shape.clone(), data.element_type))
        }
        OvOp::Clamp { min, max } => {
            expect_arity(name, inputs, 1)?;
            if min > max {
                return Err(ShapeError::Invalid {
                    op: name,
                    reason: format!("min {min} exceeds max {max}"),
                });
            }
            let data = graph.node(inputs[0]);
            Ok((data.shape.clone(), data.element_type))
        }
        OvOp::Softmax { axis } => {
            expect_arity(name, inputs, 1)?;
            let data = graph.node(inputs[0]);
            if *axis >= data.rank() {
                return Err(ShapeError::Axis {
                    axis: *axis as i64,
                    rank: data.rank(),
                });
            }
            Ok((data.shape.clone(), data.element_type))
        }
        OvOp::ReduceMean { keep_dims } => {
            expect_arity(name, inputs, 2)?;
            let data = graph.node(inputs[0]);
            let axes = constant(graph, name, inputs, 1)?;
            let mut reduced = vec![false; data.rank()];
            for axis in axes {
                reduced[normalize_axis(axis, data.rank())?] = true;
            }
            let shape = data
                .shape
                .iter()
                .zip(&reduced)
                .filter_map(|(&d, &r)| match (r, keep_dims) {
                    (false, _) => Some(d),
                    (true, true) => Some(1),
                    (true, false) => None,
                })
                .collect();
            Ok((shape, data.element_type))
        }
        OvOp::Interpolate(_) => {
            expect_arity(name, inputs, 3)?;
            let data = graph.node(inputs[0]);
            let sizes = constant(graph, name, inputs, 1)?;
            let axes = constant(graph, name, inputs, 2)?;
            if sizes.len() != axes.len() {
                return Err(ShapeError::Invalid {
                    op: name,
                    reason: format!("{} sizes for {} axes", sizes.len(), axes.len()),
                });
            }
            let mut shape = data.shape.clone();
            for (&size, &axis) in sizes.iter().zip(&axes) {
                if size <= 0 {
                    return Err(ShapeError::Invalid {
                        op: name,
                        reason: format!("target size {size} must be positive"),
                    });
                }
                shape[normalize_axis(axis, data.rank())?] = size as usize;
            }
            Ok((shape, data.element_type))
        }
        OvOp::Convert { destination } => {
            expect_arity(name, inputs, 1)?;
            Ok((graph.node(inputs[0]).shape.clone(), *destination))
        }
    }
}

fn expect_arity(op: &'static str, inputs: &[NodeId], expected: usize) -> Result<(), ShapeError> {
    if inputs.len() != expected {
        return Err(ShapeError::Arity {
            op,
            expected,
            got: inputs.len(),
        });
    }
    Ok(())
}

fn expect_rank(op: &'static str, shape: &[usize], expected: usize) -> Result<(), ShapeError> {
    if shape.len() != expected {
        return Err(ShapeError::Rank {
            op,
            expected,
            got: shape.len(),
        });
    }
    Ok(())
}

fn constant(
    graph: &Graph,
    op: &'static str,
    inputs: &[NodeId],
    input: usize,
) -> Result<Vec<i64>, ShapeError> {
    graph
        .constant_values(inputs[input])
        .ok_or(ShapeError::NotConstant { op, input })
}

fn normalize_axis(axis: i64, rank: usize) -> Result<usize, ShapeError> {
    let resolved = if axis < 0 { axis + rank as i64 } else { axis };
    if resolved < 0 || resolved >= rank as i64 {
        return Err(ShapeError::Axis { axis, rank });
    }
    Ok(resolved as usize)
}

/// Product of `dims`, `None` on overflow.
pub fn element_count(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

pub fn permute(shape: &[usize], order: &[i64]) -> Result<Vec<usize>, ShapeError> {
    let invalid = || ShapeError::Permutation {
        order: order.to_vec(),
        rank: shape.len(),
    };
    if order.len() != shape.len() {
        return Err(invalid());
    }
    let mut seen = vec![false; shape.len()];
    let mut out = Vec::with_capacity(shape.len());
    for &axis in order {
        if axis < 0 || axis as usize >= shape.len() || seen[axis as usize] {
            return Err(invalid());
        }
        seen[axis as usize] = true;
        out.push(shape[axis as usize]);
    }
    Ok(out)
}

fn reshape(from: &[usize], pattern: &[i64], special_zero: bool) -> Result<Vec<usize>, ShapeError> {
    let invalid = || ShapeError::Reshape {
        from: from.to_vec(),
        pattern: pattern.to_vec(),
    };
    let total = element_count(from).ok_or_else(|| ShapeError::Overflow(from.to_vec()))?;
    let mut out = Vec::with_capacity(pattern.len());
    let mut inferred = None;
    for (i, &dim) in pattern.iter().enumerate() {
        match dim {
            -1 if inferred.is_none() => {
                inferred = Some(i);
                out.push(1);
            }
            0 if special_zero => out.push(*from.get(i).ok_or_else(invalid)?),
            d if d >= 0 => out.push(d as usize),
            _ => return Err(invalid()),
        }
    }
    let known = element_count(&out).ok_or_else(invalid)?;
    if let Some(i) = inferred {
        if known == 0 || total % known != 0 {
            return Err(invalid());
        }
        out[i] = total / known;
    } else if known != total {
        return Err(invalid());
    }
    Ok(out)
}

fn broadcast_numpy(lhs: &[usize], rhs: &[usize]) -> Result<Vec<usize>, ShapeError> {
    let rank = lhs.len().max(rhs.len());
    let dim = |s: &[usize], i: usize| {
        let pad = rank - s.len();
        if i < pad {
            1
        } else {
            s[i - pad]
        }
    };
    (0..rank)
        .map(|i| match (dim(lhs, i), dim(rhs, i)) {
            (a, b) if a == b => Ok(a),
            (1, b) => Ok(b),
            (a, 1) => Ok(a),
            _ => Err(ShapeError::Broadcast {
                lhs: lhs.to_vec(),
                rhs: rhs.to_vec(),
            }),
        })
        .collect()
}

/// Output extent of one spatial axis of a sliding window, rounded down.
fn window_out(
    op: &'static str,
    input: usize,
    kernel: usize,
    stride: usize,
    dilation: usize,
    auto_pad: PadType,
) -> Result<usize, ShapeError> {
    if stride == 0 || dilation == 0 {
        return Err(ShapeError::ZeroStride { op });
    }
    let effective = dilation * (kernel.max(1) - 1) + 1;
    match auto_pad {
        PadType::SameUpper => Ok(input.div_ceil(stride)),
        PadType::Valid => {
            if input < effective {
                return Err(ShapeError::Window {
                    op,
                    input,
                    kernel: effective,
                });
            }
            Ok((input - effective) / stride + 1)
        }
    }
}

fn conv_spatial(
    op: &'static str,
    data: &[usize],
    kernel: &[usize],
    attrs: &ConvAttrs,
) -> Result<[usize; 2], ShapeError> {
    let mut out = [0; 2];
    for axis in 0..2 {
        out[axis] = window_out(
            op,
            data[2 + axis],
            kernel[axis],
            attrs.strides[axis],
            attrs.dilations[axis],
            attrs.auto_pad,
        )?;
    }
    Ok(out)
}

fn pool_spatial(op: &'static str, data: &[usize], attrs: &PoolAttrs) -> Result<[usize; 2], ShapeError> {
    let mut out = [0; 2];
    for axis in 0..2 {
        out[axis] = window_out(
            op,
            data[2 + axis],
            attrs.kernel[axis],
            attrs.strides[axis],
            1,
            attrs.auto_pad,
        )?;
    }
    Ok(out)
}

/// Transposed-convolution extent when no explicit output shape is given.
fn backprop_spatial(
    op: &'static str,
    data: &[usize],
    kernel: &[usize],
    attrs: &ConvAttrs,
) -> Result<[usize; 2], ShapeError> {
    let mut out = [0; 2];
    for axis in 0..2 {
        let (stride, dilation) = (attrs.strides[axis], attrs.dilations[axis]);
        if stride == 0 || dilation == 0 {
            return Err(ShapeError::ZeroStride { op });
        }
        let (input, extent) = (data[2 + axis], kernel[axis]);
        if input == 0 || extent == 0 {
            return Err(ShapeError::Window {
                op,
                input,
                kernel: extent,
            });
        }
        out[axis] = match attrs.auto_pad {
            PadType::SameUpper => input * stride,
            PadType::Valid => stride * (input - 1) + dilation * (extent - 1) + 1,
        };
    }
    Ok(out)
}
