//! Element type mapping and NHWC/NCHW layout conversion.

use super::{Error, Result};
use crate::ir::{ElementType, Graph, NodeId, OvOp};
use crate::tflite::TensorType;

/// Transpose order taking an NHWC tensor to NCHW.
pub const NHWC_TO_NCHW: [i64; 4] = [0, 3, 1, 2];
/// Transpose order taking an NCHW tensor back to NHWC.
pub const NCHW_TO_NHWC: [i64; 4] = [0, 2, 3, 1];

pub fn map_element_type(tensor_type: TensorType) -> Result<ElementType> {
    let et = match tensor_type {
        TensorType::Float32 => ElementType::F32,
        TensorType::Int32 => ElementType::I32,
        TensorType::UInt8 => ElementType::U8,
        TensorType::Int64 => ElementType::I64,
        TensorType::Bool => ElementType::Boolean,
        TensorType::Int16 => ElementType::I16,
        TensorType::Int8 => ElementType::I8,
        TensorType::Float16 => ElementType::F16,
        TensorType::Float64 => ElementType::F64,
        TensorType::UInt64 => ElementType::U64,
        TensorType::UInt32 => ElementType::U32,
        TensorType::UInt16 => ElementType::U16,
        TensorType::Int4 => ElementType::I4,
        other => return Err(Error::UnsupportedType(other)),
    };
    Ok(et)
}

/// Bring `node`, laid out as NHWC with host dims `dims`, into NCHW.
///
/// Tensors of rank below 4 are first reshaped to rank 4 by prepending unit
/// dims.
pub fn convert_nhwc_to_nchw(graph: &mut Graph, dims: &[i32], node: NodeId) -> Result<NodeId> {
    if !graph.contains(node) {
        return Err(Error::invalid(format!("node %{node} does not exist")));
    }
    if dims.is_empty() {
        return Err(Error::invalid("layout conversion of a scalar"));
    }
    if dims.len() > 4 {
        return Err(Error::UnsupportedRank(dims.len()));
    }

    let mut source = node;
    if dims.len() < 4 {
        let mut padded = vec![1i32; 4 - dims.len()];
        padded.extend_from_slice(dims);
        let pattern = graph.add_i32_constant(&padded);
        source = graph.add_op(OvOp::Reshape { special_zero: false }, &[node, pattern])?;
    }

    let order: Vec<i32> = NHWC_TO_NCHW.iter().map(|&a| a as i32).collect();
    let order = graph.add_i32_constant(&order);
    Ok(graph.add_op(OvOp::Transpose, &[source, order])?)
}

/// Transpose a rank-4 NCHW node back to NHWC.
pub fn convert_nchw_to_nhwc(graph: &mut Graph, node: NodeId) -> Result<NodeId> {
    let rank = graph
        .get(node)
        .ok_or_else(|| Error::invalid(format!("node %{node} does not exist")))?
        .rank();
    if rank != 4 {
        return Err(Error::UnsupportedRank(rank));
    }
    let order = graph.add_i64_constant(&NCHW_TO_NHWC);
    Ok(graph.add_op(OvOp::Transpose, &[node, order])?)
}
