use super::LowerCx;
use crate::ir::{ElementType, NodeId, OvOp};
use crate::lower::Result;

/// Single-input elementwise op applied to operand 0.
pub fn lower_unary(cx: &mut LowerCx<'_>, inputs: &[i32], name: &str, op: OvOp) -> Result<NodeId> {
    let input = cx.input(name, inputs, 0)?;
    Ok(cx.graph.add_op(op, &[input])?)
}

/// DEQUANTIZE of f16 weights is a plain conversion to f32.
pub fn lower_dequantize(cx: &mut LowerCx<'_>, inputs: &[i32]) -> Result<NodeId> {
    lower_unary(
        cx,
        inputs,
        "DEQUANTIZE",
        OvOp::Convert {
            destination: ElementType::F32,
        },
    )
}
