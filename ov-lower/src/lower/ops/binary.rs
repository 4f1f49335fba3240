use super::{apply_activation, options_mismatch, LowerCx};
use crate::ir::{NodeId, OvOp};
use crate::lower::Result;
use crate::tflite::BuiltinOptions;

/// Lower ADD to a numpy-broadcast Add plus its fused activation.
pub fn lower_add(cx: &mut LowerCx<'_>, inputs: &[i32], options: &BuiltinOptions) -> Result<NodeId> {
    let BuiltinOptions::Add(opts) = options else {
        return Err(options_mismatch("ADD", options));
    };
    let lhs = cx.input("ADD", inputs, 0)?;
    let rhs = cx.input("ADD", inputs, 1)?;
    let add = cx.graph.add_op(OvOp::Add, &[lhs, rhs])?;
    apply_activation(cx.graph, add, opts.activation)
}

/// Lower MUL to a numpy-broadcast Multiply plus its fused activation.
pub fn lower_mul(cx: &mut LowerCx<'_>, inputs: &[i32], options: &BuiltinOptions) -> Result<NodeId> {
    let BuiltinOptions::Mul(opts) = options else {
        return Err(options_mismatch("MUL", options));
    };
    let lhs = cx.input("MUL", inputs, 0)?;
    let rhs = cx.input("MUL", inputs, 1)?;
    let mul = cx.graph.add_op(OvOp::Multiply, &[lhs, rhs])?;
    apply_activation(cx.graph, mul, opts.activation)
}
