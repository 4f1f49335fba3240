use super::LowerCx;
use crate::ir::{NodeId, OvOp};
use crate::lower::{Error, Result};
use crate::tflite::BuiltinOptions;

/// Reshape operand 0 to the pattern held by operand 1. When the shape
/// operand is omitted the pattern comes from `ReshapeOptions::new_shape`.
pub fn lower_reshape(cx: &mut LowerCx<'_>, inputs: &[i32], options: &BuiltinOptions) -> Result<NodeId> {
    const OP: &str = "RESHAPE";
    let input = cx.input(OP, inputs, 0)?;
    let pattern = match cx.optional_input(inputs, 1)? {
        Some(shape) => shape,
        None => match options {
            BuiltinOptions::Reshape(opts) if !opts.new_shape.is_empty() => {
                cx.graph.add_i32_constant(&opts.new_shape)
            }
            _ => return Err(Error::translation(OP, "no target shape")),
        },
    };
    Ok(cx
        .graph
        .add_op(OvOp::Reshape { special_zero: false }, &[input, pattern])?)
}
