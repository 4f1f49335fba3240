use super::{apply_activation, options_mismatch, LowerCx};
use crate::ir::{NodeId, OvOp};
use crate::lower::{Error, Result};
use crate::tflite::BuiltinOptions;

/// Concatenate every input along the channel axis of the NCHW layout.
pub fn lower_concatenation(
    cx: &mut LowerCx<'_>,
    inputs: &[i32],
    options: &BuiltinOptions,
) -> Result<NodeId> {
    const OP: &str = "CONCATENATION";
    let BuiltinOptions::Concatenation(opts) = options else {
        return Err(options_mismatch(OP, options));
    };
    if inputs.len() < 2 {
        return Err(Error::translation(OP, "needs at least two inputs"));
    }
    let parts = (0..inputs.len())
        .map(|i| cx.input(OP, inputs, i))
        .collect::<Result<Vec<_>>>()?;
    let concat = cx.graph.add_op(OvOp::Concat { axis: 1 }, &parts)?;
    apply_activation(cx.graph, concat, opts.activation)
}
