use super::LowerCx;
use crate::ir::{NodeId, OvOp};
use crate::lower::Result;

/// Softmax over the channel axis. Only beta == 1 reaches translation.
pub fn lower_softmax(cx: &mut LowerCx<'_>, inputs: &[i32]) -> Result<NodeId> {
    let input = cx.input("SOFTMAX", inputs, 0)?;
    Ok(cx.graph.add_op(OvOp::Softmax { axis: 1 }, &[input])?)
}
