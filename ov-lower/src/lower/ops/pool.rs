use super::{apply_activation, auto_pad, options_mismatch, positive, LowerCx};
use crate::ir::{NodeId, OvOp, PadType, PoolAttrs};
use crate::lower::Result;
use crate::tflite::{BuiltinOptions, Padding, Pool2dOptions};

fn pool_attrs(op: &str, opts: &Pool2dOptions, auto_pad: PadType) -> Result<PoolAttrs> {
    Ok(PoolAttrs {
        strides: [
            positive(op, "stride_height", opts.stride_height)?,
            positive(op, "stride_width", opts.stride_width)?,
        ],
        kernel: [
            positive(op, "filter_height", opts.filter_height)?,
            positive(op, "filter_width", opts.filter_width)?,
        ],
        auto_pad,
    })
}

pub fn lower_average_pool2d(
    cx: &mut LowerCx<'_>,
    inputs: &[i32],
    options: &BuiltinOptions,
) -> Result<NodeId> {
    const OP: &str = "AVERAGE_POOL_2D";
    let BuiltinOptions::Pool2d(opts) = options else {
        return Err(options_mismatch(OP, options));
    };
    let input = cx.input(OP, inputs, 0)?;
    let attrs = pool_attrs(OP, opts, auto_pad(opts.padding)?)?;
    let pool = cx.graph.add_op(
        OvOp::AvgPool {
            attrs,
            exclude_pad: true,
        },
        &[input],
    )?;
    apply_activation(cx.graph, pool, opts.activation)
}

pub fn lower_max_pool2d(
    cx: &mut LowerCx<'_>,
    inputs: &[i32],
    options: &BuiltinOptions,
) -> Result<NodeId> {
    const OP: &str = "MAX_POOL_2D";
    let BuiltinOptions::Pool2d(opts) = options else {
        return Err(options_mismatch(OP, options));
    };
    let input = cx.input(OP, inputs, 0)?;
    // anything but SAME pools without padding
    let pad = match opts.padding {
        Padding::Same => PadType::SameUpper,
        _ => PadType::Valid,
    };
    let attrs = pool_attrs(OP, opts, pad)?;
    let pool = cx.graph.add_op(OvOp::MaxPool(attrs), &[input])?;
    apply_activation(cx.graph, pool, opts.activation)
}
