use super::{apply_activation, auto_pad, bias_add, options_mismatch, positive, LowerCx};
use crate::ir::{ConvAttrs, NodeId, OvOp};
use crate::lower::layout::NHWC_TO_NCHW;
use crate::lower::Result;
use crate::tflite::BuiltinOptions;

/// Lower CONV_2D. Inputs are (input, filter[, bias]); the filter arrives as
/// OHWI and is transposed to OIHW unless it is a graph input, which layout
/// conversion has already moved.
pub fn lower_conv2d(cx: &mut LowerCx<'_>, inputs: &[i32], options: &BuiltinOptions) -> Result<NodeId> {
    const OP: &str = "CONV_2D";
    let BuiltinOptions::Conv2d(opts) = options else {
        return Err(options_mismatch(OP, options));
    };
    let input = cx.input(OP, inputs, 0)?;
    let mut filter = cx.input(OP, inputs, 1)?;
    if !cx.is_param(inputs, 1) {
        filter = cx.transpose(filter, &NHWC_TO_NCHW)?;
    }

    let attrs = ConvAttrs {
        strides: [
            positive(OP, "stride_height", opts.stride_height)?,
            positive(OP, "stride_width", opts.stride_width)?,
        ],
        dilations: [
            positive(OP, "dilation_height_factor", opts.dilation_height_factor)?,
            positive(OP, "dilation_width_factor", opts.dilation_width_factor)?,
        ],
        auto_pad: auto_pad(opts.padding)?,
    };
    let mut output = cx.graph.add_op(OvOp::Convolution(attrs), &[input, filter])?;

    if let Some(bias) = cx.optional_input(inputs, 2)? {
        let bias_dims = cx.dims(OP, inputs, 2)?.to_vec();
        output = bias_add(cx.graph, output, bias, &bias_dims)?;
    }
    apply_activation(cx.graph, output, opts.activation)
}
