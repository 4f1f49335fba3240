use super::{apply_activation, auto_pad, bias_add, options_mismatch, positive, LowerCx};
use crate::ir::{ConvAttrs, NodeId, OvOp};
use crate::lower::{Error, Result};
use crate::tflite::BuiltinOptions;

/// Filter order for weights held as `[1, KH, KW, C*M]`.
const WEIGHTS_ORDER: [i64; 4] = [3, 0, 1, 2];
/// Filter order for a graph-input filter, already in `[1, C*M, KH, KW]`.
const PARAM_ORDER: [i64; 4] = [1, 0, 2, 3];

/// Lower DEPTHWISE_CONV_2D to a GroupConvolution with one group per input
/// channel.
pub fn lower_depthwise_conv2d(
    cx: &mut LowerCx<'_>,
    inputs: &[i32],
    options: &BuiltinOptions,
) -> Result<NodeId> {
    const OP: &str = "DEPTHWISE_CONV_2D";
    let BuiltinOptions::DepthwiseConv2d(opts) = options else {
        return Err(options_mismatch(OP, options));
    };
    let input = cx.input(OP, inputs, 0)?;
    let filter = cx.input(OP, inputs, 1)?;
    let order = if cx.is_param(inputs, 1) {
        &PARAM_ORDER
    } else {
        &WEIGHTS_ORDER
    };
    let filter = cx.transpose(filter, order)?;

    let input_dims = cx.dims(OP, inputs, 0)?;
    let channels = *input_dims
        .get(3)
        .ok_or_else(|| Error::translation(OP, format!("input dims {input_dims:?} are not NHWC")))?;
    let channels = positive(OP, "input channels", channels)?;

    let filter_shape = cx.shape(filter).to_vec();
    let per_group_in = filter_shape[1];
    if per_group_in == 0 || channels % per_group_in != 0 {
        return Err(Error::translation(
            OP,
            format!("{channels} input channels do not split into groups of {per_group_in}"),
        ));
    }
    let groups = channels / per_group_in;
    if filter_shape[0] % groups != 0 {
        return Err(Error::translation(
            OP,
            format!("{} filters do not divide into {groups} groups", filter_shape[0]),
        ));
    }

    let grouped = [
        groups,
        filter_shape[0] / groups,
        filter_shape[1],
        filter_shape[2],
        filter_shape[3],
    ];
    let grouped: Vec<i64> = grouped.iter().map(|&d| d as i64).collect();
    let pattern = cx.graph.add_i64_constant(&grouped);
    let filter = cx
        .graph
        .add_op(OvOp::Reshape { special_zero: false }, &[filter, pattern])?;

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
    let mut output = cx
        .graph
        .add_op(OvOp::GroupConvolution(attrs), &[input, filter])?;

    if let Some(bias) = cx.optional_input(inputs, 2)? {
        let bias_dims = cx.dims(OP, inputs, 2)?.to_vec();
        output = bias_add(cx.graph, output, bias, &bias_dims)?;
    }
    apply_activation(cx.graph, output, opts.activation)
}

#[cfg(test)]
mod tests {
    use crate::lower::ops::testing::Fixture;
    use crate::lower::Error;
    use crate::tflite::{
        BuiltinOperator, BuiltinOptions, DepthwiseConv2dOptions, Padding, ScheduledNode,
        TensorInfo, TensorType,
    };

    fn depthwise(inputs: Vec<i32>) -> ScheduledNode {
        ScheduledNode::builtin(
            0,
            BuiltinOperator::DepthwiseConv2d,
            inputs,
            vec![9],
            BuiltinOptions::DepthwiseConv2d(DepthwiseConv2dOptions {
                padding: Padding::Same,
                depth_multiplier: 2,
                ..Default::default()
            }),
        )
    }

    #[test]
    fn one_group_per_channel() {
        let mut fx = Fixture::new();
        fx.input(0, TensorInfo::new(TensorType::Float32, vec![1, 8, 8, 4]))
            .constant(1, TensorInfo::constant_f32(vec![1, 3, 3, 8], &[1.0; 72]))
            .constant(2, TensorInfo::constant_f32(vec![8], &[0.0; 8]));
        let out = fx.translate(&depthwise(vec![0, 1, 2])).unwrap();
        assert_eq!(out.shape, vec![1, 8, 8, 8]);

        let group_conv = fx.producer(&out, 1);
        assert_eq!(group_conv.op.name(), "GroupConvolution");
        let filter = fx.node(group_conv.inputs[1]);
        assert_eq!(filter.shape, vec![4, 2, 1, 3, 3]);
    }

    #[test]
    fn parameter_filter_uses_channel_first_order() {
        let mut fx = Fixture::new();
        fx.input(0, TensorInfo::new(TensorType::Float32, vec![1, 6, 6, 2]))
            .input(1, TensorInfo::new(TensorType::Float32, vec![1, 3, 3, 2]));
        let out = fx.translate(&depthwise(vec![0, 1])).unwrap();
        assert_eq!(out.op.name(), "GroupConvolution");
        assert_eq!(fx.node(out.inputs[1]).shape, vec![2, 1, 1, 3, 3]);
        assert_eq!(out.shape, vec![1, 2, 6, 6]);
    }

    #[test]
    fn indivisible_channels_fail() {
        let mut fx = Fixture::new();
        fx.input(0, TensorInfo::new(TensorType::Float32, vec![1, 8, 8, 3]))
            .constant(1, TensorInfo::constant_f32(vec![2, 3, 3, 4], &[1.0; 72]));
        assert!(matches!(
            fx.translate(&depthwise(vec![0, 1])),
            Err(Error::TranslationFailure(_))
        ));
    }
}
