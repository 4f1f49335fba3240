use super::{apply_activation, bias_add, options_mismatch, positive, LowerCx};
use crate::ir::{ConvAttrs, NodeId, OvOp, PadType};
use crate::lower::{Error, Result};
use crate::tflite::{BuiltinOptions, Padding, TransposeConvOptions};

/// Weights held as `[O, KH, KW, I]`, reordered to `[I, O, KH, KW]`.
const WEIGHTS_ORDER: [i64; 4] = [3, 0, 1, 2];
/// Graph-input weights, already `[O, I, KH, KW]` after layout conversion.
const PARAM_ORDER: [i64; 4] = [1, 0, 2, 3];

fn transpose_conv_options<'a>(op: &str, options: &'a BuiltinOptions) -> Result<&'a TransposeConvOptions> {
    match options {
        BuiltinOptions::TransposeConv(opts) => Ok(opts),
        other => Err(options_mismatch(op, other)),
    }
}

/// Emit ConvolutionBackpropData producing `spatial` output rows and columns.
fn backprop_data(
    cx: &mut LowerCx<'_>,
    op: &str,
    inputs: &[i32],
    input_pos: usize,
    weights_pos: usize,
    opts: &TransposeConvOptions,
    spatial: [i32; 2],
) -> Result<NodeId> {
    let input = cx.input(op, inputs, input_pos)?;
    let weights = cx.input(op, inputs, weights_pos)?;
    let order = if cx.is_param(inputs, weights_pos) {
        &PARAM_ORDER
    } else {
        &WEIGHTS_ORDER
    };
    let weights = cx.transpose(weights, order)?;

    let attrs = ConvAttrs {
        strides: [
            positive(op, "stride_height", opts.stride_height)?,
            positive(op, "stride_width", opts.stride_width)?,
        ],
        dilations: [1, 1],
        auto_pad: match opts.padding {
            Padding::Valid => PadType::Valid,
            Padding::Same | Padding::Unknown => PadType::SameUpper,
        },
    };
    let output_shape = cx.graph.add_i32_constant(&spatial);
    Ok(cx.graph.add_op(
        OvOp::ConvolutionBackpropData(attrs),
        &[input, weights, output_shape],
    )?)
}

/// Lower builtin TRANSPOSE_CONV. Inputs are (output_shape, weights, input[,
/// bias]); the output shape operand must carry NHWC data.
pub fn lower_transpose_conv(
    cx: &mut LowerCx<'_>,
    inputs: &[i32],
    options: &BuiltinOptions,
) -> Result<NodeId> {
    const OP: &str = "TRANSPOSE_CONV";
    let opts = transpose_conv_options(OP, options)?;
    let shape_index = *inputs
        .first()
        .ok_or_else(|| Error::translation(OP, "missing output shape"))?;
    let output_shape = cx
        .tensors
        .tensor(shape_index)?
        .read_i32s()
        .ok_or_else(|| Error::translation(OP, "output shape has no i32 data"))?;
    if output_shape.len() < 3 {
        return Err(Error::translation(
            OP,
            format!("output shape {output_shape:?} is not NHWC"),
        ));
    }

    let mut output = backprop_data(cx, OP, inputs, 2, 1, opts, [output_shape[1], output_shape[2]])?;
    if let Some(bias) = cx.optional_input(inputs, 3)? {
        let bias_dims = cx.dims(OP, inputs, 3)?.to_vec();
        output = bias_add(cx.graph, output, bias, &bias_dims)?;
    }
    apply_activation(cx.graph, output, opts.activation)
}

/// Lower the `Convolution2DTransposeBias` custom op: (input, weights, bias),
/// always upsampling the spatial dims by two.
pub fn lower_transpose_conv_bias(
    cx: &mut LowerCx<'_>,
    inputs: &[i32],
    options: &BuiltinOptions,
) -> Result<NodeId> {
    const OP: &str = "Convolution2DTransposeBias";
    let opts = transpose_conv_options(OP, options)?;
    let input_dims = cx.dims(OP, inputs, 0)?;
    if input_dims.len() < 3 {
        return Err(Error::translation(
            OP,
            format!("input dims {input_dims:?} are not NHWC"),
        ));
    }
    let spatial = [input_dims[1] * 2, input_dims[2] * 2];

    let output = backprop_data(cx, OP, inputs, 0, 1, opts, spatial)?;
    let bias = cx.input(OP, inputs, 2)?;
    let bias_dims = cx.dims(OP, inputs, 2)?.to_vec();
    bias_add(cx.graph, output, bias, &bias_dims)
}

#[cfg(test)]
mod tests {
    use crate::ir::{OvOp, PadType};
    use crate::lower::ops::testing::Fixture;
    use crate::lower::Error;
    use crate::tflite::{
        BuiltinOperator, BuiltinOptions, Padding, ScheduledNode, TensorInfo, TensorType,
        TransposeConvOptions,
    };

    fn options(padding: Padding) -> BuiltinOptions {
        BuiltinOptions::TransposeConv(TransposeConvOptions {
            padding,
            stride_width: 2,
            stride_height: 2,
            ..Default::default()
        })
    }

    fn fixture() -> Fixture {
        let mut fx = Fixture::new();
        fx.tensor(0, TensorInfo::constant_i32(vec![4], &[1, 8, 8, 2]))
            .constant(1, TensorInfo::constant_f32(vec![2, 3, 3, 4], &[0.1; 72]))
            .input(2, TensorInfo::new(TensorType::Float32, vec![1, 4, 4, 4]))
            .constant(3, TensorInfo::constant_f32(vec![2], &[0.0; 2]));
        fx
    }

    #[test]
    fn output_shape_comes_from_tensor_data() {
        let mut fx = fixture();
        let node = ScheduledNode::builtin(
            0,
            BuiltinOperator::TransposeConv,
            vec![0, 1, 2],
            vec![9],
            options(Padding::Unknown),
        );
        let out = fx.translate(&node).unwrap();
        let OvOp::ConvolutionBackpropData(attrs) = &out.op else {
            panic!("expected ConvolutionBackpropData, got {:?}", out.op);
        };
        assert_eq!(attrs.auto_pad, PadType::SameUpper);
        assert_eq!(attrs.dilations, [1, 1]);
        assert_eq!(out.shape, vec![1, 2, 8, 8]);
        assert_eq!(fx.node(out.inputs[1]).shape, vec![4, 2, 3, 3]);
        let sizes = out.inputs[2];
        assert_eq!(fx.builder.graph().constant_values(sizes), Some(vec![8, 8]));
    }

    #[test]
    fn optional_bias_is_added() {
        let mut fx = fixture();
        let node = ScheduledNode::builtin(
            0,
            BuiltinOperator::TransposeConv,
            vec![0, 1, 2, 3],
            vec![9],
            options(Padding::Valid),
        );
        let out = fx.translate(&node).unwrap();
        assert_eq!(out.op.name(), "Add");
        assert_eq!(out.shape, vec![1, 2, 8, 8]);
    }

    #[test]
    fn output_shape_without_data_fails() {
        let mut fx = fixture();
        fx.tensor(0, TensorInfo::new(TensorType::Int32, vec![4]));
        let node = ScheduledNode::builtin(
            0,
            BuiltinOperator::TransposeConv,
            vec![0, 1, 2],
            vec![9],
            options(Padding::Same),
        );
        assert!(matches!(fx.translate(&node), Err(Error::TranslationFailure(_))));
    }

    #[test]
    fn custom_op_doubles_spatial_dims() {
        let mut fx = Fixture::new();
        fx.input(0, TensorInfo::new(TensorType::Float32, vec![1, 5, 6, 4]))
            .constant(1, TensorInfo::constant_f32(vec![2, 3, 3, 4], &[0.1; 72]))
            .constant(2, TensorInfo::constant_f32(vec![2], &[0.0; 2]));
        let blob: Vec<u8> = [1i32, 2, 2].iter().flat_map(|v| v.to_le_bytes()).collect();
        let node = ScheduledNode::transpose_conv_bias(0, vec![0, 1, 2], vec![9], &blob).unwrap();
        let out = fx.translate(&node).unwrap();
        assert_eq!(out.op.name(), "Add");
        assert_eq!(out.shape, vec![1, 2, 10, 12]);
    }
}
