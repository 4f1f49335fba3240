use super::{options_mismatch, LowerCx};
use crate::ir::{CoordinateTransformMode, InterpolateAttrs, NodeId, OvOp};
use crate::lower::Result;
use crate::tflite::{BuiltinOptions, ResizeBilinearOptions};

fn coordinate_mode(opts: &ResizeBilinearOptions) -> CoordinateTransformMode {
    if opts.align_corners {
        CoordinateTransformMode::AlignCorners
    } else if opts.half_pixel_centers {
        CoordinateTransformMode::HalfPixel
    } else {
        CoordinateTransformMode::Asymmetric
    }
}

/// Lower RESIZE_BILINEAR to Interpolate over the NCHW spatial axes, with
/// target sizes from operand 1.
pub fn lower_resize_bilinear(
    cx: &mut LowerCx<'_>,
    inputs: &[i32],
    options: &BuiltinOptions,
) -> Result<NodeId> {
    const OP: &str = "RESIZE_BILINEAR";
    let BuiltinOptions::ResizeBilinear(opts) = options else {
        return Err(options_mismatch(OP, options));
    };
    let input = cx.input(OP, inputs, 0)?;
    let sizes = cx.input(OP, inputs, 1)?;
    let axes = cx.graph.add_i32_constant(&[2, 3]);
    let attrs = InterpolateAttrs {
        coordinate_transformation_mode: coordinate_mode(opts),
    };
    Ok(cx
        .graph
        .add_op(OvOp::Interpolate(attrs), &[input, sizes, axes])?)
}
