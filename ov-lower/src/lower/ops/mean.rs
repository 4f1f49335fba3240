use super::{options_mismatch, LowerCx};
use crate::ir::{NodeId, OvOp};
use crate::lower::{Error, Result};
use crate::tflite::BuiltinOptions;

/// NHWC axis to NCHW axis.
fn remap_axis(axis: i32) -> i32 {
    match axis {
        1 => 2,
        2 => 3,
        3 => 1,
        other => other,
    }
}

/// Lower MEAN. The axes operand must carry i32 data; axes are renumbered
/// for the NCHW layout.
pub fn lower_mean(cx: &mut LowerCx<'_>, inputs: &[i32], options: &BuiltinOptions) -> Result<NodeId> {
    const OP: &str = "MEAN";
    let BuiltinOptions::Reducer(opts) = options else {
        return Err(options_mismatch(OP, options));
    };
    let input = cx.input(OP, inputs, 0)?;
    let axes_index = *inputs
        .get(1)
        .ok_or_else(|| Error::translation(OP, "missing axes"))?;
    let axes = cx
        .tensors
        .tensor(axes_index)?
        .read_i32s()
        .filter(|axes| !axes.is_empty())
        .ok_or_else(|| Error::translation(OP, "axes carry no i32 data"))?;

    let axes: Vec<i32> = axes.into_iter().map(remap_axis).collect();
    log::trace!("{OP}: reducing NCHW axes {axes:?}");
    let axes = cx.graph.add_i32_constant(&axes);
    Ok(cx.graph.add_op(
        OvOp::ReduceMean {
            keep_dims: opts.keep_dims,
        },
        &[input, axes],
    )?)
}

#[cfg(test)]
mod tests {
    use super::remap_axis;
    use crate::lower::ops::testing::Fixture;
    use crate::lower::Error;
    use crate::tflite::{
        BuiltinOperator, BuiltinOptions, ReducerOptions, ScheduledNode, TensorInfo, TensorType,
    };

    fn mean(keep_dims: bool) -> ScheduledNode {
        ScheduledNode::builtin(
            0,
            BuiltinOperator::Mean,
            vec![0, 1],
            vec![2],
            BuiltinOptions::Reducer(ReducerOptions { keep_dims }),
        )
    }

    #[test]
    fn axes_remapped() {
        assert_eq!(remap_axis(0), 0);
        assert_eq!(remap_axis(1), 2);
        assert_eq!(remap_axis(2), 3);
        assert_eq!(remap_axis(3), 1);
    }

    #[test]
    fn spatial_mean() {
        let mut fx = Fixture::new();
        fx.input(0, TensorInfo::new(TensorType::Float32, vec![1, 7, 7, 16]))
            .constant(1, TensorInfo::constant_i32(vec![2], &[1, 2]));
        let out = fx.translate(&mean(true)).unwrap();
        assert_eq!(out.shape, vec![1, 16, 1, 1]);
        assert_eq!(
            fx.builder.graph().constant_values(out.inputs[1]),
            Some(vec![2, 3])
        );

        let dropped = fx.translate(&mean(false)).unwrap();
        assert_eq!(dropped.shape, vec![1, 16]);
    }

    #[test]
    fn axes_without_data_fail() {
        let mut fx = Fixture::new();
        fx.input(0, TensorInfo::new(TensorType::Float32, vec![1, 7, 7, 16]))
            .tensor(1, TensorInfo::new(TensorType::Int32, vec![2]));
        assert!(matches!(
            fx.translate(&mean(true)),
            Err(Error::TranslationFailure(_))
        ));
    }
}
