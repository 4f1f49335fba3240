//! Static legality check run before any translation.

use super::{Error, Result};
use crate::tflite::{
    BuiltinOperator, BuiltinOptions, OpCode, ScheduledNode, Subgraph, TensorContext, TensorType,
    TRANSPOSE_CONV_BIAS,
};

type TypeSet = &'static [TensorType];
type RankSet = &'static [usize];

/// Allowed element types per input position and, where the op constrains
/// them, allowed ranks. A rank table also fixes the input count.
struct Rules {
    types: &'static [TypeSet],
    ranks: Option<&'static [RankSet]>,
}

const F32: TypeSet = &[TensorType::Float32];
const F16: TypeSet = &[TensorType::Float16];
const I32: TypeSet = &[TensorType::Int32];

const UP_TO_4: RankSet = &[1, 2, 3, 4];
const R4: RankSet = &[4];
const R1: RankSet = &[1];

const BINARY: Rules = Rules {
    types: &[F32, F32],
    ranks: Some(&[UP_TO_4, UP_TO_4]),
};
const FLOAT_UNARY: Rules = Rules {
    types: &[F32],
    ranks: None,
};
const CONV: Rules = Rules {
    types: &[F32, F32],
    ranks: Some(&[R4, R4]),
};
const CONV_BIAS: Rules = Rules {
    types: &[F32, F32, F32],
    ranks: Some(&[R4, R4, R1]),
};
const CONCAT: Rules = Rules {
    types: &[F32, F32],
    ranks: Some(&[R4, R4]),
};
const DEQUANTIZE: Rules = Rules {
    types: &[F16],
    ranks: None,
};
const RESHAPE: Rules = Rules {
    types: &[F32, I32],
    ranks: Some(&[UP_TO_4, R1]),
};
const MEAN: Rules = Rules {
    types: &[F32],
    ranks: Some(&[R4, R1]),
};
const TRANSPOSE_CONV: Rules = Rules {
    types: &[I32, F32, F32],
    ranks: Some(&[R1, R4, R4]),
};
const TRANSPOSE_CONV_WITH_BIAS: Rules = Rules {
    types: &[I32, F32, F32, F32],
    ranks: Some(&[R1, R4, R4, R1]),
};

fn rules_for(op: &OpCode, input_count: usize) -> Option<&'static Rules> {
    use BuiltinOperator as B;
    let rules = match op {
        OpCode::Custom(name) if name == TRANSPOSE_CONV_BIAS => &CONV_BIAS,
        OpCode::Custom(_) => return None,
        OpCode::Builtin(code) => match code {
            B::Add | B::Mul => &BINARY,
            B::AveragePool2d | B::MaxPool2d => &FLOAT_UNARY,
            B::Conv2d | B::DepthwiseConv2d if input_count == 2 => &CONV,
            B::Conv2d | B::DepthwiseConv2d => &CONV_BIAS,
            B::Concatenation => &CONCAT,
            B::Dequantize => &DEQUANTIZE,
            B::ResizeBilinear | B::Relu | B::Relu6 | B::Logistic | B::HardSwish | B::Tanh => {
                &FLOAT_UNARY
            }
            B::Softmax => &FLOAT_UNARY,
            B::Reshape => &RESHAPE,
            B::Mean => &MEAN,
            B::TransposeConv if input_count == 3 => &TRANSPOSE_CONV,
            B::TransposeConv => &TRANSPOSE_CONV_WITH_BIAS,
            _ => return None,
        },
    };
    Some(rules)
}

fn options_match(op: &OpCode, options: &BuiltinOptions) -> bool {
    use BuiltinOperator as B;
    match (op, options) {
        (OpCode::Custom(_), BuiltinOptions::TransposeConv(_)) => true,
        (OpCode::Custom(_), _) => false,
        (OpCode::Builtin(code), options) => matches!(
            (code, options),
            (B::Add, BuiltinOptions::Add(_))
                | (B::Mul, BuiltinOptions::Mul(_))
                | (B::AveragePool2d | B::MaxPool2d, BuiltinOptions::Pool2d(_))
                | (B::Conv2d, BuiltinOptions::Conv2d(_))
                | (B::DepthwiseConv2d, BuiltinOptions::DepthwiseConv2d(_))
                | (B::Concatenation, BuiltinOptions::Concatenation(_))
                | (B::Mean, BuiltinOptions::Reducer(_))
                | (B::ResizeBilinear, BuiltinOptions::ResizeBilinear(_))
                | (B::Softmax, BuiltinOptions::Softmax(_))
                | (B::TransposeConv, BuiltinOptions::TransposeConv(_))
                | (B::Reshape, BuiltinOptions::Reshape(_) | BuiltinOptions::None)
                | (
                    B::Dequantize | B::HardSwish | B::Logistic | B::Relu | B::Relu6 | B::Tanh,
                    BuiltinOptions::None
                )
        ),
    }
}

/// Check one operation, reporting the first reason it cannot be delegated.
pub fn check_node(
    op: &OpCode,
    inputs: &[i32],
    options: &BuiltinOptions,
    tensors: &TensorContext,
) -> Result<()> {
    let rules =
        rules_for(op, inputs.len()).ok_or_else(|| Error::UnsupportedOperator(op.to_string()))?;

    let positions = match rules.ranks {
        Some(ranks) => {
            if inputs.len() != ranks.len() {
                return Err(Error::invalid(format!(
                    "expected {} inputs, got {}",
                    ranks.len(),
                    inputs.len()
                )));
            }
            ranks.len()
        }
        None => {
            if inputs.len() < rules.types.len() {
                return Err(Error::invalid(format!(
                    "expected at least {} inputs, got {}",
                    rules.types.len(),
                    inputs.len()
                )));
            }
            rules.types.len()
        }
    };

    for (position, &index) in inputs.iter().take(positions).enumerate() {
        if index < 0 {
            return Err(Error::MissingOperand(index));
        }
        let tensor = tensors.tensor(index)?;
        if let Some(types) = rules.types.get(position) {
            if !types.contains(&tensor.tensor_type) {
                return Err(Error::UnsupportedType(tensor.tensor_type));
            }
        }
        if let Some(ranks) = rules.ranks {
            if !ranks[position].contains(&tensor.num_dims()) {
                return Err(Error::UnsupportedRank(tensor.num_dims()));
            }
        }
        if tensor.num_dims() == 0 {
            return Err(Error::UnsupportedRank(0));
        }
        if tensor.dims.iter().any(|&d| d <= 0) || tensor.num_elements().is_none() {
            return Err(Error::DegenerateShape(tensor.dims.clone()));
        }
    }

    if !options_match(op, options) {
        return Err(Error::invalid(format!("{op} with options {options:?}")));
    }

    if let BuiltinOptions::Softmax(softmax) = options {
        if softmax.beta != 1.0 {
            return Err(Error::invalid(format!("softmax beta {} != 1", softmax.beta)));
        }
    }
    Ok(())
}

pub fn is_supported(
    op: &OpCode,
    inputs: &[i32],
    options: &BuiltinOptions,
    tensors: &TensorContext,
) -> bool {
    match check_node(op, inputs, options, tensors) {
        Ok(()) => true,
        Err(err) => {
            log::debug!("{op} not supported: {err}");
            false
        }
    }
}

pub fn is_node_supported(node: &ScheduledNode, tensors: &TensorContext) -> bool {
    match check_node(&node.op, &node.inputs, &node.options, tensors) {
        Ok(()) => true,
        Err(err) => {
            log::debug!("node {} ({}) not supported: {err}", node.id, node.op);
            false
        }
    }
}

/// Ids of the nodes that can be delegated, in schedule order.
pub fn supported_nodes(subgraph: &Subgraph, tensors: &TensorContext) -> Vec<i32> {
    subgraph
        .nodes
        .iter()
        .filter(|node| is_node_supported(node, tensors))
        .map(|node| node.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tflite::{
        ArithmeticOptions, ConcatenationOptions, Conv2dOptions, DepthwiseConv2dOptions,
        Pool2dOptions, ReducerOptions, ReshapeOptions, ResizeBilinearOptions, SoftmaxOptions,
        TensorInfo, TransposeConvOptions,
    };

    fn f32_tensor(dims: &[i32]) -> TensorInfo {
        TensorInfo::new(TensorType::Float32, dims.to_vec())
    }

    fn context(tensors: &[(i32, TensorInfo)]) -> TensorContext {
        tensors.iter().cloned().collect()
    }

    fn builtin(op: BuiltinOperator) -> OpCode {
        OpCode::Builtin(op)
    }

    #[test]
    fn add_table() {
        let add = builtin(BuiltinOperator::Add);
        let opts = BuiltinOptions::Add(ArithmeticOptions::default());
        let cases: Vec<(TensorInfo, TensorInfo, bool)> = vec![
            (f32_tensor(&[1, 2, 2, 3]), f32_tensor(&[1, 2, 2, 3]), true),
            (f32_tensor(&[8]), f32_tensor(&[8]), true),
            (
                f32_tensor(&[1, 2, 2, 3]),
                TensorInfo::new(TensorType::Int32, vec![1, 2, 2, 3]),
                false,
            ),
            (f32_tensor(&[1, 1, 2, 2, 3]), f32_tensor(&[1, 2, 2, 3]), false),
            (f32_tensor(&[1, 0, 2, 3]), f32_tensor(&[1, 2, 2, 3]), false),
        ];
        for (lhs, rhs, expected) in cases {
            let tensors = context(&[(0, lhs.clone()), (1, rhs.clone())]);
            assert_eq!(
                is_supported(&add, &[0, 1], &opts, &tensors),
                expected,
                "{lhs:?} + {rhs:?}"
            );
        }
    }

    #[test]
    fn allow_list_table() {
        const NHWC: i32 = 0;
        const VEC: i32 = 1;
        const RANK5: i32 = 2;
        const I32_NHWC: i32 = 3;
        const AXES: i32 = 4;
        const HALF: i32 = 5;
        const FILTER: i32 = 6;
        const OUT_SHAPE: i32 = 7;
        const MATRIX: i32 = 8;
        const SCALAR: i32 = 9;
        let tensors = context(&[
            (NHWC, f32_tensor(&[1, 8, 8, 4])),
            (VEC, f32_tensor(&[4])),
            (RANK5, f32_tensor(&[1, 1, 8, 8, 4])),
            (I32_NHWC, TensorInfo::new(TensorType::Int32, vec![1, 8, 8, 4])),
            (AXES, TensorInfo::constant_i32(vec![2], &[1, 2])),
            (HALF, TensorInfo::new(TensorType::Float16, vec![4])),
            (FILTER, f32_tensor(&[4, 3, 3, 4])),
            (OUT_SHAPE, TensorInfo::constant_i32(vec![4], &[1, 16, 16, 4])),
            (MATRIX, f32_tensor(&[2, 16])),
            (SCALAR, f32_tensor(&[])),
        ]);

        use BuiltinOperator as B;
        let none = BuiltinOptions::None;
        let mul = BuiltinOptions::Mul(ArithmeticOptions::default());
        let pool = BuiltinOptions::Pool2d(Pool2dOptions::default());
        let concat = BuiltinOptions::Concatenation(ConcatenationOptions { axis: 3, ..Default::default() });
        let reshape = BuiltinOptions::Reshape(ReshapeOptions::default());
        let mean = BuiltinOptions::Reducer(ReducerOptions::default());
        let resize = BuiltinOptions::ResizeBilinear(ResizeBilinearOptions::default());
        let depthwise = BuiltinOptions::DepthwiseConv2d(DepthwiseConv2dOptions::default());
        let conv = BuiltinOptions::Conv2d(Conv2dOptions::default());
        let tconv = BuiltinOptions::TransposeConv(TransposeConvOptions::default());
        let softmax = BuiltinOptions::Softmax(SoftmaxOptions::default());
        let bias_op = OpCode::Custom(TRANSPOSE_CONV_BIAS.into());

        let cases: Vec<(OpCode, Vec<i32>, &BuiltinOptions, bool)> = vec![
            (builtin(B::Mul), vec![NHWC, NHWC], &mul, true),
            (builtin(B::Mul), vec![VEC, MATRIX], &mul, true),
            (builtin(B::Mul), vec![NHWC, I32_NHWC], &mul, false),
            (builtin(B::Mul), vec![NHWC, RANK5], &mul, false),
            (builtin(B::Mul), vec![NHWC], &mul, false),
            (builtin(B::AveragePool2d), vec![NHWC], &pool, true),
            (builtin(B::AveragePool2d), vec![I32_NHWC], &pool, false),
            (builtin(B::AveragePool2d), vec![SCALAR], &pool, false),
            (builtin(B::MaxPool2d), vec![NHWC], &pool, true),
            (builtin(B::MaxPool2d), vec![I32_NHWC], &pool, false),
            (builtin(B::MaxPool2d), vec![SCALAR], &pool, false),
            (builtin(B::MaxPool2d), vec![NHWC], &none, false),
            (builtin(B::Concatenation), vec![NHWC, NHWC], &concat, true),
            (builtin(B::Concatenation), vec![NHWC, NHWC, NHWC], &concat, false),
            (builtin(B::Concatenation), vec![NHWC, I32_NHWC], &concat, false),
            (builtin(B::Concatenation), vec![NHWC, MATRIX], &concat, false),
            (builtin(B::Reshape), vec![NHWC, AXES], &reshape, true),
            (builtin(B::Reshape), vec![MATRIX, AXES], &none, true),
            (builtin(B::Reshape), vec![I32_NHWC, AXES], &reshape, false),
            (builtin(B::Reshape), vec![NHWC, VEC], &reshape, false),
            (builtin(B::Reshape), vec![RANK5, AXES], &reshape, false),
            (builtin(B::Reshape), vec![NHWC, I32_NHWC], &reshape, false),
            (builtin(B::Mean), vec![NHWC, AXES], &mean, true),
            (builtin(B::Mean), vec![I32_NHWC, AXES], &mean, false),
            (builtin(B::Mean), vec![MATRIX, AXES], &mean, false),
            (builtin(B::Mean), vec![NHWC], &mean, false),
            (builtin(B::ResizeBilinear), vec![NHWC, AXES], &resize, true),
            (builtin(B::ResizeBilinear), vec![I32_NHWC, AXES], &resize, false),
            (builtin(B::ResizeBilinear), vec![SCALAR, AXES], &resize, false),
            (builtin(B::Logistic), vec![NHWC], &none, true),
            (builtin(B::Logistic), vec![I32_NHWC], &none, false),
            (builtin(B::Logistic), vec![SCALAR], &none, false),
            (builtin(B::HardSwish), vec![NHWC], &none, true),
            (builtin(B::HardSwish), vec![I32_NHWC], &none, false),
            (builtin(B::HardSwish), vec![SCALAR], &none, false),
            (builtin(B::Relu6), vec![MATRIX], &none, true),
            (builtin(B::Relu6), vec![I32_NHWC], &none, false),
            (builtin(B::Relu6), vec![SCALAR], &none, false),
            (builtin(B::Relu), vec![VEC], &none, true),
            (builtin(B::Relu), vec![HALF], &none, false),
            (builtin(B::Tanh), vec![NHWC], &none, true),
            (builtin(B::Tanh), vec![SCALAR], &none, false),
            (builtin(B::Softmax), vec![MATRIX], &softmax, true),
            (builtin(B::Softmax), vec![I32_NHWC], &softmax, false),
            (builtin(B::Softmax), vec![SCALAR], &softmax, false),
            (builtin(B::Dequantize), vec![HALF], &none, true),
            (builtin(B::Dequantize), vec![VEC], &none, false),
            (builtin(B::Conv2d), vec![NHWC, FILTER, VEC], &conv, true),
            (builtin(B::Conv2d), vec![I32_NHWC, FILTER], &conv, false),
            (builtin(B::Conv2d), vec![MATRIX, FILTER], &conv, false),
            (builtin(B::DepthwiseConv2d), vec![NHWC, FILTER], &depthwise, true),
            (builtin(B::DepthwiseConv2d), vec![NHWC, FILTER, VEC], &depthwise, true),
            (builtin(B::DepthwiseConv2d), vec![NHWC, FILTER, VEC, VEC], &depthwise, false),
            (builtin(B::DepthwiseConv2d), vec![I32_NHWC, FILTER, VEC], &depthwise, false),
            (builtin(B::DepthwiseConv2d), vec![NHWC, FILTER, MATRIX], &depthwise, false),
            (builtin(B::TransposeConv), vec![OUT_SHAPE, FILTER, NHWC], &tconv, true),
            (builtin(B::TransposeConv), vec![OUT_SHAPE, FILTER, NHWC, VEC], &tconv, true),
            (builtin(B::TransposeConv), vec![VEC, FILTER, NHWC], &tconv, false),
            (builtin(B::TransposeConv), vec![OUT_SHAPE, FILTER, RANK5], &tconv, false),
            (bias_op.clone(), vec![NHWC, FILTER, VEC], &tconv, true),
            (bias_op.clone(), vec![NHWC, FILTER], &tconv, false),
            (bias_op.clone(), vec![NHWC, FILTER, VEC, VEC], &tconv, false),
            (bias_op.clone(), vec![I32_NHWC, FILTER, VEC], &tconv, false),
            (bias_op, vec![MATRIX, FILTER, VEC], &tconv, false),
        ];
        for (op, inputs, options, expected) in cases {
            assert_eq!(
                is_supported(&op, &inputs, options, &tensors),
                expected,
                "{op} {inputs:?} {options:?}"
            );
        }
    }

    #[test]
    fn zero_sized_input_rejected() {
        let tensors = context(&[(0, f32_tensor(&[1, 0, 2, 3]))]);
        assert!(matches!(
            check_node(&builtin(BuiltinOperator::Relu), &[0], &BuiltinOptions::None, &tensors),
            Err(Error::DegenerateShape(_))
        ));
    }

    #[test]
    fn conv_bias_must_be_rank_one() {
        let tensors = context(&[
            (0, f32_tensor(&[1, 8, 8, 3])),
            (1, f32_tensor(&[4, 3, 3, 3])),
            (2, f32_tensor(&[4])),
            (3, f32_tensor(&[1, 4])),
        ]);
        let conv = builtin(BuiltinOperator::Conv2d);
        let opts = BuiltinOptions::Conv2d(Conv2dOptions::default());
        assert!(is_supported(&conv, &[0, 1], &opts, &tensors));
        assert!(is_supported(&conv, &[0, 1, 2], &opts, &tensors));
        assert!(matches!(
            check_node(&conv, &[0, 1, 3], &opts, &tensors),
            Err(Error::UnsupportedRank(2))
        ));
    }

    #[test]
    fn unknown_ops_and_custom_names() {
        let tensors = context(&[
            (0, f32_tensor(&[1, 4, 4, 8])),
            (1, f32_tensor(&[8, 3, 3, 4])),
            (2, f32_tensor(&[4])),
        ]);
        assert!(!is_supported(
            &builtin(BuiltinOperator::Sub),
            &[0, 0],
            &BuiltinOptions::None,
            &tensors
        ));
        let opts = BuiltinOptions::TransposeConv(TransposeConvOptions::default());
        assert!(is_supported(
            &OpCode::Custom(TRANSPOSE_CONV_BIAS.into()),
            &[0, 1, 2],
            &opts,
            &tensors
        ));
        assert!(matches!(
            check_node(&OpCode::Custom("MaxPoolingWithArgmax2D".into()), &[0], &opts, &tensors),
            Err(Error::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn dequantize_wants_f16() {
        let tensors = context(&[
            (0, TensorInfo::new(TensorType::Float16, vec![4])),
            (1, f32_tensor(&[4])),
        ]);
        let op = builtin(BuiltinOperator::Dequantize);
        assert!(is_supported(&op, &[0], &BuiltinOptions::None, &tensors));
        assert!(!is_supported(&op, &[1], &BuiltinOptions::None, &tensors));
    }

    #[test]
    fn softmax_beta_gate() {
        let tensors = context(&[(0, f32_tensor(&[1, 10]))]);
        let op = builtin(BuiltinOperator::Softmax);
        let unit = BuiltinOptions::Softmax(SoftmaxOptions { beta: 1.0 });
        let scaled = BuiltinOptions::Softmax(SoftmaxOptions { beta: 0.5 });
        assert!(is_supported(&op, &[0], &unit, &tensors));
        assert!(!is_supported(&op, &[0], &scaled, &tensors));
    }

    #[test]
    fn missing_operands_are_unsupported() {
        let tensors = context(&[(0, f32_tensor(&[1, 4, 4, 8]))]);
        let add = builtin(BuiltinOperator::Add);
        let opts = BuiltinOptions::Add(ArithmeticOptions::default());
        assert!(!is_supported(&add, &[0], &opts, &tensors));
        assert!(!is_supported(&add, &[0, 5], &opts, &tensors));
        assert!(!is_supported(&add, &[0, -1], &opts, &tensors));
    }

    #[test]
    fn mismatched_options_are_unsupported() {
        let tensors = context(&[(0, f32_tensor(&[1, 4])), (1, f32_tensor(&[1, 4]))]);
        let opts = BuiltinOptions::Mul(ArithmeticOptions::default());
        assert!(!is_supported(&builtin(BuiltinOperator::Add), &[0, 1], &opts, &tensors));
    }

    #[test]
    fn transpose_conv_tables() {
        let tensors = context(&[
            (0, TensorInfo::constant_i32(vec![4], &[1, 8, 8, 2])),
            (1, f32_tensor(&[2, 3, 3, 4])),
            (2, f32_tensor(&[1, 4, 4, 4])),
            (3, f32_tensor(&[2])),
        ]);
        let op = builtin(BuiltinOperator::TransposeConv);
        let opts = BuiltinOptions::TransposeConv(TransposeConvOptions::default());
        assert!(is_supported(&op, &[0, 1, 2], &opts, &tensors));
        assert!(is_supported(&op, &[0, 1, 2, 3], &opts, &tensors));
        assert!(!is_supported(&op, &[1, 1, 2], &opts, &tensors));
    }

    #[test]
    fn partition_keeps_schedule_order() {
        let tensors = context(&[(0, f32_tensor(&[1, 4])), (1, f32_tensor(&[1, 4]))]);
        let subgraph = Subgraph {
            inputs: vec![0],
            outputs: vec![1],
            nodes: vec![
                ScheduledNode::builtin(4, BuiltinOperator::Relu, vec![0], vec![1], BuiltinOptions::None),
                ScheduledNode::builtin(5, BuiltinOperator::Pad, vec![1], vec![0], BuiltinOptions::None),
                ScheduledNode::builtin(6, BuiltinOperator::Tanh, vec![1], vec![0], BuiltinOptions::None),
            ],
        };
        assert_eq!(supported_nodes(&subgraph, &tensors), vec![4, 6]);
    }
}
