//! TFLite partition lowering into the IR.
//!
//! [`lower_subgraph`] is the entry point used for a delegated partition:
//! every node is checked with [`support::check_node`], its weight operands
//! become constants, graph inputs become parameters, and the node is handed
//! to its translator.

pub mod builder;
mod error;
pub mod layout;
pub mod node_manager;
pub mod ops;
pub mod support;

use std::collections::HashSet;

pub use builder::GraphBuilder;
pub use error::{Error, Result};
pub use node_manager::NodeManager;
pub use support::{is_node_supported, is_supported, supported_nodes};

use crate::config::DelegateOptions;
use crate::ir::Model;
use crate::tflite::{AllocationType, BuiltinOperator, OpCode, Subgraph, TensorContext};

/// A lowered partition ready to hand to the engine.
#[derive(Debug)]
pub struct LoweredSubgraph {
    pub model: Model,
    /// Operand indices bound to `model.parameters`, in the same order.
    pub compute_inputs: Vec<i32>,
    /// Operand indices bound to `model.results`, in the same order.
    pub outputs: Vec<i32>,
    /// Target device, carried through untouched.
    pub device: String,
}

pub fn lower_subgraph(
    subgraph: &Subgraph,
    tensors: &TensorContext,
    options: &DelegateOptions,
) -> Result<LoweredSubgraph> {
    if subgraph.nodes.is_empty() {
        return Err(Error::invalid("subgraph has no nodes"));
    }
    let graph_inputs: HashSet<i32> = subgraph.inputs.iter().copied().collect();
    let mut builder = GraphBuilder::new();
    let mut compute_inputs = Vec::new();

    for node in &subgraph.nodes {
        support::check_node(&node.op, &node.inputs, &node.options, tensors)?;

        let skip_first = node.op == OpCode::Builtin(BuiltinOperator::TransposeConv);
        for (k, &index) in node.inputs.iter().enumerate() {
            if index < 0 || (k == 0 && skip_first) {
                continue;
            }
            if builder.node_manager().contains(index) {
                continue;
            }
            let tensor = tensors.tensor(index)?;
            if tensor.allocation == AllocationType::MmapRo {
                builder.register_constant(tensor, index)?;
            } else if graph_inputs.contains(&index) {
                builder.register_input(tensor, index)?;
                compute_inputs.push(index);
            }
        }

        builder.translate_node(node.id, node, tensors)?;
    }

    builder.finalize(&subgraph.outputs)?;
    let model = builder.finish();
    log::info!(
        "lowered {} nodes into {} IR nodes for {}",
        subgraph.nodes.len(),
        model.graph.len(),
        options.device
    );
    Ok(LoweredSubgraph {
        model,
        compute_inputs,
        outputs: subgraph.outputs.clone(),
        device: options.device.clone(),
    })
}
