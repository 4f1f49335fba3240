//! Assembles one IR model from registered operands and translated nodes.

use super::layout::{convert_nchw_to_nhwc, convert_nhwc_to_nchw, map_element_type};
use super::node_manager::NodeManager;
use super::ops::{LowerCx, OpTranslator};
use super::{Error, Result};
use crate::ir::{Graph, Model, NodeId};
use crate::tflite::{ScheduledNode, TensorContext, TensorInfo};

fn ir_shape(dims: &[i32]) -> Result<Vec<usize>> {
    if dims.iter().any(|&d| d <= 0) {
        return Err(Error::DegenerateShape(dims.to_vec()));
    }
    Ok(dims.iter().map(|&d| d as usize).collect())
}

#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: Graph,
    nodes: NodeManager,
    input_params: Vec<NodeId>,
    result_nodes: Vec<NodeId>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a graph input. The Parameter keeps the host NHWC shape and
    /// is converted to NCHW before being bound to `index`.
    pub fn register_input(&mut self, tensor: &TensorInfo, index: i32) -> Result<()> {
        if index < 0 {
            return Err(Error::invalid(format!("input operand index {index}")));
        }
        if tensor.dims.is_empty() {
            return Err(Error::invalid(format!("input {index} has no dims")));
        }
        if tensor.dims.len() > 4 {
            return Err(Error::UnsupportedRank(tensor.dims.len()));
        }
        let element_type = map_element_type(tensor.tensor_type)?;
        let shape = ir_shape(&tensor.dims)?;

        let param = self.graph.add_parameter(element_type, shape);
        let converted = convert_nhwc_to_nchw(&mut self.graph, &tensor.dims, param)?;
        self.input_params.push(param);
        self.nodes.set_output_at_operand_index(index, converted);
        self.nodes.insert_index_parameter(index);
        log::debug!("input {index}: parameter %{param} {:?}", tensor.dims);
        Ok(())
    }

    /// Register a read-only tensor as a Constant holding its bytes verbatim.
    pub fn register_constant(&mut self, tensor: &TensorInfo, index: i32) -> Result<()> {
        if index < 0 {
            return Err(Error::invalid(format!("constant operand index {index}")));
        }
        if tensor.dims.is_empty() {
            return Err(Error::invalid(format!("constant {index} has no dims")));
        }
        let data = tensor
            .data
            .as_ref()
            .ok_or_else(|| Error::invalid(format!("constant {index} has no data")))?;
        let element_type = map_element_type(tensor.tensor_type)?;
        let shape = ir_shape(&tensor.dims)?;
        let expected = tensor
            .byte_size()
            .ok_or_else(|| Error::DegenerateShape(tensor.dims.clone()))?;
        if data.len() != expected {
            return Err(Error::invalid(format!(
                "constant {index}: payload is {} bytes, shape needs {expected}",
                data.len()
            )));
        }

        let node = self
            .graph
            .add_constant(element_type, shape, data.clone())
            .map_err(|err| Error::invalid(format!("constant {index}: {err}")))?;
        self.nodes.set_output_at_operand_index(index, node);
        log::trace!("constant {index}: %{node} {:?}", tensor.dims);
        Ok(())
    }

    /// Translate one scheduled node and bind its first output.
    pub fn translate_node(
        &mut self,
        node_id: i32,
        node: &ScheduledNode,
        tensors: &TensorContext,
    ) -> Result<()> {
        if node_id < 0 {
            return Err(Error::invalid(format!("node id {node_id}")));
        }
        let output = *node
            .outputs
            .first()
            .ok_or_else(|| Error::invalid(format!("node {node_id} has no outputs")))?;
        let translator = OpTranslator::for_op_code(&node.op)?;

        let mut cx = LowerCx {
            graph: &mut self.graph,
            nodes: &self.nodes,
            tensors,
        };
        let result = translator.lower(&mut cx, &node.inputs, &node.options)?;
        self.nodes.set_output_at_operand_index(output, result);
        log::debug!("node {node_id} ({}): operand {output} = %{result}", node.op);
        Ok(())
    }

    /// Append the nodes bound to `outputs` as model results, converting
    /// rank-4 results back to NHWC.
    pub fn finalize(&mut self, outputs: &[i32]) -> Result<()> {
        if outputs.is_empty() {
            return Err(Error::invalid("no outputs to finalize"));
        }
        let mut results = Vec::with_capacity(outputs.len());
        for &index in outputs {
            let node = self.nodes.interim_node_output(index)?;
            let result = if self.graph.node(node).rank() == 4 {
                convert_nchw_to_nhwc(&mut self.graph, node)?
            } else {
                node
            };
            results.push(result);
        }
        self.result_nodes.extend(results);
        Ok(())
    }

    pub fn node_manager_size(&self) -> usize {
        self.nodes.node_count()
    }

    pub fn node_manager(&self) -> &NodeManager {
        &self.nodes
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn finish(self) -> Model {
        Model {
            graph: self.graph,
            parameters: self.input_params,
            results: self.result_nodes,
        }
    }
}
