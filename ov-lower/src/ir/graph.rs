//! Node arena shared by the lowering passes.

use std::fmt;

use super::ov::{ElementType, OvOp};
use super::shape::{self, ShapeError};

pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub op: OvOp,
    pub inputs: Vec<NodeId>,
    /// Static output shape, inferred when the node is added.
    pub shape: Vec<usize>,
    pub element_type: ElementType,
}

impl Node {
    pub fn rank(&self) -> usize {
        self.shape.len()
    }
}

/// Append-only node arena. Nodes only reference earlier nodes, so the
/// insertion order is a valid topological order.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id < self.nodes.len()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    fn push(&mut self, op: OvOp, inputs: Vec<NodeId>, shape: Vec<usize>, element_type: ElementType) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            id,
            op,
            inputs,
            shape,
            element_type,
        });
        id
    }

    pub fn add_parameter(&mut self, element_type: ElementType, shape: Vec<usize>) -> NodeId {
        self.push(OvOp::Parameter, Vec::new(), shape, element_type)
    }

    /// Add a constant holding `data` verbatim. The byte length must match
    /// the packed size of `shape`.
    pub fn add_constant(
        &mut self,
        element_type: ElementType,
        shape: Vec<usize>,
        data: Vec<u8>,
    ) -> Result<NodeId, ShapeError> {
        let expected = shape::element_count(&shape)
            .and_then(|count| element_type.byte_len(count))
            .ok_or_else(|| ShapeError::Overflow(shape.clone()))?;
        if data.len() != expected {
            return Err(ShapeError::ConstantSize {
                expected,
                got: data.len(),
            });
        }
        Ok(self.push(OvOp::Constant { data }, Vec::new(), shape, element_type))
    }

    /// 1-D i32 constant.
    pub fn add_i32_constant(&mut self, values: &[i32]) -> NodeId {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(
            OvOp::Constant { data },
            Vec::new(),
            vec![values.len()],
            ElementType::I32,
        )
    }

    /// 1-D i64 constant.
    pub fn add_i64_constant(&mut self, values: &[i64]) -> NodeId {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(
            OvOp::Constant { data },
            Vec::new(),
            vec![values.len()],
            ElementType::I64,
        )
    }

    /// Add a computed node, inferring its output shape and element type.
    pub fn add_op(&mut self, op: OvOp, inputs: &[NodeId]) -> Result<NodeId, ShapeError> {
        if let Some(&missing) = inputs.iter().find(|&&i| !self.contains(i)) {
            return Err(ShapeError::UnknownNode(missing));
        }
        let (shape, element_type) = shape::infer(self, &op, inputs)?;
        Ok(self.push(op, inputs.to_vec(), shape, element_type))
    }

    /// Integer payload of a constant node, widened to i64.
    /// `None` for non-constant nodes and non-integral payloads.
    pub fn constant_values(&self, id: NodeId) -> Option<Vec<i64>> {
        let node = self.get(id)?;
        let OvOp::Constant { data } = &node.op else {
            return None;
        };
        let values = match node.element_type {
            ElementType::I8 => data.iter().map(|&b| b as i8 as i64).collect(),
            ElementType::U8 => data.iter().map(|&b| b as i64).collect(),
            ElementType::I16 => data
                .chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]) as i64)
                .collect(),
            ElementType::U16 => data
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]) as i64)
                .collect(),
            ElementType::I32 => data
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as i64)
                .collect(),
            ElementType::U32 => data
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as i64)
                .collect(),
            ElementType::I64 | ElementType::U64 => data
                .chunks_exact(8)
                .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect(),
            _ => return None,
        };
        Some(values)
    }
}

/// A finished graph: the arena plus ordered graph inputs and outputs.
#[derive(Debug)]
pub struct Model {
    pub graph: Graph,
    /// Parameter nodes in binding order.
    pub parameters: Vec<NodeId>,
    /// Result nodes in output declaration order.
    pub results: Vec<NodeId>,
}

impl Model {
    pub fn parameter(&self, i: usize) -> &Node {
        self.graph.node(self.parameters[i])
    }

    pub fn result(&self, i: usize) -> &Node {
        self.graph.node(self.results[i])
    }
}

fn write_ids(f: &mut fmt::Formatter<'_>, ids: &[NodeId]) -> fmt::Result {
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "%{id}")?;
    }
    Ok(())
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in self.graph.nodes() {
            write!(f, "%{} = {}", node.id, node.op.name())?;
            let attrs = node.op.attrs_summary();
            if !attrs.is_empty() {
                write!(f, "[{attrs}]")?;
            }
            f.write_str("(")?;
            write_ids(f, &node.inputs)?;
            writeln!(f, ") -> {}{:?}", node.element_type, node.shape)?;
        }
        f.write_str("parameters: ")?;
        write_ids(f, &self.parameters)?;
        f.write_str("\nresults: ")?;
        write_ids(f, &self.results)?;
        writeln!(f)
    }
}
