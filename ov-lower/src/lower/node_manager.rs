use std::collections::{BTreeMap, HashSet};

use super::{Error, Result};
use crate::ir::NodeId;

/// Operand index to IR node bookkeeping for one lowering.
#[derive(Debug, Default)]
pub struct NodeManager {
    outputs: BTreeMap<i32, NodeId>,
    params: HashSet<i32>,
}

impl NodeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `index` to `node`, replacing any earlier binding.
    pub fn set_output_at_operand_index(&mut self, index: i32, node: NodeId) {
        if let Some(previous) = self.outputs.insert(index, node) {
            log::trace!("operand {index}: %{previous} replaced by %{node}");
        }
    }

    pub fn interim_node_output(&self, index: i32) -> Result<NodeId> {
        self.outputs
            .get(&index)
            .copied()
            .ok_or(Error::MissingOperand(index))
    }

    pub fn contains(&self, index: i32) -> bool {
        self.outputs.contains_key(&index)
    }

    pub fn insert_index_parameter(&mut self, index: i32) {
        self.params.insert(index);
    }

    pub fn is_index_a_param(&self, index: i32) -> bool {
        self.params.contains(&index)
    }

    /// Number of distinct operand indices with a bound node.
    pub fn node_count(&self) -> usize {
        self.outputs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebinding_overwrites() {
        let mut nodes = NodeManager::new();
        nodes.set_output_at_operand_index(3, 10);
        nodes.set_output_at_operand_index(3, 11);
        assert_eq!(nodes.interim_node_output(3).unwrap(), 11);
        assert_eq!(nodes.node_count(), 1);
    }

    #[test]
    fn missing_index_is_an_error() {
        let nodes = NodeManager::new();
        assert!(matches!(
            nodes.interim_node_output(4),
            Err(Error::MissingOperand(4))
        ));
    }

    #[test]
    fn parameters_tracked_separately() {
        let mut nodes = NodeManager::new();
        nodes.insert_index_parameter(0);
        assert!(nodes.is_index_a_param(0));
        assert!(!nodes.is_index_a_param(1));
        assert_eq!(nodes.node_count(), 0);
    }
}
