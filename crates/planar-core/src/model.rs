//! The in-memory planning model produced by the builder and consumed by
//! every pipeline stage.
//!
//! All entity lookup goes through dense-index `Vec`s owned by [`Model`];
//! there is no global registry. A `Model` is exclusively owned by one
//! planning run and is not meant to be shared across concurrent plans.

use indexmap::IndexMap;

use crate::error::PlanError;
use crate::id::{NodeId, ParamId, StreamId, TensorId};
use crate::node::Node;
use crate::tensor::Tensor;

/// An ordered sequence of nodes executing strictly in sequence on one
/// logical lane.
#[derive(Clone, Debug)]
pub struct Stream {
    /// Stream id as given by the external schedule. Not necessarily dense.
    pub id: StreamId,
    /// Node ids in schedule order.
    pub nodes: Vec<NodeId>,
}

/// A non-tensor input with a pre-existing backing address.
///
/// Tracked for dump output only; excluded from reuse computation.
#[derive(Clone, Debug)]
pub struct Parameter {
    /// Dense id.
    pub id: ParamId,
    /// Name of the producing entity.
    pub source: String,
    /// Output index on the producing entity.
    pub output_index: usize,
    /// Backing size in bytes.
    pub size: u64,
}

/// The complete planning model for one graph.
#[derive(Clone, Debug, Default)]
pub struct Model {
    /// External identifier of the source graph.
    pub graph_id: u32,
    /// Nodes indexed by [`NodeId`].
    pub nodes: Vec<Node>,
    /// Tensors indexed by [`TensorId`].
    pub tensors: Vec<Tensor>,
    /// Streams in order of first appearance, addressable by id.
    pub streams: IndexMap<StreamId, Stream>,
    /// Ordered stream chains: the last node of each stream must complete
    /// before the first node of the next stream in the chain.
    pub stream_groups: Vec<Vec<StreamId>>,
    /// Parameters indexed by [`ParamId`].
    pub parameters: Vec<Parameter>,
    /// Aliasing constraints: each list resolves to one offset.
    pub ref_groups: Vec<Vec<TensorId>>,
    /// Contiguous layout constraints, in list order.
    pub contiguous_groups: Vec<Vec<TensorId>>,
    /// Total aligned size of collective input buffers, accumulated while
    /// grouping and reported by diagnostics.
    pub comm_input_total: u64,
    /// Total aligned size of collective output buffers.
    pub comm_output_total: u64,
}

impl Model {
    /// Look up a node, failing fatally on an unknown id.
    pub fn node(&self, id: NodeId) -> Result<&Node, PlanError> {
        self.nodes.get(id.index()).ok_or(PlanError::UnknownNode { node: id })
    }

    /// Look up a tensor, failing fatally on an unknown id.
    pub fn tensor(&self, id: TensorId) -> Result<&Tensor, PlanError> {
        self.tensors.get(id.index()).ok_or(PlanError::DanglingTensor { tensor: id })
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of tensors.
    #[must_use]
    pub fn tensor_count(&self) -> usize {
        self.tensors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    #[test]
    fn unknown_lookups_are_fatal() {
        let model = Model::default();
        assert!(matches!(
            model.node(NodeId(0)),
            Err(PlanError::UnknownNode { .. })
        ));
        assert!(matches!(
            model.tensor(TensorId(3)),
            Err(PlanError::DanglingTensor { .. })
        ));
    }

    #[test]
    fn dense_lookup_by_id() {
        let mut model = Model::default();
        model.nodes.push(Node::new(NodeId(0), "a", NodeKind::Compute, StreamId(0)));
        model.nodes.push(Node::new(NodeId(1), "b", NodeKind::Compute, StreamId(0)));
        assert_eq!(model.node(NodeId(1)).unwrap().name, "b");
    }
}
