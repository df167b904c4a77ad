//! Scheduled compute nodes.

use std::collections::BTreeSet;
use std::fmt;

use crate::id::{NodeId, ParamId, StreamId, TensorId};

/// Whether a node is an ordinary kernel or a collective/communication
/// operation whose buffers must be laid out contiguously.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Ordinary compute kernel.
    Compute,
    /// Collective/communication operation.
    Collective,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compute => f.write_str("Compute"),
            Self::Collective => f.write_str("Collective"),
        }
    }
}

/// One scheduled compute step.
///
/// Identity (id, name, kind, stream) is fixed at build time; tensor
/// lists and ancestors are filled in by lifetime resolution and the
/// closure stage.
#[derive(Clone, Debug)]
pub struct Node {
    /// Dense id, equal to the node's position in the linearized schedule.
    pub id: NodeId,
    /// Human-readable name for logs and dumps.
    pub name: String,
    /// Node category.
    pub kind: NodeKind,
    /// Owning stream.
    pub stream: StreamId,
    /// Consumed tensors, in input order (parameter inputs excluded).
    pub inputs: Vec<TensorId>,
    /// Parameter inputs keyed by real input position.
    pub input_params: Vec<(usize, ParamId)>,
    /// Produced tensors, in output order.
    pub outputs: Vec<TensorId>,
    /// Workspace tensors, in declaration order.
    pub workspaces: Vec<TensorId>,
    /// Direct predecessors beyond simple stream order: data dependencies,
    /// cross-stream sync edges, and the stream/group edges added by the
    /// closure stage.
    pub ancestors: BTreeSet<NodeId>,
}

impl Node {
    /// Create a node with empty tensor lists.
    #[must_use]
    pub fn new(id: NodeId, name: impl Into<String>, kind: NodeKind, stream: StreamId) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            stream,
            inputs: Vec::new(),
            input_params: Vec::new(),
            outputs: Vec::new(),
            workspaces: Vec::new(),
            ancestors: BTreeSet::new(),
        }
    }
}
