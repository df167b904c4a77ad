//! Fatal planning errors.
//!
//! Everything here aborts the planning run with no offsets produced.
//! Advisory conditions (cache mismatches, contiguous/ref bookkeeping
//! inconsistencies) are logged by the stages that detect them and never
//! surface as errors.

use std::error::Error;
use std::fmt;

use crate::id::{NodeId, TensorId};

/// Structural failures that abort a planning run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlanError {
    /// Two nodes resolved to the same dense id while indexing.
    DuplicateNodeId {
        /// The colliding id.
        node: NodeId,
    },
    /// A node id that no node carries.
    UnknownNode {
        /// The missing id.
        node: NodeId,
    },
    /// A tensor id that no tensor carries.
    DanglingTensor {
        /// The missing id.
        tensor: TensorId,
    },
    /// An input referenced a schedule step that does not exist or is not
    /// scheduled before the consumer.
    DanglingStep {
        /// Name of the consuming node.
        consumer: String,
        /// The referenced schedule position.
        step: usize,
    },
    /// An input or alias referenced an output index past the producer's
    /// declared output count.
    OutputIndexOutOfRange {
        /// Name of the producing node.
        producer: String,
        /// The out-of-range index.
        index: usize,
        /// The producer's declared output count.
        count: usize,
    },
    /// A workspace index past the node's declared workspace count.
    WorkspaceIndexOutOfRange {
        /// Name of the owning node.
        node: String,
        /// The out-of-range index.
        index: usize,
        /// The node's declared workspace count.
        count: usize,
    },
    /// An input consuming a tuple/bundle value directly. Bundles must be
    /// flattened by the schedule producer.
    TupleInput {
        /// Name of the consuming node.
        consumer: String,
        /// Position of the offending input.
        input: usize,
    },
    /// An in-place node with no input tensor to alias.
    InplaceWithoutInput {
        /// Name of the in-place node.
        node: String,
    },
    /// A contiguous list naming the same tensor twice.
    DuplicateContiguousMember {
        /// Name of the collective node.
        node: String,
        /// The repeated tensor.
        tensor: TensorId,
    },
    /// The packing solver reported failure. There is no partial plan.
    SolverFailed {
        /// Solver-provided description.
        reason: String,
    },
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateNodeId { node } => write!(f, "duplicate node id {node}"),
            Self::UnknownNode { node } => write!(f, "unknown node id {node}"),
            Self::DanglingTensor { tensor } => write!(f, "dangling tensor id {tensor}"),
            Self::DanglingStep { consumer, step } => {
                write!(f, "node '{consumer}' references missing schedule step {step}")
            }
            Self::OutputIndexOutOfRange { producer, index, count } => write!(
                f,
                "output index {index} exceeds node '{producer}' output count {count}"
            ),
            Self::WorkspaceIndexOutOfRange { node, index, count } => write!(
                f,
                "workspace index {index} exceeds node '{node}' workspace count {count}"
            ),
            Self::TupleInput { consumer, input } => {
                write!(f, "node '{consumer}' input {input} is an unflattened bundle")
            }
            Self::InplaceWithoutInput { node } => {
                write!(f, "in-place node '{node}' has no input tensor to alias")
            }
            Self::DuplicateContiguousMember { node, tensor } => write!(
                f,
                "collective node '{node}' lists tensor {tensor} twice in a contiguous group"
            ),
            Self::SolverFailed { reason } => write!(f, "packing solver failed: {reason}"),
        }
    }
}

impl Error for PlanError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_entity() {
        let err = PlanError::OutputIndexOutOfRange {
            producer: "conv0".into(),
            index: 4,
            count: 2,
        };
        assert_eq!(
            err.to_string(),
            "output index 4 exceeds node 'conv0' output count 2"
        );
    }
}
