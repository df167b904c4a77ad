//! Candidate memory buffers and their liveness metadata.

use std::collections::BTreeSet;
use std::fmt;

use smallvec::SmallVec;

use crate::id::{NodeId, StreamId, TensorId};

/// Closed lifetime interval of a tensor, in node ids.
///
/// `start` is the producer's id; `end` is extended to the largest
/// consumer id during lifetime resolution. `start <= end` always holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lifetime {
    /// Id of the producing node.
    pub start: NodeId,
    /// Id of the last node that may touch the buffer.
    pub end: NodeId,
}

impl Lifetime {
    /// A single-node lifetime at the producer.
    #[must_use]
    pub fn at(node: NodeId) -> Self {
        Self { start: node, end: node }
    }

    /// Extend the interval to cover `node`.
    pub fn extend_to(&mut self, node: NodeId) {
        if node > self.end {
            self.end = node;
        }
    }
}

/// Category of a tensor, set during build and tag resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TensorKind {
    /// Produced and consumed inside the graph.
    Common,
    /// Produced but (so far) consumed by nobody.
    OutputOnly,
    /// Scratch space private to one node.
    Workspace,
    /// Output observed by a summary sink; lives for the whole graph.
    SummaryInput,
    /// Origin side of an aliasing pair.
    RefInput,
    /// Aliased side of an aliasing pair.
    RefOutput,
    /// Output of a graph-input feed; lives for the whole graph.
    GetNextOutput,
    /// Zero-size marker for a cross-stream synchronization edge.
    EventMarker,
    /// Not yet categorized.
    Unknown,
}

impl fmt::Display for TensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Common => "Common",
            Self::OutputOnly => "OutputOnly",
            Self::Workspace => "Workspace",
            Self::SummaryInput => "SummaryInput",
            Self::RefInput => "RefInput",
            Self::RefOutput => "RefOutput",
            Self::GetNextOutput => "GetNextOutput",
            Self::EventMarker => "EventMarker",
            Self::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Liveness extension beyond the tensor's observed lifetime interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifelong {
    /// No extension; the interval is authoritative.
    None,
    /// Conservatively live over the entire schedule. Excluded from reuse.
    WholeGraph,
    /// Live from the start of the graph to the end of its interval.
    GraphStart,
    /// Live from the start of its interval to the end of the graph.
    GraphEnd,
}

impl Lifelong {
    /// Stable numeric encoding used by the persisted plan snapshot.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::WholeGraph => 1,
            Self::GraphStart => 2,
            Self::GraphEnd => 3,
        }
    }
}

impl fmt::Display for Lifelong {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "LifelongNone",
            Self::WholeGraph => "LifelongWholeGraph",
            Self::GraphStart => "LifelongGraphStart",
            Self::GraphEnd => "LifelongGraphEnd",
        };
        f.write_str(name)
    }
}

/// One candidate memory buffer.
///
/// Created during model building; tags, consumers and lifetime are
/// refined by the resolver passes; `offset` is written exactly once by
/// offset propagation (or restored verbatim from a cached plan).
#[derive(Clone, Debug)]
pub struct Tensor {
    /// Dense id, also the tensor's row index in the reuse matrix.
    pub id: TensorId,
    /// Producing node.
    pub producer: NodeId,
    /// Stream of the producing node.
    pub stream: StreamId,
    /// Requested size in bytes.
    pub original_size: u64,
    /// Alignment-padded size. 0 means no allocation is needed (the
    /// buffer is externally backed, a zero-size event marker, or a
    /// non-leading ref member absorbed by reconciliation).
    pub aligned_size: u64,
    /// Observed lifetime interval.
    pub lifetime: Lifetime,
    /// Category tag.
    pub kind: TensorKind,
    /// Liveness extension.
    pub lifelong: Lifelong,
    /// Member of a contiguous group.
    pub contiguous: bool,
    /// Every node id that consumes this tensor.
    pub consumers: BTreeSet<NodeId>,
    /// Per-consuming-stream maximum consumer id, the compact consumer
    /// descriptor used by conflict computation. Usually 1-2 entries.
    pub consumer_peaks: SmallVec<[NodeId; 2]>,
    /// Final byte offset inside the arena.
    pub offset: u64,
}

impl Tensor {
    /// Create a fresh tensor with a single-node lifetime and no tags.
    #[must_use]
    pub fn new(
        id: TensorId,
        producer: NodeId,
        stream: StreamId,
        original_size: u64,
        aligned_size: u64,
    ) -> Self {
        Self {
            id,
            producer,
            stream,
            original_size,
            aligned_size,
            lifetime: Lifetime::at(producer),
            kind: TensorKind::Unknown,
            lifelong: Lifelong::None,
            contiguous: false,
            consumers: BTreeSet::new(),
            consumer_peaks: SmallVec::new(),
            offset: 0,
        }
    }

    /// True if the tensor spans the whole graph and is excluded from the
    /// reuse relation entirely.
    #[must_use]
    pub fn is_lifelong(&self) -> bool {
        self.lifelong == Lifelong::WholeGraph
    }

    /// True if liveness extends forward to the end of the graph.
    #[must_use]
    pub fn is_semi_lifelong_end(&self) -> bool {
        self.lifelong == Lifelong::GraphEnd
    }
}
