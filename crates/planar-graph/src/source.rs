//! External execution-order description consumed by the builder.
//!
//! A [`Schedule`] is the planner's only input: a linearized list of
//! compute steps with realized buffer sizes, plus explicit cross-stream
//! synchronization pairs and stream-group ordering. It is plain data;
//! the compiler frontend that extracts it from its own IR is an external
//! collaborator.

use planar_core::{NodeKind, StreamId};

/// Reference from a step input to the value it consumes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputRef {
    /// Output `index` of the step at schedule position `step`.
    Produced {
        /// Schedule position of the producing step.
        step: usize,
        /// Output index on that step.
        index: usize,
    },
    /// An externally backed value with a pre-existing fixed address
    /// (graph parameter, constant, weight). Excluded from reuse.
    External {
        /// Name of the producing entity, used for deduplication.
        name: String,
        /// Output index on the producing entity.
        index: usize,
        /// Backing size in bytes.
        size: u64,
    },
    /// An unflattened tuple/bundle value. Always a fatal build error;
    /// schedule producers must flatten bundles into individual refs.
    Bundle {
        /// Schedule position of the producing step.
        step: usize,
    },
}

/// Declares that one output aliases an earlier step's output (in-place
/// semantics): both must resolve to the same arena offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputAlias {
    /// Output index on the declaring step.
    pub output_index: usize,
    /// Schedule position of the origin step.
    pub origin_step: usize,
    /// Output index on the origin step.
    pub origin_index: usize,
}

/// An explicit cross-stream synchronization edge: the step at `to_step`
/// may not start before the step at `from_step` has completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncPair {
    /// Schedule position of the signalling step.
    pub from_step: usize,
    /// Schedule position of the waiting step.
    pub to_step: usize,
}

/// Reference to one output of one schedule step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepOutput {
    /// Schedule position.
    pub step: usize,
    /// Output index.
    pub index: usize,
}

/// One scheduled compute step.
#[derive(Clone, Debug)]
pub struct ScheduleStep {
    /// Name for logs and dumps.
    pub name: String,
    /// Owning stream.
    pub stream: StreamId,
    /// Ordinary kernel or collective operation.
    pub kind: NodeKind,
    /// Realized output buffer sizes, in output order.
    pub output_sizes: Vec<u64>,
    /// Realized workspace buffer sizes.
    pub workspace_sizes: Vec<u64>,
    /// Output indices that are already externally backed and need no
    /// arena allocation.
    pub prebacked_outputs: Vec<usize>,
    /// Workspace indices that are already externally backed.
    pub prebacked_workspaces: Vec<usize>,
    /// Consumed values, in input order.
    pub inputs: Vec<InputRef>,
    /// The step has no data dependencies tying it into the graph; its
    /// outputs stay live until the end of the schedule.
    pub independent: bool,
    /// The step feeds graph input data; its outputs span the whole graph.
    pub graph_input_feed: bool,
    /// The step computes in place: all outputs alias its first input.
    pub inplace: bool,
    /// Memory reuse is disabled for every buffer this step touches.
    pub disable_reuse: bool,
    /// Declared output aliases.
    pub aliases: Vec<OutputAlias>,
}

impl ScheduleStep {
    /// A compute step on `stream` with no buffers and no flags.
    #[must_use]
    pub fn new(name: impl Into<String>, stream: StreamId) -> Self {
        Self {
            name: name.into(),
            stream,
            kind: NodeKind::Compute,
            output_sizes: Vec::new(),
            workspace_sizes: Vec::new(),
            prebacked_outputs: Vec::new(),
            prebacked_workspaces: Vec::new(),
            inputs: Vec::new(),
            independent: false,
            graph_input_feed: false,
            inplace: false,
            disable_reuse: false,
            aliases: Vec::new(),
        }
    }
}

/// The full execution-order description of one graph.
#[derive(Clone, Debug, Default)]
pub struct Schedule {
    /// External identifier of the graph, used as the plan cache key prefix.
    pub graph_id: u32,
    /// Linearized compute steps. Position in this list becomes the node id.
    pub steps: Vec<ScheduleStep>,
    /// Explicit cross-stream synchronization edges.
    pub sync_pairs: Vec<SyncPair>,
    /// Ordered stream chains.
    pub stream_groups: Vec<Vec<StreamId>>,
    /// Step outputs observed by summary sinks; they live for the whole
    /// graph.
    pub summary_refs: Vec<StepOutput>,
}
