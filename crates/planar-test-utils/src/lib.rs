//! Shared test helpers for the Planar workspace.
//!
//! [`ScheduleBuilder`] assembles the schedules that planner tests feed
//! through the pipeline, without the field-by-field boilerplate of
//! building a `Schedule` literal.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

use planar_core::{NodeKind, StreamId};
use planar_graph::{InputRef, OutputAlias, Schedule, ScheduleStep, StepOutput, SyncPair};

/// Incrementally builds a [`Schedule`] for tests.
///
/// Step-creating methods return the step's schedule position, which the
/// edge-adding methods take as a handle.
#[derive(Debug, Default)]
pub struct ScheduleBuilder {
    schedule: Schedule,
}

impl ScheduleBuilder {
    /// An empty schedule with graph id 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the external graph id.
    pub fn graph_id(&mut self, id: u32) {
        self.schedule.graph_id = id;
    }

    /// Append a compute step producing `outputs`.
    pub fn step(&mut self, stream: u32, outputs: &[u64]) -> usize {
        self.push(stream, NodeKind::Compute, outputs, &[])
    }

    /// Append a compute step producing `outputs` and `workspaces`.
    pub fn step_with_workspaces(
        &mut self,
        stream: u32,
        outputs: &[u64],
        workspaces: &[u64],
    ) -> usize {
        self.push(stream, NodeKind::Compute, outputs, workspaces)
    }

    /// Append a collective step; its input and output lists become
    /// contiguous groups.
    pub fn collective(&mut self, stream: u32, outputs: &[u64], workspaces: &[u64]) -> usize {
        self.push(stream, NodeKind::Collective, outputs, workspaces)
    }

    fn push(
        &mut self,
        stream: u32,
        kind: NodeKind,
        outputs: &[u64],
        workspaces: &[u64],
    ) -> usize {
        let index = self.schedule.steps.len();
        let mut step = ScheduleStep::new(format!("step_{index}"), StreamId(stream));
        step.kind = kind;
        step.output_sizes = outputs.to_vec();
        step.workspace_sizes = workspaces.to_vec();
        self.schedule.steps.push(step);
        index
    }

    /// Make `consumer` read output `index` of `producer`.
    pub fn consume(&mut self, consumer: usize, producer: usize, index: usize) {
        self.schedule.steps[consumer]
            .inputs
            .push(InputRef::Produced { step: producer, index });
    }

    /// Make `consumer` read an externally backed value.
    pub fn consume_external(&mut self, consumer: usize, name: &str, index: usize, size: u64) {
        self.schedule.steps[consumer].inputs.push(InputRef::External {
            name: name.to_string(),
            index,
            size,
        });
    }

    /// Add an explicit cross-stream synchronization edge.
    pub fn sync(&mut self, from: usize, to: usize) {
        self.schedule.sync_pairs.push(SyncPair { from_step: from, to_step: to });
    }

    /// Declare output `output_index` of `step` to alias output
    /// `origin_index` of `origin_step`.
    pub fn alias(&mut self, step: usize, output_index: usize, origin_step: usize, origin_index: usize) {
        self.schedule.steps[step].aliases.push(OutputAlias {
            output_index,
            origin_step,
            origin_index,
        });
    }

    /// Mark `step` as computing in place.
    pub fn inplace(&mut self, step: usize) {
        self.schedule.steps[step].inplace = true;
    }

    /// Mark `step` as independent of the rest of the graph.
    pub fn independent(&mut self, step: usize) {
        self.schedule.steps[step].independent = true;
    }

    /// Mark `step` as a graph-input feed.
    pub fn graph_input_feed(&mut self, step: usize) {
        self.schedule.steps[step].graph_input_feed = true;
    }

    /// Disable memory reuse for every buffer `step` touches.
    pub fn disable_reuse(&mut self, step: usize) {
        self.schedule.steps[step].disable_reuse = true;
    }

    /// Mark every output of `step` as externally backed.
    pub fn prebacked_outputs(&mut self, step: usize) {
        let count = self.schedule.steps[step].output_sizes.len();
        self.schedule.steps[step].prebacked_outputs = (0..count).collect();
    }

    /// Record a summary observation of output `index` of `step`.
    pub fn summary_ref(&mut self, step: usize, index: usize) {
        self.schedule.summary_refs.push(StepOutput { step, index });
    }

    /// Chain streams into an ordered group.
    pub fn stream_group(&mut self, streams: &[u32]) {
        self.schedule
            .stream_groups
            .push(streams.iter().map(|&s| StreamId(s)).collect());
    }

    /// The assembled schedule.
    #[must_use]
    pub fn finish(self) -> Schedule {
        self.schedule
    }
}
