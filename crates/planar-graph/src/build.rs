//! Graph Model Builder: schedule ingestion.
//!
//! Walks the linearized schedule once, creating streams on first sight,
//! one node per step (id = schedule position), and one tensor per output
//! and workspace buffer. Input edges are not resolved here; that is the
//! lifetime stage's job.

use planar_core::{
    align_up, DynBitset, Model, Node, NodeId, PlanError, Stream, StreamId, Tensor, TensorId,
    TensorKind,
};

use crate::source::Schedule;

/// Build the planning model from an external schedule.
///
/// Fails fatally on node id collision during indexing. Tensor ids are
/// assigned in schedule order: all outputs of a step, then its
/// workspaces, then the next step.
pub fn build_model(schedule: &Schedule) -> Result<Model, PlanError> {
    let mut model = Model {
        graph_id: schedule.graph_id,
        stream_groups: schedule.stream_groups.clone(),
        ..Model::default()
    };

    for (position, step) in schedule.steps.iter().enumerate() {
        let id = NodeId(position as u32);
        let stream = model
            .streams
            .entry(step.stream)
            .or_insert_with(|| Stream { id: step.stream, nodes: Vec::new() });
        stream.nodes.push(id);
        model.nodes.push(Node::new(id, step.name.clone(), step.kind, step.stream));
    }

    verify_dense_ids(&model)?;

    for (position, step) in schedule.steps.iter().enumerate() {
        let node_id = NodeId(position as u32);
        let stream = model.nodes[position].stream;

        for (index, &size) in step.output_sizes.iter().enumerate() {
            let tensor = make_tensor(
                &mut model,
                node_id,
                stream,
                size,
                step.prebacked_outputs.contains(&index),
                TensorKind::OutputOnly,
            );
            model.nodes[position].outputs.push(tensor);
        }

        for (index, &size) in step.workspace_sizes.iter().enumerate() {
            let tensor = make_tensor(
                &mut model,
                node_id,
                stream,
                size,
                step.prebacked_workspaces.contains(&index),
                TensorKind::Workspace,
            );
            model.nodes[position].workspaces.push(tensor);
        }
    }

    tracing::debug!(
        nodes = model.node_count(),
        tensors = model.tensor_count(),
        streams = model.streams.len(),
        "built planning model"
    );
    Ok(model)
}

fn make_tensor(
    model: &mut Model,
    producer: NodeId,
    stream: StreamId,
    size: u64,
    prebacked: bool,
    kind: TensorKind,
) -> TensorId {
    let id = TensorId(model.tensors.len() as u32);
    let aligned = if prebacked { 0 } else { align_up(size) };
    let mut tensor = Tensor::new(id, producer, stream, size, aligned);
    tensor.kind = kind;
    model.tensors.push(tensor);
    id
}

/// Guard the dense-id invariant that every later stage relies on.
fn verify_dense_ids(model: &Model) -> Result<(), PlanError> {
    let mut seen = DynBitset::new(model.node_count());
    for (position, node) in model.nodes.iter().enumerate() {
        if node.id.index() != position || seen.get(node.id.index()) {
            return Err(PlanError::DuplicateNodeId { node: node.id });
        }
        seen.set(node.id.index());
    }
    Ok(())
}
