//! Dependency Closure Engine.
//!
//! Adds the implicit ordering edges (intra-stream order, stream-group
//! chains), then computes for every node the bitset of all nodes that
//! are guaranteed complete before it starts. A single forward pass over
//! increasing node ids suffices: once the stream and group edges are in
//! place, every ancestor id is smaller than the node's own id.

use std::collections::BTreeMap;

use planar_core::{DynBitset, Model, NodeId, StreamId};

/// Per-node "guaranteed complete before" sets, indexed by node id.
#[derive(Clone, Debug)]
pub struct DependencyClosure {
    closures: Vec<DynBitset>,
}

impl DependencyClosure {
    /// The closure bitset of `node`.
    #[must_use]
    pub fn of(&self, node: NodeId) -> &DynBitset {
        &self.closures[node.index()]
    }

    /// True if `ancestor` is guaranteed complete before `node` starts.
    #[must_use]
    pub fn contains(&self, node: NodeId, ancestor: NodeId) -> bool {
        self.closures[node.index()].get(ancestor.index())
    }

    /// Number of nodes covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.closures.len()
    }

    /// True if no nodes are covered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.closures.is_empty()
    }
}

/// Add ordering edges, fix consumer sets, compute consumer peaks and the
/// per-node dependency closures.
pub fn build_closure(model: &mut Model) -> DependencyClosure {
    add_stream_edges(model);
    add_group_edges(model);
    fix_empty_consumers(model);
    compute_consumer_peaks(model);

    let count = model.node_count();
    let mut closures: Vec<DynBitset> = (0..count).map(|_| DynBitset::new(count)).collect();
    for i in 0..count {
        let (done, rest) = closures.split_at_mut(i);
        let row = &mut rest[0];
        for &ancestor in &model.nodes[i].ancestors {
            row.set(ancestor.index());
            if ancestor.index() < i {
                row.union_with(&done[ancestor.index()]);
            } else {
                // The structural invariant is violated; the closure stays
                // partial for this edge.
                tracing::warn!(node = i, %ancestor, "ancestor id not smaller than node id");
            }
        }
    }

    tracing::debug!(nodes = count, "dependency closures computed");
    DependencyClosure { closures }
}

/// Each node depends on its immediate predecessor in the same stream.
fn add_stream_edges(model: &mut Model) {
    let pairs: Vec<(NodeId, NodeId)> = model
        .streams
        .values()
        .flat_map(|stream| stream.nodes.windows(2).map(|w| (w[1], w[0])))
        .collect();
    for (node, predecessor) in pairs {
        model.nodes[node.index()].ancestors.insert(predecessor);
    }
}

/// Within a stream group, the first node of each stream depends on the
/// last node of the previous stream. Missing streams are skipped.
fn add_group_edges(model: &mut Model) {
    let mut edges: Vec<(NodeId, NodeId)> = Vec::new();
    for group in &model.stream_groups {
        for window in group.windows(2) {
            let (previous, current): (StreamId, StreamId) = (window[0], window[1]);
            let Some(last) = model.streams.get(&previous).and_then(|s| s.nodes.last()) else {
                continue;
            };
            let Some(first) = model.streams.get(&current).and_then(|s| s.nodes.first()) else {
                continue;
            };
            edges.push((*first, *last));
        }
    }
    for (node, ancestor) in edges {
        model.nodes[node.index()].ancestors.insert(ancestor);
    }
}

/// A tensor nobody consumes is given its producer as its own consumer,
/// so conflict checks always have at least one destination to test.
fn fix_empty_consumers(model: &mut Model) {
    for tensor in &mut model.tensors {
        if tensor.consumers.is_empty() {
            tensor.consumers.insert(tensor.producer);
        }
    }
}

/// Collapse each tensor's consumer set to the maximum consumer id per
/// consuming stream. Within one stream the largest id subsumes the
/// earlier ones, so these peaks are all the conflict check needs.
fn compute_consumer_peaks(model: &mut Model) {
    let node_streams: Vec<StreamId> = model.nodes.iter().map(|n| n.stream).collect();
    for tensor in &mut model.tensors {
        let mut per_stream: BTreeMap<StreamId, NodeId> = BTreeMap::new();
        for &consumer in &tensor.consumers {
            let stream = node_streams[consumer.index()];
            let entry = per_stream.entry(stream).or_insert(consumer);
            if consumer > *entry {
                *entry = consumer;
            }
        }
        tensor.consumer_peaks = per_stream.values().copied().collect();
    }
}
