//! Conflict Resolver: the pairwise may-reuse relation.
//!
//! Two tensors may share memory iff one of them is provably fully
//! consumed before the other's producer begins, judged against the
//! dependency closure. Each candidate's row of the relation is computed
//! independently, so rows can be farmed out to a bounded worker pool;
//! workers send finished `(id, row)` pairs back over a channel and the
//! caller assembles the matrix, keeping all mutation on one thread.

use planar_core::{DynBitset, Lifelong, Model, NodeId, TensorId};
use planar_graph::DependencyClosure;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Tuning knobs for conflict computation.
#[derive(Clone, Copy, Debug)]
pub struct ConflictOptions {
    /// Candidate count at or above which rows are computed by the
    /// worker pool instead of inline.
    pub parallel_threshold: usize,
    /// Worker thread count for the parallel path.
    pub workers: usize,
    /// Seed for the deterministic candidate shuffle that balances
    /// per-worker batch cost.
    pub shuffle_seed: u64,
}

impl Default for ConflictOptions {
    fn default() -> Self {
        Self { parallel_threshold: 2000, workers: 4, shuffle_seed: 0 }
    }
}

/// How a descriptor stores its consumer peaks.
#[derive(Clone, Copy, Debug)]
enum ConsumerRef {
    /// Up to two peaks stored inline. `count` is 1 or 2.
    Inline { peaks: [NodeId; 2], count: u8 },
    /// More than two peaks, spilled to the shared overflow array.
    Spilled { start: usize, len: usize },
}

/// Compact per-candidate view of what the reuse check needs: the
/// producer id plus the consumer peaks, kept out-of-line only when a
/// tensor is consumed on three or more streams.
#[derive(Clone, Copy, Debug)]
struct ConflictDesc {
    producer: NodeId,
    consumers: ConsumerRef,
}

struct Descriptors {
    by_tensor: Vec<Option<ConflictDesc>>,
    overflow: Vec<NodeId>,
}

impl Descriptors {
    fn build(model: &Model, candidates: &[TensorId]) -> Self {
        let mut by_tensor: Vec<Option<ConflictDesc>> = vec![None; model.tensor_count()];
        let mut overflow = Vec::new();
        for &id in candidates {
            let tensor = &model.tensors[id.index()];
            let peaks = tensor.consumer_peaks.as_slice();
            let consumers = match peaks {
                [only] => ConsumerRef::Inline { peaks: [*only, *only], count: 1 },
                [first, second] => ConsumerRef::Inline { peaks: [*first, *second], count: 2 },
                many => {
                    let start = overflow.len();
                    overflow.extend_from_slice(many);
                    ConsumerRef::Spilled { start, len: many.len() }
                }
            };
            by_tensor[id.index()] =
                Some(ConflictDesc { producer: tensor.producer, consumers });
        }
        Self { by_tensor, overflow }
    }

    fn peaks<'a>(&'a self, desc: &'a ConflictDesc) -> &'a [NodeId] {
        match &desc.consumers {
            ConsumerRef::Inline { peaks, count } => &peaks[..*count as usize],
            ConsumerRef::Spilled { start, len } => &self.overflow[*start..*start + *len],
        }
    }
}

/// True if every consumer of `a` is guaranteed complete before
/// `b_producer` starts, and `b_producer` is not itself one of them.
fn consumed_before(
    descs: &Descriptors,
    a: &ConflictDesc,
    b_producer: NodeId,
    closure: &DependencyClosure,
) -> bool {
    descs
        .peaks(a)
        .iter()
        .all(|&peak| peak != b_producer && closure.contains(b_producer, peak))
}

fn may_reuse(
    descs: &Descriptors,
    a: &ConflictDesc,
    b: &ConflictDesc,
    closure: &DependencyClosure,
) -> bool {
    consumed_before(descs, a, b.producer, closure)
        || consumed_before(descs, b, a.producer, closure)
}

fn row_for(
    id: TensorId,
    candidates: &[TensorId],
    descs: &Descriptors,
    closure: &DependencyClosure,
    tensor_count: usize,
) -> DynBitset {
    let mut row = DynBitset::new(tensor_count);
    // A tensor trivially shares its own bytes.
    row.set(id.index());
    let Some(mine) = &descs.by_tensor[id.index()] else {
        return row;
    };
    for &other in candidates {
        if other == id {
            continue;
        }
        let Some(theirs) = &descs.by_tensor[other.index()] else {
            continue;
        };
        // Two outputs of one node coexist by definition.
        if theirs.producer == mine.producer {
            continue;
        }
        if may_reuse(descs, mine, theirs, closure) {
            row.set(other.index());
        }
    }
    row
}

/// Compute the symmetric reuse matrix, one row per tensor.
///
/// Tensors with zero aligned size or spanning the whole graph are not
/// candidates: their rows stay empty (apart from the self bit) and no
/// candidate's row references them. Above
/// [`ConflictOptions::parallel_threshold`] candidates, rows are
/// computed by a scoped worker pool over a deterministic shuffle of the
/// candidate list.
#[must_use]
pub fn compute_reuse(
    model: &Model,
    closure: &DependencyClosure,
    options: &ConflictOptions,
) -> Vec<DynBitset> {
    let tensor_count = model.tensor_count();
    let candidates: Vec<TensorId> = model
        .tensors
        .iter()
        .filter(|t| t.aligned_size > 0 && !t.is_lifelong())
        .map(|t| t.id)
        .collect();
    let descs = Descriptors::build(model, &candidates);

    let mut rows: Vec<DynBitset> =
        (0..tensor_count).map(|_| DynBitset::new(tensor_count)).collect();
    for (index, row) in rows.iter_mut().enumerate() {
        row.set(index);
    }

    let mut order = candidates.clone();
    let mut rng = ChaCha8Rng::seed_from_u64(options.shuffle_seed);
    order.shuffle(&mut rng);

    if order.len() < options.parallel_threshold || options.workers <= 1 {
        tracing::debug!(candidates = order.len(), "computing reuse rows inline");
        for &id in &order {
            rows[id.index()] = row_for(id, &candidates, &descs, closure, tensor_count);
        }
    } else {
        let workers = options.workers;
        let chunk_size = order.len().div_ceil(workers).max(1);
        tracing::debug!(
            candidates = order.len(),
            workers,
            chunk_size,
            "computing reuse rows in parallel"
        );
        let (tx, rx) = crossbeam_channel::unbounded::<(TensorId, DynBitset)>();
        let candidates = &candidates;
        let descs = &descs;
        std::thread::scope(|scope| {
            for chunk in order.chunks(chunk_size) {
                let tx = tx.clone();
                scope.spawn(move || {
                    for &id in chunk {
                        let row = row_for(id, candidates, descs, closure, tensor_count);
                        if tx.send((id, row)).is_err() {
                            return;
                        }
                    }
                });
            }
            drop(tx);
            for (id, row) in rx {
                rows[id.index()] = row;
            }
        });
    }

    apply_semi_lifelong(model, &candidates, &mut rows);
    rows
}

/// Blanket id-ordering override for semi-lifelong tensors: a tensor
/// extending toward the graph start never reuses with a smaller id, one
/// extending toward the graph end never with a larger id. Both
/// directions of each cleared pair are cleared to keep the matrix
/// symmetric.
fn apply_semi_lifelong(model: &Model, candidates: &[TensorId], rows: &mut [DynBitset]) {
    let tensor_count = rows.len();
    for &id in candidates {
        let i = id.index();
        let blocked: Box<dyn Iterator<Item = usize>> =
            match model.tensors[i].lifelong {
                Lifelong::GraphStart => Box::new(0..i),
                Lifelong::GraphEnd => Box::new(i + 1..tensor_count),
                Lifelong::None | Lifelong::WholeGraph => continue,
            };
        for other in blocked {
            rows[i].clear(other);
            rows[other].clear(i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planar_graph::{build_closure, build_model, resolve};
    use planar_test_utils::ScheduleBuilder;

    fn reuse_for(builder: ScheduleBuilder, options: &ConflictOptions) -> (Model, Vec<DynBitset>) {
        let schedule = builder.finish();
        let mut model = build_model(&schedule).unwrap();
        resolve(&mut model, &schedule).unwrap();
        let closure = build_closure(&mut model);
        let rows = compute_reuse(&model, &closure, options);
        (model, rows)
    }

    #[test]
    fn fully_consumed_tensor_may_reuse_with_a_later_one() {
        let mut b = ScheduleBuilder::new();
        let first = b.step(0, &[128]);
        let middle = b.step(0, &[128]);
        b.consume(middle, first, 0);
        let last = b.step(0, &[128]);
        b.consume(last, middle, 0);
        let (_, rows) = reuse_for(b, &ConflictOptions::default());
        // Tensor 0's only consumer (node 1) strictly precedes tensor 2's
        // producer (node 2), so the pair may share memory.
        assert!(rows[0].get(2));
        assert!(rows[2].get(0));
    }

    #[test]
    fn consumer_equal_to_producer_blocks_reuse() {
        let mut b = ScheduleBuilder::new();
        let first = b.step(0, &[128]);
        let middle = b.step(0, &[128]);
        b.consume(middle, first, 0);
        // Node 1 reads tensor 0 while writing tensor 1; the buffers
        // overlap in time and may not share memory.
        let (_, rows) = reuse_for(b, &ConflictOptions::default());
        assert!(!rows[0].get(1));
        assert!(!rows[1].get(0));
    }

    #[test]
    fn unordered_streams_never_reuse() {
        let mut b = ScheduleBuilder::new();
        b.step(0, &[128]);
        b.step(1, &[128]);
        let (_, rows) = reuse_for(b, &ConflictOptions::default());
        assert!(!rows[0].get(1));
        assert!(!rows[1].get(0));
    }

    #[test]
    fn sync_edge_makes_cross_stream_reuse_possible() {
        let mut b = ScheduleBuilder::new();
        let producer = b.step(0, &[128]);
        let later = b.step(1, &[128]);
        b.sync(producer, later);
        let (_, rows) = reuse_for(b, &ConflictOptions::default());
        // The sync event makes node 0 (tensor 0's sole consumer after the
        // self-consumer fix) an ancestor of node 1.
        assert!(rows[0].get(1));
    }

    #[test]
    fn lifelong_tensor_is_excluded_entirely() {
        let mut b = ScheduleBuilder::new();
        let pinned = b.step(0, &[128]);
        b.disable_reuse(pinned);
        let next = b.step(0, &[128]);
        let _ = next;
        let (model, rows) = reuse_for(b, &ConflictOptions::default());
        assert!(model.tensors[0].is_lifelong());
        for (i, row) in rows.iter().enumerate() {
            for bit in row.iter_ones() {
                assert!(bit == i || bit != 0, "lifelong tensor appears in row {i}");
            }
        }
        assert_eq!(rows[0].count_ones(), 1);
    }

    #[test]
    fn graph_end_tensor_never_reuses_with_larger_ids() {
        let mut b = ScheduleBuilder::new();
        let held = b.step(0, &[128]);
        b.independent(held);
        let middle = b.step(0, &[128]);
        b.consume(middle, held, 0);
        let last = b.step(0, &[128]);
        b.consume(last, middle, 0);
        let (model, rows) = reuse_for(b, &ConflictOptions::default());
        assert!(model.tensors[0].is_semi_lifelong_end());
        // Reachability alone would allow tensor 0 to share with tensor 2;
        // the liveness extension overrides it.
        assert!(!rows[0].get(2));
        assert!(!rows[2].get(0));
    }

    #[test]
    fn parallel_and_inline_paths_agree() {
        let mut b = ScheduleBuilder::new();
        let mut previous = None;
        for i in 0..40 {
            let step = b.step(i % 3, &[64 + 64 * (i as u64 % 4)]);
            if let Some(p) = previous {
                if i % 3 == 0 {
                    b.consume(step, p, 0);
                }
            }
            previous = Some(step);
        }
        let schedule = b.finish();
        let mut model = build_model(&schedule).unwrap();
        resolve(&mut model, &schedule).unwrap();
        let closure = build_closure(&mut model);

        let inline = compute_reuse(
            &model,
            &closure,
            &ConflictOptions { parallel_threshold: usize::MAX, ..Default::default() },
        );
        let parallel = compute_reuse(
            &model,
            &closure,
            &ConflictOptions { parallel_threshold: 0, workers: 4, shuffle_seed: 7 },
        );
        assert_eq!(inline, parallel);
    }
}
