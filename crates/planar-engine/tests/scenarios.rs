//! End-to-end planning scenarios over the full pipeline.

use planar_core::{NodeId, TensorId};
use planar_engine::{Planner, PlannerConfig};
use planar_test_utils::ScheduleBuilder;

fn plan(builder: ScheduleBuilder) -> planar_engine::MemoryPlan {
    Planner::new(PlannerConfig::default())
        .plan(&builder.finish())
        .unwrap()
}

/// Ranges of two tensors in the arena never overlap unless they share an
/// offset deliberately (ref groups).
fn disjoint(plan: &planar_engine::MemoryPlan, a: TensorId, b: TensorId) -> bool {
    let (ta, tb) = (&plan.model().tensors[a.index()], &plan.model().tensors[b.index()]);
    ta.offset + ta.aligned_size <= tb.offset || tb.offset + tb.aligned_size <= ta.offset
}

#[test]
fn chain_reuses_memory_below_the_naive_sum() {
    let mut b = ScheduleBuilder::new();
    let mut step = b.step(0, &[512]);
    for _ in 0..3 {
        let next = b.step(0, &[512]);
        b.consume(next, step, 0);
        step = next;
    }
    let plan = plan(b);
    // Four tensors of 512 bytes; at most two live at once.
    assert_eq!(plan.stats().upper_bound, 2048);
    assert_eq!(plan.arena_size(), 1024);
    // The first and third tensor share the same slot.
    assert_eq!(
        plan.tensor_offset(TensorId(0)).unwrap(),
        plan.tensor_offset(TensorId(2)).unwrap()
    );
}

#[test]
fn unsynchronized_streams_never_share_memory() {
    let mut b = ScheduleBuilder::new();
    b.step(0, &[512]);
    b.step(1, &[512]);
    let plan = plan(b);
    assert!(disjoint(&plan, TensorId(0), TensorId(1)));
    assert_eq!(plan.arena_size(), 1024);
}

#[test]
fn sync_edge_unlocks_cross_stream_reuse() {
    let mut b = ScheduleBuilder::new();
    let early = b.step(0, &[512]);
    let late = b.step(1, &[512]);
    b.sync(early, late);
    let plan = plan(b);
    assert_eq!(plan.arena_size(), 512);
}

#[test]
fn stream_group_orders_whole_streams() {
    let mut b = ScheduleBuilder::new();
    b.step(0, &[512]);
    b.step(1, &[512]);
    b.stream_group(&[0, 1]);
    let plan = plan(b);
    // Stream 0 finishes before stream 1 starts, so its tensor is dead.
    assert_eq!(plan.arena_size(), 512);
}

#[test]
fn ref_group_members_end_at_one_offset() {
    let mut b = ScheduleBuilder::new();
    let origin = b.step(0, &[512]);
    let aliaser = b.step(0, &[512]);
    b.consume(aliaser, origin, 0);
    b.alias(aliaser, 0, origin, 0);
    let plan = plan(b);
    assert_eq!(
        plan.tensor_offset(TensorId(0)).unwrap(),
        plan.tensor_offset(TensorId(1)).unwrap()
    );
    assert_eq!(plan.arena_size(), 512);
}

#[test]
fn inplace_node_binds_input_and_outputs() {
    let mut b = ScheduleBuilder::new();
    let producer = b.step(0, &[512]);
    let inplace = b.step(0, &[512, 512]);
    b.consume(inplace, producer, 0);
    b.inplace(inplace);
    let plan = plan(b);
    let base = plan.tensor_offset(TensorId(0)).unwrap();
    assert_eq!(plan.tensor_offset(TensorId(1)).unwrap(), base);
    assert_eq!(plan.tensor_offset(TensorId(2)).unwrap(), base);
}

#[test]
fn whole_graph_tensors_live_in_the_reserved_base() {
    let mut b = ScheduleBuilder::new();
    let feed = b.step(0, &[512]);
    b.graph_input_feed(feed);
    let mut step = b.step(0, &[512]);
    for _ in 0..2 {
        let next = b.step(0, &[512]);
        b.consume(next, step, 0);
        step = next;
    }
    let plan = plan(b);
    // The feed output sits at the base; nothing else dips below it.
    assert_eq!(plan.tensor_offset(TensorId(0)).unwrap(), 0);
    for tensor in &plan.model().tensors[1..] {
        assert!(tensor.offset >= 512);
    }
    // Everything above the base still packs: three chained tensors in
    // two slots.
    assert_eq!(plan.arena_size(), 512 + 1024);
}

#[test]
fn contiguous_group_lays_out_back_to_back() {
    let mut b = ScheduleBuilder::new();
    b.collective(0, &[512, 512], &[]);
    let plan = plan(b);
    let first = plan.tensor_offset(TensorId(0)).unwrap();
    let second = plan.tensor_offset(TensorId(1)).unwrap();
    assert_eq!(second, first + 512);
    // Leading and trailing gap on top of the two payloads.
    assert_eq!(plan.arena_size(), 2 * 512 + 2 * 512);
}

#[test]
fn summary_observed_collective_output_still_plans() {
    let mut b = ScheduleBuilder::new();
    let comm = b.collective(0, &[512, 512], &[]);
    b.summary_ref(comm, 0);
    let plan = plan(b);
    // The summary-observed member is lifelong but keeps its place in
    // the contiguous list.
    assert_eq!(
        plan.tensor_offset(TensorId(1)).unwrap(),
        plan.tensor_offset(TensorId(0)).unwrap() + 512
    );
    assert_eq!(plan.arena_size(), 2048);
}

#[test]
fn reuse_disabled_collective_plans_alongside_other_tensors() {
    let mut b = ScheduleBuilder::new();
    let comm = b.collective(0, &[512, 512], &[]);
    b.disable_reuse(comm);
    b.step(0, &[512]);
    let plan = plan(b);
    assert_eq!(
        plan.tensor_offset(TensorId(1)).unwrap(),
        plan.tensor_offset(TensorId(0)).unwrap() + 512
    );
    // The ordinary tensor packs above the pinned list.
    assert!(plan.tensor_offset(TensorId(2)).unwrap() >= 2048);
    assert_eq!(plan.arena_size(), 2560);
}

#[test]
fn workspaces_pack_like_ordinary_tensors() {
    let mut b = ScheduleBuilder::new();
    let first = b.step_with_workspaces(0, &[512], &[512]);
    let second = b.step_with_workspaces(0, &[512], &[512]);
    b.consume(second, first, 0);
    let plan = plan(b);
    assert!(disjoint(&plan, TensorId(0), TensorId(1)));
    assert!(disjoint(&plan, TensorId(2), TensorId(3)));
    assert!(plan.stats().workspace_total == 1024);
    // Node 0's workspace dies with node 0 and may back node 1's buffers.
    assert!(plan.arena_size() < plan.stats().upper_bound);
}

#[test]
fn duplicate_sync_to_missing_step_fails() {
    let mut b = ScheduleBuilder::new();
    b.step(0, &[512]);
    b.sync(0, 7);
    let err = Planner::new(PlannerConfig::default())
        .plan(&b.finish())
        .unwrap_err();
    assert!(matches!(err, planar_core::PlanError::DanglingStep { .. }));
}

#[test]
fn accessors_match_direct_tensor_offsets() {
    let mut b = ScheduleBuilder::new();
    let step = b.step_with_workspaces(0, &[100, 200], &[50]);
    let _ = step;
    let plan = plan(b);
    assert_eq!(
        plan.output_offset(NodeId(0), 1).unwrap(),
        plan.tensor_offset(TensorId(1)).unwrap()
    );
    assert_eq!(
        plan.workspace_offset(NodeId(0), 0).unwrap(),
        plan.tensor_offset(TensorId(2)).unwrap()
    );
}
