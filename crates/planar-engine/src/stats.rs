//! Planning diagnostics: theoretical bounds and per-category totals.

use planar_core::{Lifelong, Model, TensorKind};

/// Size statistics for one planning run, all in bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlanStats {
    /// Peak of the per-timestep aligned-size sums: no plan can beat it.
    pub lower_bound: u64,
    /// Sum of all aligned sizes: planning without reuse.
    pub upper_bound: u64,
    /// Total workspace tensor size.
    pub workspace_total: u64,
    /// Total collective input buffer size.
    pub comm_input_total: u64,
    /// Total collective output buffer size.
    pub comm_output_total: u64,
    /// Total size of tensors spanning the whole graph.
    pub lifelong_whole_total: u64,
    /// Total size of tensors extending to the graph start.
    pub lifelong_start_total: u64,
    /// Total size of tensors extending to the graph end.
    pub lifelong_end_total: u64,
}

/// Compute statistics over a resolved model. Valid on both pipeline
/// paths; offsets are not consulted.
#[must_use]
pub fn compute_stats(model: &Model) -> PlanStats {
    let mut stats = PlanStats {
        lower_bound: lower_bound(model),
        comm_input_total: model.comm_input_total,
        comm_output_total: model.comm_output_total,
        ..PlanStats::default()
    };
    for tensor in &model.tensors {
        stats.upper_bound += tensor.aligned_size;
        if tensor.kind == TensorKind::Workspace {
            stats.workspace_total += tensor.aligned_size;
        }
        match tensor.lifelong {
            Lifelong::WholeGraph => stats.lifelong_whole_total += tensor.aligned_size,
            Lifelong::GraphStart => stats.lifelong_start_total += tensor.aligned_size,
            Lifelong::GraphEnd => stats.lifelong_end_total += tensor.aligned_size,
            Lifelong::None => {}
        }
    }
    stats
}

/// Peak aligned-size sum over the lifetime timeline. Whole-graph
/// lifelong tensors count at every timestep.
fn lower_bound(model: &Model) -> u64 {
    let Some(max_end) = model.tensors.iter().map(|t| t.lifetime.end.index()).max() else {
        return 0;
    };
    let mut timeline = vec![0u64; max_end + 1];
    for tensor in &model.tensors {
        let (lower, upper) = if tensor.is_lifelong() {
            (0, max_end)
        } else {
            (tensor.lifetime.start.index(), tensor.lifetime.end.index())
        };
        for slot in &mut timeline[lower..=upper] {
            *slot += tensor.aligned_size;
        }
    }
    timeline.into_iter().max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use planar_graph::{build_closure, build_model, resolve};
    use planar_test_utils::ScheduleBuilder;

    fn model_for(builder: ScheduleBuilder) -> Model {
        let schedule = builder.finish();
        let mut model = build_model(&schedule).unwrap();
        resolve(&mut model, &schedule).unwrap();
        let _ = build_closure(&mut model);
        model
    }

    #[test]
    fn bounds_for_a_simple_chain() {
        let mut b = ScheduleBuilder::new();
        let mut step = b.step(0, &[128]);
        for _ in 0..2 {
            let next = b.step(0, &[128]);
            b.consume(next, step, 0);
            step = next;
        }
        let stats = compute_stats(&model_for(b));
        assert_eq!(stats.upper_bound, 1536);
        // At most two of the three tensors are ever live together.
        assert_eq!(stats.lower_bound, 1024);
    }

    #[test]
    fn lifelong_tensor_counts_everywhere() {
        let mut b = ScheduleBuilder::new();
        let pinned = b.step(0, &[100]);
        b.disable_reuse(pinned);
        b.step(0, &[100]);
        let stats = compute_stats(&model_for(b));
        assert_eq!(stats.lifelong_whole_total, 512);
        assert_eq!(stats.lower_bound, 1024);
    }

    #[test]
    fn workspace_and_comm_totals() {
        let mut b = ScheduleBuilder::new();
        b.step_with_workspaces(0, &[64], &[64]);
        b.collective(1, &[64], &[]);
        let stats = compute_stats(&model_for(b));
        assert_eq!(stats.workspace_total, 512);
        // Single-member output list carries both the leading and the
        // trailing gap.
        assert_eq!(stats.comm_output_total, 1536);
        assert_eq!(stats.comm_input_total, 0);
    }
}
