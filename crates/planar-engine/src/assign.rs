//! Solver adapter and offset propagation.
//!
//! Whole-graph lifelong tensors are stacked back-to-back in a reserved
//! region at the arena base, and the solver packs everything else above
//! it. The exception is a lifelong member of a contiguous list: it stays
//! with its list as a solver item, and its empty reuse row keeps every
//! other tensor out of its bytes. Solver failure aborts the run; there
//! is no partial plan. After a successful solve the offsets are
//! propagated outward: linked contiguous lists copy their source list's
//! offsets position-wise, every contiguous list's leading gap is applied,
//! and finally ref members adopt their first member's offset. Contiguous
//! copying must precede the ref pass, because contiguous partners may
//! themselves be ref partners and would otherwise see a stale offset.

use std::collections::BTreeSet;

use planar_core::{DynBitset, Model, PlanError, TensorId, GAP_SIZE};
use planar_solver::{SolveItem, SolveRequest, Solver};

use crate::reconcile::Reconciled;

/// Outcome of offset assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Assignment {
    /// Total arena size: reserved base plus the solver's extent.
    pub arena_size: u64,
    /// Size of the reserved region holding whole-graph lifelong tensors.
    pub reserved_base: u64,
}

/// Solve the packing problem and write every tensor's final offset.
pub fn assign_offsets(
    model: &mut Model,
    rows: &[DynBitset],
    reconciled: &Reconciled,
    solver: &dyn Solver,
) -> Result<Assignment, PlanError> {
    let reserved_base = stack_lifelong(model);

    let contiguous_members: BTreeSet<TensorId> = reconciled
        .solver_contiguous
        .iter()
        .flatten()
        .copied()
        .collect();
    let items: Vec<SolveItem> = model
        .tensors
        .iter()
        .filter(|t| {
            contiguous_members.contains(&t.id) || (!t.is_lifelong() && t.aligned_size > 0)
        })
        .map(|t| SolveItem { id: t.id, size: t.aligned_size })
        .collect();

    let solver_total = if items.is_empty() {
        tracing::info!("no items to place, arena holds only lifelong tensors");
        0
    } else {
        let request = SolveRequest {
            items,
            reuse: rows,
            contiguous: reconciled.solver_contiguous.clone(),
        };
        let placement = solver
            .solve(&request)
            .map_err(|error| PlanError::SolverFailed { reason: error.to_string() })?;
        for (&id, &offset) in &placement.offsets {
            model.tensors[id.index()].offset = reserved_base + offset;
        }
        placement.total_size
    };

    propagate(model, reconciled);

    Ok(Assignment { arena_size: reserved_base + solver_total, reserved_base })
}

/// Stack whole-graph lifelong tensors at the arena base, in id order.
/// Contiguous list members are left to the solver so their list stays
/// intact.
fn stack_lifelong(model: &mut Model) -> u64 {
    let mut base = 0u64;
    for tensor in &mut model.tensors {
        if tensor.is_lifelong() && !tensor.contiguous && tensor.aligned_size > 0 {
            tensor.offset = base;
            base += tensor.aligned_size;
        }
    }
    if base > 0 {
        tracing::debug!(reserved = base, "lifelong tensors stacked at arena base");
    }
    base
}

fn propagate(model: &mut Model, reconciled: &Reconciled) {
    for &(source, follower) in &reconciled.linked_lists {
        let copies: Vec<(TensorId, TensorId)> = model.contiguous_groups[source]
            .iter()
            .zip(&model.contiguous_groups[follower])
            .map(|(&from, &to)| (from, to))
            .collect();
        for (from, to) in copies {
            model.tensors[to.index()].offset = model.tensors[from.index()].offset;
        }
    }

    // The first member's aligned size carries the leading gap; its data
    // begins one gap above the placed offset. Zero-size leaders carry no
    // gap.
    let leaders: Vec<TensorId> = model
        .contiguous_groups
        .iter()
        .filter_map(|group| group.first().copied())
        .collect();
    for leader in leaders {
        let tensor = &mut model.tensors[leader.index()];
        if tensor.aligned_size > 0 {
            tensor.offset += GAP_SIZE;
        }
    }

    for group_index in 0..model.ref_groups.len() {
        let group = &model.ref_groups[group_index];
        let Some(&first) = group.first() else { continue };
        let offset = model.tensors[first.index()].offset;
        let members: Vec<TensorId> = group[1..].to_vec();
        for member in members {
            model.tensors[member.index()].offset = offset;
        }
    }
}
