//! Constraint Reconciler: folds ref and contiguous constraints into the
//! reuse matrix before solving.
//!
//! Two adjustments happen here. Ref groups keep only the partners
//! acceptable to every member on the first member's row, and non-first
//! members lose their size so the solver ignores them. Ref pairs whose
//! both sides sit inside contiguous lists link those lists positionally:
//! the follower list drops out of the solver (its offsets are copied
//! from the source list afterwards) and the two lists' members become
//! mutually reusable, since aliasing guarantees they coexist.
//!
//! Bookkeeping inconsistencies found while linking are warnings, never
//! fatal; the pipeline proceeds with best-effort reconciliation.

use std::collections::{BTreeMap, BTreeSet};

use planar_core::{DynBitset, Model, TensorId};

/// Outcome of reconciliation, consumed by the solver adapter.
#[derive(Clone, Debug, Default)]
pub struct Reconciled {
    /// Contiguous lists the solver must still place, in original order.
    pub solver_contiguous: Vec<Vec<TensorId>>,
    /// Linked list pairs as `(source, follower)` indices into the
    /// model's contiguous groups. The follower copies the source's
    /// offsets position-wise during propagation.
    pub linked_lists: Vec<(usize, usize)>,
}

/// Run both reconciliation passes over the reuse matrix.
pub fn reconcile(model: &mut Model, rows: &mut [DynBitset]) -> Reconciled {
    update_ref_conflicts(model, rows);

    let pairs = ref_pairs_in_contiguous(model);
    let links = link_contiguous_lists(model, &pairs);
    force_linked_mutual_reuse(model, &links, rows);

    let mut dropped: BTreeSet<usize> = links.values().copied().collect();
    for (index, group) in model.contiguous_groups.iter().enumerate() {
        let all_zero = group
            .iter()
            .all(|&id| model.tensors[id.index()].aligned_size == 0);
        if all_zero {
            dropped.insert(index);
        }
    }

    let solver_contiguous = model
        .contiguous_groups
        .iter()
        .enumerate()
        .filter(|(index, _)| !dropped.contains(index))
        .map(|(_, group)| group.clone())
        .collect();

    Reconciled {
        solver_contiguous,
        linked_lists: links.into_iter().collect(),
    }
}

/// A ref partner is acceptable only if it is acceptable to every member
/// of the group. Prunes the first member's row (symmetrically), then
/// zeroes the size of every non-first, non-contiguous member.
fn update_ref_conflicts(model: &mut Model, rows: &mut [DynBitset]) {
    for group in &model.ref_groups {
        let Some(&first) = group.first() else { continue };
        let partners: Vec<usize> = rows[first.index()].iter_ones().collect();
        for partner in partners {
            if group.iter().any(|&member| !rows[member.index()].get(partner)) {
                rows[first.index()].clear(partner);
                rows[partner].clear(first.index());
            }
        }
        for &member in &group[1..] {
            if !model.tensors[member.index()].contiguous {
                model.tensors[member.index()].aligned_size = 0;
            }
        }
    }
}

/// Ref pairs of exactly two tensors, both inside contiguous lists.
/// Other ref/contiguous mixtures are unsupported and reported.
fn ref_pairs_in_contiguous(model: &Model) -> Vec<(TensorId, TensorId)> {
    let mut pairs = Vec::new();
    for group in &model.ref_groups {
        let contiguous = group
            .iter()
            .filter(|&&id| model.tensors[id.index()].contiguous)
            .count();
        if group.len() > 2 && contiguous > 0 {
            tracing::warn!(
                members = group.len(),
                "ref group larger than a pair contains contiguous tensors"
            );
        }
        if group.len() == 2 {
            if contiguous == 1 {
                tracing::warn!(
                    first = %group[0],
                    second = %group[1],
                    "ref pair with only one contiguous side"
                );
            } else if contiguous == 2 {
                pairs.push((group[0], group[1]));
            }
        }
    }
    pairs
}

fn position_of(model: &Model, id: TensorId) -> Option<(usize, usize)> {
    for (index, group) in model.contiguous_groups.iter().enumerate() {
        if let Some(position) = group.iter().position(|&member| member == id) {
            return Some((index, position));
        }
    }
    None
}

/// Link each ref pair's two contiguous lists. A source list may only be
/// linked to one follower; positions must match pairwise; every position
/// of a linked pair should be covered by some ref pair. Violations are
/// advisory.
fn link_contiguous_lists(
    model: &Model,
    pairs: &[(TensorId, TensorId)],
) -> BTreeMap<usize, usize> {
    let mut links: BTreeMap<usize, usize> = BTreeMap::new();
    let mut covered: BTreeMap<(usize, usize), BTreeSet<usize>> = BTreeMap::new();
    for &(first, second) in pairs {
        let Some((source, source_pos)) = position_of(model, first) else {
            tracing::warn!(tensor = %first, "contiguous ref tensor not found in any list");
            continue;
        };
        let Some((follower, follower_pos)) = position_of(model, second) else {
            tracing::warn!(tensor = %second, "contiguous ref tensor not found in any list");
            continue;
        };
        match links.get(&source) {
            Some(&existing) if existing != follower => {
                tracing::warn!(
                    source,
                    existing,
                    follower,
                    "contiguous list ref-linked to two different lists"
                );
                continue;
            }
            _ => {}
        }
        links.insert(source, follower);
        if source_pos != follower_pos {
            tracing::warn!(
                first = %first,
                source_pos,
                second = %second,
                follower_pos,
                "ref pair sits at different in-list positions"
            );
        }
        covered.entry((source, follower)).or_default().insert(source_pos);
    }

    for (&(source, follower), positions) in &covered {
        let source_len = model.contiguous_groups[source].len();
        let follower_len = model.contiguous_groups[follower].len();
        if source_len != follower_len {
            tracing::warn!(source, follower, "ref-linked contiguous lists differ in length");
        }
        for position in 0..follower_len {
            if !positions.contains(&position) {
                tracing::warn!(
                    source,
                    follower,
                    position,
                    "ref-linked contiguous lists leave a position unpaired"
                );
            }
        }
    }
    links
}

/// Members of a linked list pair alias each other positionally, so the
/// whole union may share memory freely.
fn force_linked_mutual_reuse(
    model: &Model,
    links: &BTreeMap<usize, usize>,
    rows: &mut [DynBitset],
) {
    for (&source, &follower) in links {
        let union: Vec<usize> = model.contiguous_groups[source]
            .iter()
            .chain(&model.contiguous_groups[follower])
            .map(|id| id.index())
            .collect();
        for &a in &union {
            for &b in &union {
                rows[a].set(b);
                rows[b].set(a);
            }
        }
    }
}
