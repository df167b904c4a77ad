//! Default deterministic best-fit solver.
//!
//! Contiguous groups are placed first as single blocks, then the
//! remaining items in increasing id order, each at the lowest offset
//! where it overlaps no conflicting already-placed item. Not optimal,
//! but deterministic and constraint-correct.

use std::collections::BTreeMap;

use planar_core::TensorId;

use crate::{Placement, SolveError, SolveItem, SolveRequest, Solver};

/// Deterministic first-fit-by-lowest-offset solver.
#[derive(Clone, Copy, Debug, Default)]
pub struct BestFitSolver;

#[derive(Clone, Copy)]
struct Placed {
    id: TensorId,
    offset: u64,
    size: u64,
}

impl Solver for BestFitSolver {
    fn solve(&self, request: &SolveRequest<'_>) -> Result<Placement, SolveError> {
        let sizes: BTreeMap<TensorId, u64> =
            request.items.iter().map(|item| (item.id, item.size)).collect();
        for item in &request.items {
            if item.id.index() >= request.reuse.len() {
                return Err(SolveError::Malformed {
                    reason: format!("item {} has no reuse row", item.id),
                });
            }
        }

        let mut placed: Vec<Placed> = Vec::with_capacity(request.items.len());
        let mut offsets = BTreeMap::new();

        for group in &request.contiguous {
            let members = group_members(group, &sizes)?;
            let base = lowest_block_offset(&members, &placed, request);
            let mut cursor = base;
            for member in &members {
                offsets.insert(member.id, cursor);
                if member.size > 0 {
                    placed.push(Placed { id: member.id, offset: cursor, size: member.size });
                }
                cursor += member.size;
            }
        }

        for item in &request.items {
            if offsets.contains_key(&item.id) {
                continue;
            }
            let offset = lowest_item_offset(item, &placed, request);
            offsets.insert(item.id, offset);
            if item.size > 0 {
                placed.push(Placed { id: item.id, offset, size: item.size });
            }
        }

        let total_size = placed.iter().map(|p| p.offset + p.size).max().unwrap_or(0);
        tracing::debug!(items = offsets.len(), total_size, "best-fit placement complete");
        Ok(Placement { offsets, total_size })
    }
}

/// Resolve a contiguous group to its member items, keeping list order.
fn group_members(
    group: &[TensorId],
    sizes: &BTreeMap<TensorId, u64>,
) -> Result<Vec<SolveItem>, SolveError> {
    group
        .iter()
        .map(|&id| {
            sizes
                .get(&id)
                .map(|&size| SolveItem { id, size })
                .ok_or_else(|| SolveError::Malformed {
                    reason: format!("contiguous member {id} is not a solve item"),
                })
        })
        .collect()
}

fn conflicts(request: &SolveRequest<'_>, a: TensorId, b: TensorId) -> bool {
    a != b && !request.reuse[a.index()].get(b.index())
}

fn overlaps(offset_a: u64, size_a: u64, offset_b: u64, size_b: u64) -> bool {
    size_a != 0 && size_b != 0 && offset_a < offset_b + size_b && offset_b < offset_a + size_a
}

/// Lowest base offset where every member of the block clears all
/// conflicting placed items.
fn lowest_block_offset(members: &[SolveItem], placed: &[Placed], request: &SolveRequest<'_>) -> u64 {
    // Local offsets of members inside the block.
    let mut locals = Vec::with_capacity(members.len());
    let mut cursor = 0u64;
    for member in members {
        locals.push(cursor);
        cursor += member.size;
    }

    let mut candidates: Vec<u64> = vec![0];
    for p in placed {
        for local in &locals {
            let end = p.offset + p.size;
            if end > *local {
                candidates.push(end - *local);
            }
        }
    }
    candidates.sort_unstable();
    candidates.dedup();

    'candidate: for &base in &candidates {
        for (member, local) in members.iter().zip(&locals) {
            for p in placed {
                if conflicts(request, member.id, p.id)
                    && overlaps(base + local, member.size, p.offset, p.size)
                {
                    continue 'candidate;
                }
            }
        }
        return base;
    }
    // Unreachable: the offset past every placed item is always a candidate.
    placed.iter().map(|p| p.offset + p.size).max().unwrap_or(0)
}

/// Lowest offset where `item` clears all conflicting placed items.
fn lowest_item_offset(item: &SolveItem, placed: &[Placed], request: &SolveRequest<'_>) -> u64 {
    let mut candidates: Vec<u64> = vec![0];
    candidates.extend(
        placed
            .iter()
            .filter(|p| conflicts(request, item.id, p.id))
            .map(|p| p.offset + p.size),
    );
    candidates.sort_unstable();
    candidates.dedup();

    'candidate: for &offset in &candidates {
        for p in placed {
            if conflicts(request, item.id, p.id) && overlaps(offset, item.size, p.offset, p.size) {
                continue 'candidate;
            }
        }
        return offset;
    }
    placed.iter().map(|p| p.offset + p.size).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use planar_core::DynBitset;
    use proptest::prelude::*;

    fn matrix(n: usize, reusable: &[(u32, u32)]) -> Vec<DynBitset> {
        let mut rows: Vec<DynBitset> = (0..n).map(|_| DynBitset::new(n)).collect();
        for &(a, b) in reusable {
            rows[a as usize].set(b as usize);
            rows[b as usize].set(a as usize);
        }
        rows
    }

    fn item(id: u32, size: u64) -> SolveItem {
        SolveItem { id: TensorId(id), size }
    }

    #[test]
    fn conflicting_items_never_overlap() {
        let reuse = matrix(2, &[]);
        let request = SolveRequest {
            items: vec![item(0, 512), item(1, 512)],
            reuse: &reuse,
            contiguous: vec![],
        };
        let placement = BestFitSolver.solve(&request).unwrap();
        let (a, b) = (placement.offsets[&TensorId(0)], placement.offsets[&TensorId(1)]);
        assert!(a + 512 <= b || b + 512 <= a);
        assert_eq!(placement.total_size, 1024);
    }

    #[test]
    fn reusable_items_share_offsets() {
        let reuse = matrix(2, &[(0, 1)]);
        let request = SolveRequest {
            items: vec![item(0, 512), item(1, 512)],
            reuse: &reuse,
            contiguous: vec![],
        };
        let placement = BestFitSolver.solve(&request).unwrap();
        assert_eq!(placement.offsets[&TensorId(0)], 0);
        assert_eq!(placement.offsets[&TensorId(1)], 0);
        assert_eq!(placement.total_size, 512);
    }

    #[test]
    fn contiguous_members_are_back_to_back() {
        let reuse = matrix(3, &[]);
        let request = SolveRequest {
            items: vec![item(0, 512), item(1, 1024), item(2, 512)],
            reuse: &reuse,
            contiguous: vec![vec![TensorId(0), TensorId(1), TensorId(2)]],
        };
        let placement = BestFitSolver.solve(&request).unwrap();
        let base = placement.offsets[&TensorId(0)];
        assert_eq!(placement.offsets[&TensorId(1)], base + 512);
        assert_eq!(placement.offsets[&TensorId(2)], base + 1536);
    }

    #[test]
    fn zero_size_member_takes_no_room() {
        let reuse = matrix(3, &[]);
        let request = SolveRequest {
            items: vec![item(0, 512), item(1, 0), item(2, 512)],
            reuse: &reuse,
            contiguous: vec![vec![TensorId(0), TensorId(1), TensorId(2)]],
        };
        let placement = BestFitSolver.solve(&request).unwrap();
        let base = placement.offsets[&TensorId(0)];
        assert_eq!(placement.offsets[&TensorId(1)], base + 512);
        assert_eq!(placement.offsets[&TensorId(2)], base + 512);
    }

    #[test]
    fn missing_contiguous_member_is_malformed() {
        let reuse = matrix(1, &[]);
        let request = SolveRequest {
            items: vec![item(0, 512)],
            reuse: &reuse,
            contiguous: vec![vec![TensorId(0), TensorId(7)]],
        };
        assert!(matches!(
            BestFitSolver.solve(&request),
            Err(SolveError::Malformed { .. })
        ));
    }

    #[test]
    fn mixed_graph_packs_below_naive_sum() {
        // 0 conflicts with 1; 2 may reuse both.
        let reuse = matrix(3, &[(0, 2), (1, 2)]);
        let request = SolveRequest {
            items: vec![item(0, 1024), item(1, 512), item(2, 2048)],
            reuse: &reuse,
            contiguous: vec![],
        };
        let placement = BestFitSolver.solve(&request).unwrap();
        let naive: u64 = 1024 + 512 + 2048;
        assert!(placement.total_size < naive);
        // Pairwise disjointness for the conflicting pair.
        let (a, b) = (placement.offsets[&TensorId(0)], placement.offsets[&TensorId(1)]);
        assert!(a + 1024 <= b || b + 512 <= a);
    }

    proptest! {
        /// Any pair the matrix does not mark reusable ends up disjoint.
        #[test]
        fn placements_respect_the_reuse_matrix(
            sizes in proptest::collection::vec(1u64..8, 2..12),
            pairs in proptest::collection::vec(
                (any::<prop::sample::Index>(), any::<prop::sample::Index>()),
                0..20,
            ),
        ) {
            let n = sizes.len();
            let mut rows: Vec<DynBitset> = (0..n).map(|_| DynBitset::new(n)).collect();
            for (i, row) in rows.iter_mut().enumerate() {
                row.set(i);
            }
            for (a, b) in pairs {
                let (a, b) = (a.index(n), b.index(n));
                rows[a].set(b);
                rows[b].set(a);
            }
            let items: Vec<SolveItem> = sizes
                .iter()
                .enumerate()
                .map(|(i, &s)| item(i as u32, s * 512))
                .collect();
            let request = SolveRequest {
                items: items.clone(),
                reuse: &rows,
                contiguous: vec![],
            };
            let placement = BestFitSolver.solve(&request).unwrap();
            for a in &items {
                for b in &items {
                    if a.id >= b.id || rows[a.id.index()].get(b.id.index()) {
                        continue;
                    }
                    let (oa, ob) = (placement.offsets[&a.id], placement.offsets[&b.id]);
                    prop_assert!(
                        oa + a.size <= ob || ob + b.size <= oa,
                        "items {} and {} overlap", a.id, b.id
                    );
                }
            }
        }
    }
}
