//! Offset-assignment solving for the Planar memory planner.
//!
//! The planner consumes solving as an opaque service behind the
//! [`Solver`] trait: given item sizes, the may-reuse matrix and ordered
//! contiguous groups, return one byte offset per item plus the total
//! arena extent, or fail. [`BestFitSolver`] is the default
//! implementation; callers with a stronger external solver plug it in
//! through the same trait.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod best_fit;

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use planar_core::{DynBitset, TensorId};

pub use best_fit::BestFitSolver;

/// One buffer to place.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SolveItem {
    /// Tensor id, also the item's row index into the reuse matrix.
    pub id: TensorId,
    /// Aligned size in bytes. May be zero for contiguous members whose
    /// allocation was absorbed elsewhere; such items still receive an
    /// offset inside their group.
    pub size: u64,
}

/// A complete solving problem.
///
/// `reuse` is indexed by tensor id: bit `j` of row `i` set means items
/// `i` and `j` may occupy overlapping byte ranges. The solver must keep
/// every other pair disjoint. `contiguous` lists must be laid out
/// back-to-back in list order.
#[derive(Debug)]
pub struct SolveRequest<'a> {
    /// Items to place.
    pub items: Vec<SolveItem>,
    /// May-reuse matrix rows, indexed by tensor id.
    pub reuse: &'a [DynBitset],
    /// Ordered contiguous placement constraints.
    pub contiguous: Vec<Vec<TensorId>>,
}

/// A successful solving result.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Placement {
    /// Byte offset per item.
    pub offsets: BTreeMap<TensorId, u64>,
    /// Maximum `offset + size` over all items.
    pub total_size: u64,
}

/// Solver failure. Always fatal to the planning run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SolveError {
    /// The problem is malformed (an item without a reuse row, or a
    /// contiguous member that is not an item).
    Malformed {
        /// Description of the defect.
        reason: String,
    },
    /// No feasible placement was found.
    Infeasible {
        /// Description of the failure.
        reason: String,
    },
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { reason } => write!(f, "malformed solve request: {reason}"),
            Self::Infeasible { reason } => write!(f, "no feasible placement: {reason}"),
        }
    }
}

impl Error for SolveError {}

/// An offset-assignment solver.
pub trait Solver {
    /// Place every item, honouring the reuse matrix and contiguous
    /// constraints.
    fn solve(&self, request: &SolveRequest<'_>) -> Result<Placement, SolveError>;
}
