//! The Planar planning pipeline.
//!
//! Everything downstream of the dependency closure lives here: the
//! parallel conflict resolver, the ref/contiguous constraint
//! reconciler, the solver adapter with offset propagation, diagnostics,
//! and the [`Planner`] facade that runs the stages in order (or skips
//! the middle ones on a cache hit).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod assign;
pub mod conflict;
pub mod dump;
pub mod planner;
pub mod reconcile;
pub mod stats;

pub use conflict::{compute_reuse, ConflictOptions};
pub use planner::{MemoryPlan, Planner, PlannerConfig};
pub use reconcile::{reconcile, Reconciled};
pub use stats::PlanStats;
