//! Planar: a static memory-reuse planner for multi-stream dataflow graphs.
//!
//! Given a fixed schedule of compute steps producing and consuming
//! fixed-size buffers across concurrent streams, Planar assigns every
//! buffer a byte offset inside one shared arena so that buffers whose
//! lifetimes can overlap never share bytes, while aliased buffers share
//! an offset and collective buffers stay contiguous.
//!
//! This is the top-level facade crate re-exporting the public API of the
//! Planar sub-crates; adding `planar` as a single dependency is enough
//! for most users.
//!
//! # Quick start
//!
//! ```rust
//! use planar::prelude::*;
//!
//! let mut producer = ScheduleStep::new("matmul", StreamId(0));
//! producer.output_sizes = vec![1024];
//! let mut consumer = ScheduleStep::new("relu", StreamId(0));
//! consumer.output_sizes = vec![1024];
//! consumer.inputs = vec![InputRef::Produced { step: 0, index: 0 }];
//!
//! let schedule = Schedule {
//!     steps: vec![producer, consumer],
//!     ..Schedule::default()
//! };
//! let plan = Planner::new(PlannerConfig::default()).plan(&schedule).unwrap();
//!
//! // The consumer reads while it writes, so the two buffers stay apart.
//! assert_eq!(plan.arena_size(), 2048);
//! assert_ne!(
//!     plan.tensor_offset(TensorId(0)).unwrap(),
//!     plan.tensor_offset(TensorId(1)).unwrap()
//! );
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the
//! prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `planar-core` | Ids, the Node/Stream/Tensor model, errors |
//! | [`graph`] | `planar-graph` | Schedule ingestion, lifetimes, closures |
//! | [`solver`] | `planar-solver` | The `Solver` trait and best-fit packing |
//! | [`cache`] | `planar-cache` | Plan snapshots, hashing, stores |
//! | [`engine`] | `planar-engine` | Conflicts, reconciliation, the planner |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core ids, model types and the fatal error enum (`planar-core`).
pub use planar_core as types;

/// Schedule ingestion, lifetime/tag resolution and dependency closures
/// (`planar-graph`).
pub use planar_graph as graph;

/// The [`solver::Solver`] trait and the default best-fit implementation
/// (`planar-solver`).
pub use planar_solver as solver;

/// Plan snapshots, canonical-text hashing and persistent stores
/// (`planar-cache`).
pub use planar_cache as cache;

/// Conflict resolution, constraint reconciliation, diagnostics and the
/// [`engine::Planner`] pipeline (`planar-engine`).
pub use planar_engine as engine;

/// Common imports for typical Planar usage.
///
/// ```rust
/// use planar::prelude::*;
/// ```
pub mod prelude {
    pub use planar_cache::{FsStore, MemStore, PlanStore};
    pub use planar_core::{
        Lifelong, Model, NodeId, NodeKind, ParamId, PlanError, StreamId, TensorId, TensorKind,
    };
    pub use planar_engine::{MemoryPlan, PlanStats, Planner, PlannerConfig};
    pub use planar_graph::{
        InputRef, OutputAlias, Schedule, ScheduleStep, StepOutput, SyncPair,
    };
    pub use planar_solver::{BestFitSolver, Solver};
}
