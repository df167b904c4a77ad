//! Graph model construction for the Planar memory planner.
//!
//! Three stages live here, in pipeline order:
//!
//! 1. [`build::build_model`] — ingest an external [`source::Schedule`]
//!    and produce the Node/Stream/Tensor model with dense ids.
//! 2. [`lifetime::resolve`] — resolve input edges into consumer sets and
//!    lifetimes, apply the special tensor category rules, and materialize
//!    cross-stream sync events.
//! 3. [`closure::build_closure`] — add stream/group ordering edges and
//!    compute per-node dependency closures as bitsets.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod build;
pub mod closure;
pub mod lifetime;
pub mod source;

pub use build::build_model;
pub use closure::{build_closure, DependencyClosure};
pub use lifetime::resolve;
pub use source::{InputRef, OutputAlias, Schedule, ScheduleStep, StepOutput, SyncPair};
