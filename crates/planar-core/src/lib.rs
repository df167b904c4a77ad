//! Core types for the Planar static memory-reuse planner.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! strongly typed identifiers, the dynamic bitset used for dependency and
//! reuse relations, the Node/Stream/Tensor/Parameter model that the
//! planning pipeline operates on, and the planner's error taxonomy.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod bitset;
pub mod error;
pub mod id;
pub mod model;
pub mod node;
pub mod tensor;

pub use bitset::DynBitset;
pub use error::PlanError;
pub use id::{NodeId, ParamId, StreamId, TensorId};
pub use model::{Model, Parameter, Stream};
pub use node::{Node, NodeKind};
pub use tensor::{Lifelong, Lifetime, Tensor, TensorKind};

/// Fixed gap, in bytes, reserved before the first and after the last
/// non-empty member of a contiguous group.
pub const GAP_SIZE: u64 = 512;

/// Allocation granularity of the arena. Every tensor's aligned size is a
/// multiple of this.
pub const MEM_ALIGN: u64 = 512;

/// Round `size` up to the arena allocation granularity. Zero stays zero.
#[must_use]
pub fn align_up(size: u64) -> u64 {
    size.div_ceil(MEM_ALIGN) * MEM_ALIGN
}
