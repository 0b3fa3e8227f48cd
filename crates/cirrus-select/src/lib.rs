//! cirrus-select: selection model, broadcast engine and chunk planner
//!
//! Normalizes arbitrary indexing expressions over an n-dimensional shape
//! into a canonical per-axis `Selection`, and derives two things from it:
//! - broadcast expansion of a smaller source onto a selected destination
//! - the set of storage chunks a selection touches, with the chunk-local
//!   sub-selection for each
//!
//! Every module here is pure, synchronous computation: selections carry
//! no references back to any storage object, so they are safe to cache,
//! split and replay.

#![warn(missing_docs)]

pub mod broadcast;
pub mod error;
pub mod planner;
pub mod selection;
pub mod selector;
pub mod shape;

pub use broadcast::{expand, BroadcastIter, BroadcastPair};
pub use error::{SelectError, SelectResult};
pub use planner::{guess_chunk, plan_chunks, ChunkIter, ChunkPlan};
pub use selection::{normalize, CoordMode, IndexArg, Mask, Selection};
pub use selector::AxisSelector;
pub use shape::{Extent, Shape};
