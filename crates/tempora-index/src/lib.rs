//! Sub-sequence similarity grouping and indexed best-match search.
//!
//! For every sub-sequence length of a dataset, a greedy online pass
//! partitions the sub-sequences of that length into groups keyed by a
//! centroid. A query walks the lengths reachable under the warping band,
//! screens each length's groups by centroid distance, and linearly scans the
//! winning group's members under the cascade distance.

mod error;
mod global;
mod group;
mod grouped;
mod local;
mod serial;

pub use error::IndexError;
pub use global::{GroupIndex, traverse_order};
pub use group::Candidate;
pub use grouped::GroupedDataset;
