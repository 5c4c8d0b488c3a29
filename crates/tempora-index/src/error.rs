//! Error types for index build, query, and serialization.

use std::path::PathBuf;

use tempora_dataset::DatasetError;
use tempora_dtw::DistanceError;

/// Errors from building, querying, saving, and loading a group index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Returned when the index file cannot be opened, read, or written.
    #[error("cannot access {path}")]
    Io {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when an index file does not follow the expected layout.
    #[error("corrupt index file: {detail}")]
    Corrupt {
        /// What was being read when the mismatch was found.
        detail: String,
    },

    /// Returned when an index file was written by an incompatible format
    /// version.
    #[error("index file version {found} is incompatible (expected {expected})")]
    VersionMismatch {
        /// Version this build reads and writes.
        expected: u32,
        /// Version found in the file.
        found: u32,
    },

    /// Returned when an index file was built against a dataset of different
    /// dimensions than the one currently loaded.
    #[error(
        "index file describes a {file_items}x{file_length} dataset, \
         but the loaded dataset is {items}x{length}"
    )]
    ShapeMismatch {
        /// Item count recorded in the index file.
        file_items: usize,
        /// Item length recorded in the index file.
        file_length: usize,
        /// Item count of the loaded dataset.
        items: usize,
        /// Item length of the loaded dataset.
        length: usize,
    },

    /// Returned when a best-match query is made before an index was built or
    /// loaded.
    #[error("dataset has no index; build or load one first")]
    NotIndexed,

    /// Returned when a query has fewer than two points.
    #[error("query must have at least 2 points, got {len}")]
    QueryTooShort {
        /// Length of the rejected query.
        len: usize,
    },

    /// Returned when no indexed sub-sequence length is reachable from the
    /// query length under the warping band.
    #[error("no indexed length is within the warping band of a length-{len} query (item length {item_length})")]
    UnreachableLength {
        /// Length of the query.
        len: usize,
        /// Longest indexed sub-sequence length.
        item_length: usize,
    },

    /// Wraps a dataset-layer error.
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// Wraps a distance-layer error.
    #[error(transparent)]
    Distance(#[from] DistanceError),
}
