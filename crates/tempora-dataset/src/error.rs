//! Error types for dataset loading, transforms, and view construction.

use std::path::PathBuf;

use tempora_dtw::DistanceError;

/// Errors from dataset file IO, validation, and transforms.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// Returned when the dataset file cannot be opened, read, or written.
    #[error("cannot access {path}")]
    Io {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a token is not a number.
    #[error("unparsable value \"{raw}\" at row {row}, column {col}")]
    Unparsable {
        /// Zero-based row of the offending token.
        row: usize,
        /// Zero-based column of the offending token (before column dropping).
        col: usize,
        /// The raw token text.
        raw: String,
    },

    /// Returned when a token parses but is numerically out of range
    /// (overflows to an infinity) or is otherwise non-finite.
    #[error("value \"{raw}\" at row {row}, column {col} is out of range")]
    OutOfRange {
        /// Zero-based row of the offending token.
        row: usize,
        /// Zero-based column of the offending token.
        col: usize,
        /// The raw token text.
        raw: String,
    },

    /// Returned when a row has a different number of fields than the first.
    #[error("row {row} has {got} fields, expected {expected}")]
    InconsistentRow {
        /// Zero-based row index.
        row: usize,
        /// Field count fixed by the first row.
        expected: usize,
        /// Field count found.
        got: usize,
    },

    /// Returned when the input yields no rows or no data columns.
    #[error("dataset has no rows or no data columns")]
    EmptyDataset,

    /// Returned when a row index does not name an item of the dataset.
    #[error("row index {index} out of range for {rows} items")]
    InvalidRow {
        /// The rejected row index.
        index: usize,
        /// Number of items in the dataset.
        rows: usize,
    },

    /// Returned when a window `[start, end)` is empty or exceeds the item
    /// length.
    #[error("window [{start}, {end}) is invalid for item length {item_length}")]
    InvalidWindow {
        /// Requested start offset.
        start: usize,
        /// Requested exclusive end offset.
        end: usize,
        /// Length of each dataset item.
        item_length: usize,
    },

    /// Returned when a PAA block size of zero is requested.
    #[error("PAA block size must be positive")]
    InvalidBlockSize,

    /// Wraps a distance-layer error from view construction or a distance
    /// convenience call.
    #[error(transparent)]
    Distance(#[from] DistanceError),
}
