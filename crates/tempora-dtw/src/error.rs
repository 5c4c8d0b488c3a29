//! Error types for sequence validation and distance computation.

/// Errors from sequence construction and distance kernels.
#[derive(Debug, thiserror::Error)]
pub enum DistanceError {
    /// Returned when an empty slice or vector is provided as a sequence.
    #[error("sequence must be non-empty")]
    EmptySeries,

    /// Returned when an owned sequence contains NaN or an infinity.
    #[error("sequence contains non-finite value at index {index}")]
    NonFiniteValue {
        /// Position of the first non-finite value found.
        index: usize,
    },

    /// Returned when two sequences of different lengths are combined where
    /// equal lengths are required (pairwise distance, accumulation).
    #[error("sequences must have equal lengths, got {left} and {right}")]
    ShapeMismatch {
        /// Length of the left operand.
        left: usize,
        /// Length of the right operand.
        right: usize,
    },

    /// Returned when a distance name does not match a known kernel.
    #[error("unknown distance name \"{name}\"")]
    UnknownDistance {
        /// The unrecognized name.
        name: String,
    },

    /// Returned when a warping band ratio is outside `(0, 1]`.
    #[error("warping band ratio must be in (0, 1], got {ratio}")]
    InvalidBandRatio {
        /// The rejected ratio.
        ratio: f64,
    },
}
