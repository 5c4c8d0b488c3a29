//! Sub-sequence views and warped-distance kernels.
//!
//! Pure math layer with no I/O. Provides borrowed and owned sequence types
//! with cached Keogh envelopes, the Sakoe-Chiba warping band configuration,
//! and the distance kernel set: pairwise Euclidean, band-constrained DTW,
//! the Kim and Keogh lower bounds, and the pruning cascade used for queries.

mod band;
mod distance;
mod envelope;
mod error;
mod series;

pub use band::BandRatio;
pub use distance::{
    DistanceKind, cascade_distance, cross_keogh_lower_bound, keogh_lower_bound, kim_lower_bound,
    pairwise_distance, warped_distance,
};
pub use envelope::Envelope;
pub use error::DistanceError;
pub use series::{SeqView, Sequence, Series};

/// Numeric scalar used for all series data and distances.
///
/// `f64` by default; the `single-precision` feature switches the whole engine
/// to `f32` at build time.
#[cfg(feature = "single-precision")]
pub type Value = f32;

/// Numeric scalar used for all series data and distances.
///
/// `f64` by default; the `single-precision` feature switches the whole engine
/// to `f32` at build time.
#[cfg(not(feature = "single-precision"))]
pub type Value = f64;
