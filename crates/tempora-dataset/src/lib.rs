//! Row-major time-series dataset matrix: text IO, min-max normalization,
//! PAA down-sampling, and borrowed sub-sequence views.

mod dataset;
mod error;

pub use dataset::Dataset;
pub use error::DatasetError;
