//! Library-size normalization

mod size_factors;

pub use size_factors::{estimate_size_factors, median_of_ratios};
pub(crate) use size_factors::median;
