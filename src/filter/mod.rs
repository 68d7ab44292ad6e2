//! Gene filtering before and after testing

mod independent;
mod prefilter;

pub use independent::independent_filtering;
pub use prefilter::prefilter_low_counts;
