//! Statistical testing for differential expression

mod fdr;
mod pvalue;
mod results;
mod wald;

pub use fdr::benjamini_hochberg;
pub use pvalue::calculate_pvalue;
pub use results::{Contrast, DeResults, ResultsSummary};
pub use wald::{contrast_coefficient, wald_test};
