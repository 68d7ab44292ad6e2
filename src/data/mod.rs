//! Core data structures: count records, count matrix, sample table, dataset

mod count_matrix;
mod dataset;
mod metadata;
mod record;
mod reshape;

pub use count_matrix::CountMatrix;
pub use dataset::ExpressionDataSet;
pub use metadata::SampleMetadata;
pub use record::CountRecord;
pub use reshape::{pivot_counts, TREATMENT_COLUMN};
