//! Annotated result tables and run summaries

mod shape;
mod write;

pub use shape::{shape_results, AnnotatedResult, SignificanceThresholds};
pub use write::{write_pca_tsv, write_results_tsv, write_summary_json, RunSummary};
