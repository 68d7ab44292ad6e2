//! rnaseq_dge: RNA-seq differential expression for a two-condition experiment
//!
//! Reads per-sample featureCounts files, pivots them into a gene x sample
//! matrix with an aligned sample table, fits a negative binomial GLM per
//! gene and tests `treatment` with a Wald test. Alongside the results table
//! it writes a variance-stabilized matrix, PCA coordinates, and PCA, MA and
//! volcano plots.
//!
//! # Example
//!
//! ```ignore
//! use rnaseq_dge::prelude::*;
//!
//! let config = AnalysisConfig {
//!     inputs: vec!["counts/".into()],
//!     annotation: Some("symbols.tsv".into()),
//!     ..AnalysisConfig::default()
//! };
//! let report = run_pipeline(&config)?;
//! println!("{}", report.summary.results);
//! ```

pub mod annotation;
pub mod cli;
pub mod config;
pub mod data;
pub mod dispersion;
pub mod error;
pub mod filter;
pub mod glm;
pub mod io;
pub mod normalization;
pub mod pca;
pub mod pipeline;
pub mod plot;
pub mod report;
pub mod testing;
pub mod transform;

pub use pipeline::{run_pipeline, AnalysisReport};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::annotation::{AnnotationFormat, AnnotationTable, GeneAnnotator, NoAnnotation};
    pub use crate::config::AnalysisConfig;
    pub use crate::data::{pivot_counts, CountMatrix, CountRecord, ExpressionDataSet, SampleMetadata};
    pub use crate::dispersion::{estimate_dispersions, DispersionParams, DispersionTrend};
    pub use crate::error::{DgeError, Result};
    pub use crate::filter::{independent_filtering, prefilter_low_counts};
    pub use crate::glm::{fit_glm, DesignInfo, GlmFitParams};
    pub use crate::io::{discover_inputs, ingest_files, read_featurecounts, SampleNaming, TreatmentRule};
    pub use crate::normalization::estimate_size_factors;
    pub use crate::pca::{plot_pca_data, prcomp, PcaResult};
    pub use crate::pipeline::{
        ingest_counts, pca_stage, prepare_dataset, run_pipeline, test_stage, write_ingested_tables,
        AnalysisReport,
    };
    pub use crate::report::{shape_results, AnnotatedResult, SignificanceThresholds};
    pub use crate::testing::{benjamini_hochberg, wald_test, Contrast, DeResults, ResultsSummary};
    pub use crate::transform::{vst, VstResult};
}
