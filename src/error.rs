//! Error types for rnaseq_dge

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the differential expression pipeline
#[derive(Error, Debug)]
pub enum DgeError {
    #[error("Invalid count matrix: {reason}")]
    InvalidCountMatrix { reason: String },

    #[error("Invalid metadata: {reason}")]
    InvalidMetadata { reason: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("Count matrix columns and metadata rows are not aligned: {reason}")]
    SampleAlignment { reason: String },

    #[error("Malformed count file {path}, line {line}: {reason}")]
    MalformedCountFile {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Cannot derive sample information from '{file_name}': {reason}")]
    SampleNaming { file_name: String, reason: String },

    #[error("Gene '{gene_id}' is missing from sample '{sample_id}'")]
    MissingGene { gene_id: String, sample_id: String },

    #[error("Annotation error: {reason}")]
    Annotation { reason: String },

    #[error("Plotting failed for {chart}: {reason}")]
    Plot { chart: String, reason: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Invalid design matrix: {reason}")]
    InvalidDesignMatrix { reason: String },

    #[error("Invalid contrast specification: {reason}")]
    InvalidContrast { reason: String },

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("Size factor estimation failed: {reason}")]
    SizeFactorFailed { reason: String },

    #[error("Trend fitting failed: {reason}")]
    TrendFittingFailed { reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid pattern: {0}")]
    RegexError(#[from] regex::Error),
}

impl DgeError {
    pub(crate) fn plot<E: std::fmt::Display>(chart: &str, err: E) -> Self {
        DgeError::Plot {
            chart: chart.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, DgeError>;
