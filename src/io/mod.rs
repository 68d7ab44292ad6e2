//! Input/output: featureCounts ingestion and table exports

mod featurecounts;
mod tables;

pub use featurecounts::{
    discover_inputs, ingest_files, read_featurecounts, SampleNaming, TreatmentRule,
    DEFAULT_SAMPLE_PATTERN,
};
pub use tables::{write_matrix_tsv, write_metadata_tsv};
pub(crate) use tables::tsv_writer;
