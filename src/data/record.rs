//! Long-format count records produced by ingestion

use serde::{Deserialize, Serialize};

/// One gene's raw count in one sample, tagged with the sample's treatment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountRecord {
    pub gene_id: String,
    pub sample_id: String,
    pub treatment: String,
    pub count: u64,
}

impl CountRecord {
    pub fn new(gene_id: &str, sample_id: &str, treatment: &str, count: u64) -> Self {
        Self {
            gene_id: gene_id.to_string(),
            sample_id: sample_id.to_string(),
            treatment: treatment.to_string(),
            count,
        }
    }
}
