//! Pivot long count records into a wide matrix plus sample table

use std::collections::HashMap;

use ndarray::Array2;

use super::{CountMatrix, CountRecord, SampleMetadata};
use crate::error::{DgeError, Result};

/// Name of the metadata column holding the treatment label
pub const TREATMENT_COLUMN: &str = "treatment";

/// Pivot long-format records into a gene x sample matrix and the matching
/// sample metadata.
///
/// Samples keep first-seen order and metadata rows are emitted in exactly
/// that order, so matrix column `j` always describes metadata row `j`.
/// Every sample must report the same set of genes, once each.
pub fn pivot_counts(records: &[CountRecord]) -> Result<(CountMatrix, SampleMetadata)> {
    if records.is_empty() {
        return Err(DgeError::EmptyData {
            reason: "No count records to reshape".to_string(),
        });
    }

    let mut sample_ids: Vec<String> = Vec::new();
    let mut treatments: Vec<String> = Vec::new();
    let mut sample_index: HashMap<&str, usize> = HashMap::new();
    let mut gene_ids: Vec<String> = Vec::new();
    let mut gene_index: HashMap<&str, usize> = HashMap::new();

    for rec in records {
        match sample_index.get(rec.sample_id.as_str()) {
            Some(&j) => {
                if treatments[j] != rec.treatment {
                    return Err(DgeError::InvalidMetadata {
                        reason: format!(
                            "sample '{}' is labelled both '{}' and '{}'",
                            rec.sample_id, treatments[j], rec.treatment
                        ),
                    });
                }
            }
            None => {
                sample_index.insert(rec.sample_id.as_str(), sample_ids.len());
                sample_ids.push(rec.sample_id.clone());
                treatments.push(rec.treatment.clone());
            }
        }
        if !gene_index.contains_key(rec.gene_id.as_str()) {
            gene_index.insert(rec.gene_id.as_str(), gene_ids.len());
            gene_ids.push(rec.gene_id.clone());
        }
    }

    let n_genes = gene_ids.len();
    let n_samples = sample_ids.len();
    let mut counts = Array2::<f64>::zeros((n_genes, n_samples));
    let mut filled = Array2::<bool>::from_elem((n_genes, n_samples), false);

    for rec in records {
        let i = gene_index[rec.gene_id.as_str()];
        let j = sample_index[rec.sample_id.as_str()];
        if filled[[i, j]] {
            return Err(DgeError::InvalidCountMatrix {
                reason: format!(
                    "gene '{}' reported more than once for sample '{}'",
                    rec.gene_id, rec.sample_id
                ),
            });
        }
        filled[[i, j]] = true;
        counts[[i, j]] = rec.count as f64;
    }

    if let Some(((i, j), _)) = filled.indexed_iter().find(|(_, &present)| !present) {
        return Err(DgeError::MissingGene {
            gene_id: gene_ids[i].clone(),
            sample_id: sample_ids[j].clone(),
        });
    }

    log::debug!("Pivoted {} records into {} genes x {} samples", records.len(), n_genes, n_samples);

    let mut metadata = SampleMetadata::new(sample_ids.clone())?;
    metadata.add_condition(TREATMENT_COLUMN, treatments)?;
    let matrix = CountMatrix::new(counts, gene_ids, sample_ids)?;

    Ok((matrix, metadata))
}
