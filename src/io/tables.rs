//! Tab-separated exports of matrices and the sample table

use std::path::Path;

use ndarray::ArrayView2;

use crate::data::SampleMetadata;
use crate::error::{DgeError, Result};

/// Tab-delimited csv writer; fields holding a tab or quote are quoted
pub(crate) fn tsv_writer<P: AsRef<Path>>(path: P) -> Result<csv::Writer<std::fs::File>> {
    Ok(csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?)
}

/// Write a gene x sample matrix with a `gene_id` first column
pub fn write_matrix_tsv<P: AsRef<Path>>(
    path: P,
    gene_ids: &[String],
    sample_ids: &[String],
    values: ArrayView2<f64>,
) -> Result<()> {
    if values.dim() != (gene_ids.len(), sample_ids.len()) {
        return Err(DgeError::DimensionMismatch {
            expected: format!("{} x {}", gene_ids.len(), sample_ids.len()),
            got: format!("{:?}", values.dim()),
        });
    }
    let mut wtr = tsv_writer(path)?;

    let mut header = Vec::with_capacity(sample_ids.len() + 1);
    header.push("gene_id");
    header.extend(sample_ids.iter().map(|s| s.as_str()));
    wtr.write_record(&header)?;

    for (gene_id, row) in gene_ids.iter().zip(values.rows()) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(gene_id.clone());
        // integral values print without a trailing ".0"
        record.extend(row.iter().map(|v| {
            if v.fract() == 0.0 && v.abs() < 1e15 {
                format!("{}", *v as i64)
            } else {
                format!("{:.6}", v)
            }
        }));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the sample table, one row per sample in column order
pub fn write_metadata_tsv<P: AsRef<Path>>(path: P, metadata: &SampleMetadata) -> Result<()> {
    let mut wtr = tsv_writer(path)?;
    let names = metadata.condition_names();

    let mut header = vec!["sample_id"];
    header.extend(names.iter().copied());
    wtr.write_record(&header)?;

    for (j, sample_id) in metadata.sample_ids().iter().enumerate() {
        let mut record = vec![sample_id.as_str()];
        for name in &names {
            let values = metadata.condition(name).unwrap_or(&[]);
            record.push(values.get(j).map(|s| s.as_str()).unwrap_or(""));
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}
