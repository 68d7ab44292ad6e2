//! Low-count pre-filtering ahead of model fitting

use crate::data::ExpressionDataSet;
use crate::error::Result;

/// Keep genes whose total count over all samples exceeds `min_total`.
/// Returns how many genes were removed.
pub fn prefilter_low_counts(dds: &mut ExpressionDataSet, min_total: f64) -> Result<usize> {
    let keep: Vec<usize> = dds
        .counts()
        .row_sums()
        .iter()
        .enumerate()
        .filter(|(_, &total)| total > min_total)
        .map(|(i, _)| i)
        .collect();

    let removed = dds.n_genes() - keep.len();
    if removed > 0 {
        dds.retain_genes(&keep)?;
    }
    log::info!(
        "Pre-filtering: removed {} genes with total count <= {}, {} remain",
        removed,
        min_total,
        dds.n_genes()
    );
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CountMatrix, SampleMetadata};
    use ndarray::array;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_removes_exactly_totals_at_or_below_one() {
        let counts = CountMatrix::new(
            array![[0.0, 0.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0], [1.0, 1.0, 0.0, 0.0], [5.0, 3.0, 2.0, 9.0]],
            strings(&["zero", "one", "two", "many"]),
            strings(&["s1", "s2", "s3", "s4"]),
        )
        .unwrap();
        let mut meta = SampleMetadata::new(strings(&["s1", "s2", "s3", "s4"])).unwrap();
        meta.add_condition("treatment", strings(&["a", "a", "b", "b"])).unwrap();
        let mut dds = ExpressionDataSet::new(counts, meta, "treatment").unwrap();

        assert_eq!(prefilter_low_counts(&mut dds, 1.0).unwrap(), 2);
        assert_eq!(dds.counts().gene_ids(), &["two", "many"]);
    }

    #[test]
    fn test_nothing_to_remove() {
        let counts = CountMatrix::new(array![[2.0, 3.0]], strings(&["g"]), strings(&["s1", "s2"])).unwrap();
        let mut meta = SampleMetadata::new(strings(&["s1", "s2"])).unwrap();
        meta.add_condition("treatment", strings(&["a", "b"])).unwrap();
        let mut dds = ExpressionDataSet::new(counts, meta, "treatment").unwrap();
        assert_eq!(prefilter_low_counts(&mut dds, 1.0).unwrap(), 0);
        assert_eq!(dds.n_genes(), 1);
    }
}
