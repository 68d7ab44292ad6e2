//! Size factor estimation using the median of ratios method

use ndarray::{Array1, ArrayView2, Axis};

use crate::data::ExpressionDataSet;
use crate::error::{DgeError, Result};

/// Estimate median-of-ratios size factors and store them on the dataset.
///
/// Accounts for sequencing depth and RNA composition: each sample's factor
/// is the median over genes of count / geometric mean of that gene.
pub fn estimate_size_factors(dds: &mut ExpressionDataSet) -> Result<()> {
    let size_factors = median_of_ratios(dds.counts().counts())?;
    log::debug!("Size factors: {:?}", size_factors.to_vec());
    dds.set_size_factors(size_factors)
}

/// Median of ratios over genes that are non-zero in every sample
pub fn median_of_ratios(counts: ArrayView2<f64>) -> Result<Array1<f64>> {
    let (n_genes, n_samples) = counts.dim();
    if n_genes == 0 || n_samples == 0 {
        return Err(DgeError::EmptyData {
            reason: "Count matrix is empty".to_string(),
        });
    }

    // log geometric means of genes with all counts positive
    let log_geo_means: Vec<(usize, f64)> = counts
        .axis_iter(Axis(0))
        .enumerate()
        .filter(|(_, row)| row.iter().all(|&x| x > 0.0))
        .map(|(i, row)| (i, row.iter().map(|&x| x.ln()).sum::<f64>() / n_samples as f64))
        .collect();

    if log_geo_means.is_empty() {
        return Err(DgeError::SizeFactorFailed {
            reason: "every gene contains at least one zero; cannot compute geometric means"
                .to_string(),
        });
    }

    let mut size_factors = Array1::zeros(n_samples);
    for j in 0..n_samples {
        let mut log_ratios: Vec<f64> = log_geo_means
            .iter()
            .map(|&(i, lgm)| counts[[i, j]].ln() - lgm)
            .collect();
        size_factors[j] = median(&mut log_ratios).exp();
    }

    if size_factors.iter().any(|&x| x <= 0.0 || !x.is_finite()) {
        return Err(DgeError::SizeFactorFailed {
            reason: "Invalid size factors computed".to_string(),
        });
    }

    Ok(size_factors)
}

pub(crate) fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len();
    if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_proportional_libraries() {
        // sample 2 is sequenced exactly twice as deep
        let counts = array![[10.0, 20.0], [30.0, 60.0], [5.0, 10.0]];
        let sf = median_of_ratios(counts.view()).unwrap();
        assert!((sf[1] / sf[0] - 2.0).abs() < 1e-12);
        // geometric mean of the factors is one
        assert!((sf[0] * sf[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_genes_with_zero_are_skipped() {
        let counts = array![[10.0, 10.0], [0.0, 500.0], [20.0, 20.0]];
        let sf = median_of_ratios(counts.view()).unwrap();
        assert!((sf[0] - 1.0).abs() < 1e-12);
        assert!((sf[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_genes_with_zero_fails() {
        let counts = array![[0.0, 10.0], [5.0, 0.0]];
        assert!(median_of_ratios(counts.view()).is_err());
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), 2.5);
    }
}
