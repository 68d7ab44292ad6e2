//! Principal component analysis of variance-stabilized expression
//!
//! Samples are few, genes are many, so components come from the
//! eigen-decomposition of the samples x samples Gram matrix of the
//! centered data rather than the genes x genes covariance.

use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::Serialize;

use crate::data::SampleMetadata;
use crate::error::{DgeError, Result};
use crate::transform::VstResult;

/// Default number of most variable genes used by [`plot_pca_data`]
pub const DEFAULT_NTOP: usize = 500;

/// Sample coordinates on the principal components
#[derive(Debug, Clone, Serialize)]
pub struct PcaResult {
    pub sample_ids: Vec<String>,
    /// Group label of each sample, when a grouping column was given
    pub groups: Vec<String>,
    /// Samples x components
    #[serde(skip)]
    pub scores: Array2<f64>,
    /// Variance of each component
    pub variance: Vec<f64>,
    /// Fraction of total variance per component
    pub percent_var: Vec<f64>,
    /// Number of genes the decomposition used
    pub n_genes: usize,
}

impl PcaResult {
    pub fn n_components(&self) -> usize {
        self.scores.ncols()
    }

    /// Coordinates of component `k` (0-based)
    pub fn component(&self, k: usize) -> Vec<f64> {
        self.scores.column(k).to_vec()
    }
}

/// PCA over the `ntop` genes with the highest row variance, coloured by
/// `group`
pub fn plot_pca_data(
    vst: &VstResult,
    metadata: &SampleMetadata,
    group: &str,
    ntop: usize,
) -> Result<PcaResult> {
    if metadata.sample_ids() != vst.sample_ids.as_slice() {
        return Err(DgeError::SampleAlignment {
            reason: "VST columns and metadata rows differ".to_string(),
        });
    }
    let groups = metadata
        .condition(group)
        .ok_or_else(|| DgeError::InvalidMetadata {
            reason: format!("grouping column '{}' not found", group),
        })?
        .to_vec();

    let variances = row_variances(vst.data.view());
    let mut order: Vec<usize> = (0..variances.len()).collect();
    order.sort_by(|&a, &b| variances[b].total_cmp(&variances[a]));
    order.truncate(ntop.min(order.len()));

    let top = vst.data.select(Axis(0), &order);
    log::info!("PCA on the {} most variable genes", top.nrows());
    let mut result = prcomp(top.view(), &vst.sample_ids)?;
    result.groups = groups;
    Ok(result)
}

/// Centered, unscaled PCA of a genes x samples matrix, samples as
/// observations
pub fn prcomp(data: ArrayView2<f64>, sample_ids: &[String]) -> Result<PcaResult> {
    let (n_genes, n_samples) = data.dim();
    if n_samples < 2 || n_genes == 0 {
        return Err(DgeError::EmptyData {
            reason: format!("PCA needs at least 2 samples and 1 gene, got {} x {}", n_genes, n_samples),
        });
    }
    if sample_ids.len() != n_samples {
        return Err(DgeError::DimensionMismatch {
            expected: format!("{} sample ids", n_samples),
            got: format!("{}", sample_ids.len()),
        });
    }

    // samples x genes, each gene centered
    let mut x = data.t().to_owned();
    if let Some(means) = x.mean_axis(Axis(0)) {
        x -= &means;
    }

    let gram = x.dot(&x.t());
    let (eigenvalues, eigenvectors) = symmetric_eigen(gram);

    let n_comp = n_samples.min(n_genes);
    let denom = (n_samples - 1) as f64;
    let mut scores = Array2::zeros((n_samples, n_comp));
    let mut variance = Vec::with_capacity(n_comp);
    for k in 0..n_comp {
        let lambda = eigenvalues[k].max(0.0);
        let u = eigenvectors.column(k);

        // flip so the largest absolute gene loading is positive
        let loadings = x.t().dot(&u);
        let sign = loadings
            .iter()
            .copied()
            .fold(0.0f64, |best, v| if v.abs() > best.abs() { v } else { best })
            .signum();
        let sign = if sign == 0.0 { 1.0 } else { sign };

        let scale = lambda.sqrt() * sign;
        for i in 0..n_samples {
            scores[[i, k]] = u[i] * scale;
        }
        variance.push(lambda / denom);
    }

    let total: f64 = variance.iter().sum();
    let percent_var = variance
        .iter()
        .map(|v| if total > 0.0 { v / total } else { 0.0 })
        .collect();

    Ok(PcaResult {
        sample_ids: sample_ids.to_vec(),
        groups: Vec::new(),
        scores,
        variance,
        percent_var,
        n_genes,
    })
}

fn row_variances(data: ArrayView2<f64>) -> Vec<f64> {
    let n = data.ncols() as f64;
    data.rows()
        .into_iter()
        .map(|row| {
            let mean = row.sum() / n;
            row.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
        })
        .collect()
}

/// Eigen-decomposition of a symmetric matrix, eigenvalues in decreasing
/// order with eigenvectors as matching columns
fn symmetric_eigen(a: Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = a.nrows();
    let eig = SymmetricEigen::new(DMatrix::from_fn(n, n, |i, j| a[[i, j]]));

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| eig.eigenvalues[j].total_cmp(&eig.eigenvalues[i]));
    let values = order.iter().map(|&i| eig.eigenvalues[i]).collect();
    let vectors = Array2::from_shape_fn((n, n), |(r, k)| eig.eigenvectors[(r, order[k])]);
    (values, vectors)
}
