//! Dispersion estimation for negative binomial models

mod gene_wise;
mod trend;

pub use gene_wise::{estimate_dispersion_gene, estimate_gene_dispersions};
pub use trend::{fit_dispersion_trend, fit_parametric_trend, trimmed_mean_dispersion, DispersionTrend};

use ndarray::{Array1, Array2};

use crate::data::ExpressionDataSet;
use crate::error::Result;
use crate::glm::dataset_design;

/// Configurable parameters for dispersion estimation
#[derive(Debug, Clone)]
pub struct DispersionParams {
    /// Lower bound on any dispersion
    pub min_disp: f64,
    /// Log-posterior change below which the line search stops
    pub disp_tol: f64,
    /// Initial line search step
    pub kappa_0: f64,
    /// Maximum line search iterations
    pub maxit: usize,
}

impl Default for DispersionParams {
    fn default() -> Self {
        Self {
            min_disp: 1e-8,
            disp_tol: 1e-6,
            kappa_0: 1.0,
            maxit: 100,
        }
    }
}

impl DispersionParams {
    /// Upper bound `max(10, n_samples)`
    pub fn max_disp(&self, n_samples: usize) -> f64 {
        (n_samples as f64).max(10.0)
    }
}

/// Gene-wise estimates, trend, and final dispersions for the dataset's own
/// design
pub fn estimate_dispersions(dds: &mut ExpressionDataSet, params: &DispersionParams) -> Result<DispersionTrend> {
    let (design, _) = dataset_design(dds)?;
    estimate_dispersions_with_design(dds, &design, params)
}

/// Same as [`estimate_dispersions`] against an arbitrary design, e.g. `~ 1`
/// for a blind transformation
pub fn estimate_dispersions_with_design(
    dds: &mut ExpressionDataSet,
    design: &Array2<f64>,
    params: &DispersionParams,
) -> Result<DispersionTrend> {
    log::info!("Estimating gene-wise dispersions for {} genes", dds.n_genes());
    estimate_gene_dispersions(dds, design, params)?;

    log::info!("Fitting mean-dispersion trend");
    let trend = fit_dispersion_trend(dds, params.min_disp)?;

    let final_disp = final_dispersions(
        dds.gene_dispersions().map(|d| d.view()),
        dds.trended_dispersions().map(|d| d.view()),
        params.min_disp,
        params.max_disp(dds.n_samples()),
    );
    if let Some(final_disp) = final_disp {
        dds.set_dispersions(final_disp)?;
    }
    Ok(trend)
}

/// `max(gene-wise, trended)` per gene; a `NaN` gene-wise estimate takes the
/// trended value
fn final_dispersions(
    gene: Option<ndarray::ArrayView1<f64>>,
    trended: Option<ndarray::ArrayView1<f64>>,
    min_disp: f64,
    max_disp: f64,
) -> Option<Array1<f64>> {
    let (gene, trended) = (gene?, trended?);
    Some(
        gene.iter()
            .zip(trended.iter())
            .map(|(&g, &t)| {
                let d = if g.is_finite() { g.max(t) } else { t };
                d.clamp(min_disp, max_disp)
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_final_dispersions_take_maximum() {
        let gene = array![0.05, 0.5, f64::NAN];
        let trend = array![0.1, 0.1, 0.2];
        let d = final_dispersions(Some(gene.view()), Some(trend.view()), 1e-8, 10.0).unwrap();
        assert_eq!(d.to_vec(), vec![0.1, 0.5, 0.2]);
    }

    #[test]
    fn test_max_disp_floor() {
        let p = DispersionParams::default();
        assert_eq!(p.max_disp(6), 10.0);
        assert_eq!(p.max_disp(15), 15.0);
    }
}
