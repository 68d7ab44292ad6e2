//! Gene-wise dispersion estimation using Cox-Reid adjusted profile likelihood
//!
//! Means are held fixed at the group-mean (linear model) fit when the design
//! is a pure group design, otherwise at the NB GLM fit for the starting
//! dispersion. The adjusted profile likelihood is then maximized over
//! `log(alpha)` with an Armijo line search, falling back to a grid search
//! when the line search does not settle.

use ndarray::{Array1, Array2};
use rayon::prelude::*;
use statrs::function::gamma::{digamma, ln_gamma};

use super::DispersionParams;
use crate::data::ExpressionDataSet;
use crate::error::{DgeError, Result};
use crate::glm::linalg::{invert_symmetric, log_det_symmetric, solve_symmetric, xtwx};
use crate::glm::{fit_single_gene, GlmFitParams, MIN_MU};

/// Estimate the gene-wise dispersion of every gene against `design`
pub fn estimate_gene_dispersions(
    dds: &mut ExpressionDataSet,
    design: &Array2<f64>,
    params: &DispersionParams,
) -> Result<()> {
    let size_factors = dds
        .size_factors()
        .ok_or_else(|| DgeError::InvalidInput {
            reason: "Size factors must be estimated before dispersions".to_string(),
        })?
        .to_vec();

    if design.nrows() != dds.n_samples() {
        return Err(DgeError::DimensionMismatch {
            expected: format!("{} design rows", dds.n_samples()),
            got: format!("{}", design.nrows()),
        });
    }
    if design.nrows() <= design.ncols() {
        return Err(DgeError::InvalidDesignMatrix {
            reason: "no residual degrees of freedom; replicates are required to estimate dispersion"
                .to_string(),
        });
    }

    let counts = dds.counts().counts();
    let n_samples = dds.n_samples();
    let xim = size_factors.iter().map(|&s| 1.0 / s).sum::<f64>() / n_samples as f64;
    let group_design = is_group_design(design);

    let dispersions: Vec<f64> = (0..dds.n_genes())
        .into_par_iter()
        .map(|i| {
            let gene_counts = counts.row(i).to_vec();
            estimate_dispersion_gene(&gene_counts, &size_factors, design, xim, group_design, params)
        })
        .collect();

    let n_zero = dispersions.iter().filter(|d| d.is_nan()).count();
    if n_zero > 0 {
        log::debug!("{} all-zero genes have no gene-wise dispersion", n_zero);
    }

    dds.set_gene_dispersions(Array1::from_vec(dispersions))
}

/// A design whose distinct rows number exactly its columns, so fitted
/// means are plain group means
fn is_group_design(design: &Array2<f64>) -> bool {
    let mut rows: Vec<Vec<i64>> = Vec::new();
    for row in design.rows() {
        let key: Vec<i64> = row.iter().map(|&x| (x * 1000.0).round() as i64).collect();
        if !rows.contains(&key) {
            rows.push(key);
        }
    }
    rows.len() == design.ncols()
}

/// Gene-wise dispersion for one gene. All-zero genes give `NaN`.
pub fn estimate_dispersion_gene(
    counts: &[f64],
    size_factors: &[f64],
    design: &Array2<f64>,
    xim: f64,
    group_design: bool,
    params: &DispersionParams,
) -> f64 {
    if counts.iter().all(|&c| c == 0.0) {
        return f64::NAN;
    }

    let n = counts.len();
    let max_disp = params.max_disp(n);
    let normalized: Vec<f64> = counts
        .iter()
        .zip(size_factors)
        .map(|(&c, &s)| c / s)
        .collect();

    let rough = rough_disp_estimate(&normalized, design);
    let moments = moments_disp_estimate(&normalized, xim);
    let alpha_init = rough.min(moments).clamp(params.min_disp, max_disp);

    let mu = if group_design {
        linear_model_mu(&normalized, design)
            .iter()
            .zip(size_factors)
            .map(|(&m, &s)| (m * s).max(MIN_MU))
            .collect()
    } else {
        let sf = Array1::from_vec(size_factors.to_vec());
        let y = Array1::from_vec(counts.to_vec());
        fit_single_gene(y.view(), design, sf.view(), alpha_init, &GlmFitParams::default()).mu
    };

    let search = line_search(counts, design, &mu, alpha_init, max_disp, params);

    // keep the start when the search brought no real improvement
    let no_increase = search.last_lp < search.initial_lp + search.initial_lp.abs() / 1e6;
    let mut alpha = if no_increase { alpha_init } else { search.alpha };

    let converged = search.iterations < params.maxit && search.iterations != 1;
    if !converged && alpha > params.min_disp * 10.0 {
        alpha = grid_search(counts, design, &mu, params.min_disp, max_disp);
    }

    alpha.clamp(params.min_disp, max_disp)
}

/// `sum(((y - mu)^2 - mu) / mu^2) / (n - p)` on normalized counts
fn rough_disp_estimate(normalized: &[f64], design: &Array2<f64>) -> f64 {
    let n = normalized.len();
    let p = design.ncols();
    let mu = linear_model_mu(normalized, design);
    let sum: f64 = normalized
        .iter()
        .zip(&mu)
        .map(|(&y, &m)| {
            let m = m.max(1.0);
            ((y - m).powi(2) - m) / (m * m)
        })
        .sum();
    (sum / (n - p) as f64).max(0.0)
}

/// `(var - xim * mean) / mean^2`
fn moments_disp_estimate(normalized: &[f64], xim: f64) -> f64 {
    let n = normalized.len() as f64;
    let mean = normalized.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return f64::INFINITY;
    }
    let var = normalized.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (var - xim * mean) / (mean * mean)
}

/// Least-squares fitted values of normalized counts on the design
fn linear_model_mu(normalized: &[f64], design: &Array2<f64>) -> Vec<f64> {
    let p = design.ncols();
    let xtx = xtwx(design, &vec![1.0; normalized.len()]);
    let mut xty = vec![0.0; p];
    for (i, &y) in normalized.iter().enumerate() {
        for j in 0..p {
            xty[j] += design[[i, j]] * y;
        }
    }
    let beta = solve_symmetric(&xtx, &xty, p);
    design
        .rows()
        .into_iter()
        .map(|row| row.iter().zip(&beta).map(|(x, b)| x * b).sum())
        .collect()
}

/// Cox-Reid adjusted log-likelihood at `log(alpha)`
fn log_posterior(counts: &[f64], design: &Array2<f64>, mu: &[f64], log_alpha: f64) -> f64 {
    let alpha = log_alpha.exp();
    let alpha_inv = 1.0 / alpha;
    let mut ll = 0.0;
    let mut weights = Vec::with_capacity(counts.len());
    for (&y, &m) in counts.iter().zip(mu) {
        ll += ln_gamma(y + alpha_inv) - ln_gamma(alpha_inv)
            - y * (m + alpha_inv).ln()
            - alpha_inv * (1.0 + m * alpha).ln();
        weights.push(1.0 / (1.0 / m + alpha));
    }
    let p = design.ncols();
    let cr = -0.5 * log_det_symmetric(&xtwx(design, &weights), p);
    ll + cr
}

/// d log_posterior / d log(alpha)
fn d_log_posterior(counts: &[f64], design: &Array2<f64>, mu: &[f64], log_alpha: f64) -> f64 {
    let alpha = log_alpha.exp();
    let alpha_inv = 1.0 / alpha;
    let alpha_sq = alpha * alpha;

    let mut dll = 0.0;
    let mut weights = Vec::with_capacity(counts.len());
    let mut dweights = Vec::with_capacity(counts.len());
    for (&y, &m) in counts.iter().zip(mu) {
        dll += (digamma(alpha_inv) - digamma(y + alpha_inv)) / alpha_sq
            + y / (alpha_sq * (m + alpha_inv))
            + (1.0 + m * alpha).ln() / alpha_sq
            - m / (alpha * (1.0 + m * alpha));
        let w = 1.0 / (1.0 / m + alpha);
        weights.push(w);
        dweights.push(-w * w);
    }

    // d/dalpha of -0.5 log|B| is -0.5 tr(B^-1 dB)
    let p = design.ncols();
    let b_inv = invert_symmetric(&xtwx(design, &weights), p);
    let db = xtwx(design, &dweights);
    let trace: f64 = (0..p)
        .map(|j| (0..p).map(|k| b_inv[j * p + k] * db[k * p + j]).sum::<f64>())
        .sum();

    (dll - 0.5 * trace) * alpha
}

struct LineSearch {
    alpha: f64,
    initial_lp: f64,
    last_lp: f64,
    iterations: usize,
}

/// Armijo line search over `log(alpha)`
fn line_search(
    counts: &[f64],
    design: &Array2<f64>,
    mu: &[f64],
    alpha_init: f64,
    max_disp: f64,
    params: &DispersionParams,
) -> LineSearch {
    const MIN_LOG_ALPHA_HARD: f64 = -30.0;
    const MAX_LOG_ALPHA_HARD: f64 = 10.0;
    const EPSILON: f64 = 1e-4;
    let min_log_alpha = (params.min_disp / 10.0).ln();

    let mut log_alpha = alpha_init.ln().clamp(MIN_LOG_ALPHA_HARD, max_disp.ln());
    let initial_lp = log_posterior(counts, design, mu, log_alpha);
    let mut lp = initial_lp;
    let mut dlp = d_log_posterior(counts, design, mu, log_alpha);
    let mut kappa = params.kappa_0;
    let mut accepted = 0;
    let mut iterations = params.maxit;

    for iter in 0..params.maxit {
        let raw = log_alpha + kappa * dlp;
        if raw < MIN_LOG_ALPHA_HARD {
            kappa = (MIN_LOG_ALPHA_HARD - log_alpha) / dlp;
        }
        if raw > MAX_LOG_ALPHA_HARD {
            kappa = (MAX_LOG_ALPHA_HARD - log_alpha) / dlp;
        }
        let proposal = log_alpha + kappa * dlp;
        let lp_proposal = log_posterior(counts, design, mu, proposal);

        if -lp_proposal <= -lp - kappa * EPSILON * dlp * dlp {
            accepted += 1;
            log_alpha = proposal;
            let change = lp_proposal - lp;
            lp = lp_proposal;
            if change < params.disp_tol || log_alpha < min_log_alpha {
                iterations = iter + 1;
                break;
            }
            dlp = d_log_posterior(counts, design, mu, log_alpha);
            kappa = (kappa * 1.1).min(params.kappa_0);
            if accepted % 5 == 0 {
                kappa /= 2.0;
            }
        } else {
            kappa /= 2.0;
        }
    }

    LineSearch {
        alpha: log_alpha.exp(),
        initial_lp,
        last_lp: lp,
        iterations,
    }
}

/// Coarse then fine grid over `log(alpha)`
fn grid_search(counts: &[f64], design: &Array2<f64>, mu: &[f64], min_disp: f64, max_disp: f64) -> f64 {
    const N_GRID: usize = 20;

    let best_on = |lo: f64, hi: f64| -> (f64, f64) {
        let step = (hi - lo) / (N_GRID - 1) as f64;
        let best = (0..N_GRID)
            .map(|i| lo + i as f64 * step)
            .map(|a| (a, log_posterior(counts, design, mu, a)))
            .filter(|(_, lp)| lp.is_finite())
            .fold((lo, f64::NEG_INFINITY), |acc, x| if x.1 > acc.1 { x } else { acc });
        (best.0, step)
    };

    let (coarse, step) = best_on(min_disp.ln(), max_disp.ln());
    let (fine, _) = best_on(coarse - step, coarse + step);
    fine.exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CountMatrix, SampleMetadata};
    use crate::glm::dataset_design;
    use crate::normalization::estimate_size_factors;
    use ndarray::array;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn design() -> Array2<f64> {
        array![[1.0, 0.0], [1.0, 0.0], [1.0, 0.0], [1.0, 1.0], [1.0, 1.0], [1.0, 1.0]]
    }

    #[test]
    fn test_all_zero_gene_is_nan() {
        let d = estimate_dispersion_gene(&[0.0; 6], &[1.0; 6], &design(), 1.0, true, &DispersionParams::default());
        assert!(d.is_nan());
    }

    #[test]
    fn test_dispersion_within_bounds() {
        let params = DispersionParams::default();
        let counts = [25.0, 24.0, 25.0, 10.0, 20.0, 11.0];
        let sf = [1.0223, 1.0194, 1.052, 1.0169, 0.9944, 1.0543];
        let xim = sf.iter().map(|s| 1.0 / s).sum::<f64>() / 6.0;
        let d = estimate_dispersion_gene(&counts, &sf, &design(), xim, true, &params);
        assert!(d >= params.min_disp && d <= 10.0);
    }

    #[test]
    fn test_noisier_gene_has_larger_dispersion() {
        let params = DispersionParams::default();
        let sf = [1.0; 6];
        let calm = estimate_dispersion_gene(&[100.0, 102.0, 98.0, 101.0, 99.0, 100.0], &sf, &design(), 1.0, true, &params);
        let noisy = estimate_dispersion_gene(&[40.0, 200.0, 90.0, 30.0, 180.0, 110.0], &sf, &design(), 1.0, true, &params);
        assert!(noisy > calm);
        assert!(noisy > 0.1);
    }

    #[test]
    fn test_group_design_detection() {
        assert!(is_group_design(&design()));
        let slope = array![[1.0, 0.1], [1.0, 0.2], [1.0, 0.3], [1.0, 0.4]];
        assert!(!is_group_design(&slope));
    }

    #[test]
    fn test_gene_wise_on_dataset() {
        let counts = CountMatrix::new(
            array![
                [100.0, 120.0, 90.0, 110.0, 95.0, 105.0],
                [500.0, 550.0, 480.0, 520.0, 490.0, 510.0],
                [50.0, 45.0, 55.0, 48.0, 52.0, 50.0]
            ],
            strings(&["gene1", "gene2", "gene3"]),
            strings(&["s1", "s2", "s3", "s4", "s5", "s6"]),
        )
        .unwrap();
        let mut meta = SampleMetadata::new(strings(&["s1", "s2", "s3", "s4", "s5", "s6"])).unwrap();
        meta.add_condition("treatment", strings(&["A", "A", "A", "B", "B", "B"]))
            .unwrap();
        let mut dds = ExpressionDataSet::new(counts, meta, "treatment").unwrap();
        estimate_size_factors(&mut dds).unwrap();
        let (design, _) = dataset_design(&dds).unwrap();
        estimate_gene_dispersions(&mut dds, &design, &DispersionParams::default()).unwrap();

        let disp = dds.gene_dispersions().unwrap();
        assert_eq!(disp.len(), 3);
        assert!(disp.iter().all(|&d| d > 0.0 && d.is_finite()));
    }
}
