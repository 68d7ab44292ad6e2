//! Dispersion trend fitting

use ndarray::Array1;

use crate::data::ExpressionDataSet;
use crate::error::{DgeError, Result};

/// Fitted mean-dispersion relation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DispersionTrend {
    /// `alpha(mu) = asympt_disp + extra_pois / mu`
    Parametric { asympt_disp: f64, extra_pois: f64 },
    /// A single dispersion for every gene
    Mean(f64),
}

impl DispersionTrend {
    pub fn evaluate(&self, mean: f64) -> f64 {
        match *self {
            DispersionTrend::Parametric { asympt_disp, extra_pois } => {
                if mean > 0.0 {
                    asympt_disp + extra_pois / mean
                } else {
                    asympt_disp
                }
            }
            DispersionTrend::Mean(d) => d,
        }
    }
}

/// Fit the trend of gene-wise dispersions against base mean and store the
/// trended value of every gene
pub fn fit_dispersion_trend(dds: &mut ExpressionDataSet, min_disp: f64) -> Result<DispersionTrend> {
    let gene_dispersions = dds.gene_dispersions().ok_or_else(|| DgeError::TrendFittingFailed {
        reason: "Gene-wise dispersions must be estimated first".to_string(),
    })?;
    let means = dds.base_means().ok_or_else(|| DgeError::TrendFittingFailed {
        reason: "Normalized counts required for trend fitting".to_string(),
    })?;
    let dispersions = gene_dispersions.to_vec();

    let trend = match fit_parametric_trend(&means, &dispersions, min_disp) {
        Ok((a0, a1)) => {
            log::debug!("Dispersion trend: {:.6} + {:.6} / mean", a0, a1);
            dds.set_dispersion_function(a0, a1);
            DispersionTrend::Parametric {
                asympt_disp: a0,
                extra_pois: a1,
            }
        }
        Err(e) => {
            log::warn!("{}; using the mean dispersion as the trend", e);
            DispersionTrend::Mean(trimmed_mean_dispersion(&dispersions, min_disp)?)
        }
    };

    let trended: Array1<f64> = means.iter().map(|&m| trend.evaluate(m)).collect();
    dds.set_trended_dispersions(trended)?;
    Ok(trend)
}

/// Iterated Gamma identity-link fit of `disp ~ 1 + 1/mean`, dropping genes
/// whose residual `disp / fitted` falls outside (1e-4, 15)
pub fn fit_parametric_trend(means: &[f64], dispersions: &[f64], min_disp: f64) -> Result<(f64, f64)> {
    let data: Vec<(f64, f64)> = means
        .iter()
        .zip(dispersions)
        .filter(|(&m, &d)| m > 0.0 && d.is_finite() && d > 100.0 * min_disp)
        .map(|(&m, &d)| (m, d))
        .collect();

    if data.len() < 3 {
        return Err(DgeError::TrendFittingFailed {
            reason: format!("only {} genes usable for the parametric trend", data.len()),
        });
    }

    let mut coefs = (0.1_f64, 1.0_f64);
    for iter in 0..11 {
        let old = coefs;
        let good: Vec<(f64, f64)> = data
            .iter()
            .filter(|&&(m, d)| {
                let fitted = coefs.0 + coefs.1 / m;
                let residual = d / fitted;
                fitted > 0.0 && residual > 1e-4 && residual < 15.0
            })
            .copied()
            .collect();

        if good.len() < 3 {
            return Err(DgeError::TrendFittingFailed {
                reason: "too few genes left after residual filtering".to_string(),
            });
        }

        let (fit, glm_converged) = gamma_identity_fit(&good, coefs);
        coefs = fit;
        log::debug!(
            "Trend iteration {}: {} genes, a0={:.6}, a1={:.6}",
            iter + 1,
            good.len(),
            coefs.0,
            coefs.1
        );

        if coefs.0 <= 0.0 || coefs.1 <= 0.0 {
            return Err(DgeError::TrendFittingFailed {
                reason: format!(
                    "parametric trend coefficients not positive (a0={:.4}, a1={:.4})",
                    coefs.0, coefs.1
                ),
            });
        }

        let change = (coefs.0 / old.0).ln().powi(2) + (coefs.1 / old.1).ln().powi(2);
        if change < 1e-6 && glm_converged {
            return Ok(coefs);
        }
    }

    Err(DgeError::TrendFittingFailed {
        reason: "parametric trend did not converge".to_string(),
    })
}

/// Gamma GLM with identity link on x = 1/mean, started at `start`
fn gamma_identity_fit(data: &[(f64, f64)], start: (f64, f64)) -> ((f64, f64), bool) {
    let deviance = |a0: f64, a1: f64| -> f64 {
        data.iter()
            .map(|&(m, d)| {
                let mu = (a0 + a1 / m).max(1e-8);
                2.0 * (-(d / mu).ln() + (d - mu) / mu)
            })
            .sum()
    };

    let (mut a0, mut a1) = start;
    let mut dev_old = deviance(a0, a1);
    for _ in 0..25 {
        let (mut sw, mut swx, mut swz, mut swxx, mut swxz) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for &(m, d) in data {
            let x = 1.0 / m;
            let mu = (a0 + a1 * x).max(1e-8);
            let w = 1.0 / (mu * mu);
            sw += w;
            swx += w * x;
            swz += w * d;
            swxx += w * x * x;
            swxz += w * x * d;
        }
        let det = sw * swxx - swx * swx;
        if det.abs() < 1e-10 {
            return ((a0, a1), false);
        }
        a0 = (swxx * swz - swx * swxz) / det;
        a1 = (sw * swxz - swx * swz) / det;

        let dev = deviance(a0, a1);
        if (dev_old - dev).abs() / (0.1 + dev.abs()) < 1e-8 {
            return ((a0, a1), true);
        }
        dev_old = dev;
    }
    ((a0, a1), false)
}

/// Mean of gene-wise dispersions above `10 * min_disp`, trimmed by 0.1% at
/// each end
pub fn trimmed_mean_dispersion(dispersions: &[f64], min_disp: f64) -> Result<f64> {
    let mut usable: Vec<f64> = dispersions
        .iter()
        .copied()
        .filter(|d| d.is_finite() && *d > 10.0 * min_disp)
        .collect();
    if usable.is_empty() {
        return Err(DgeError::TrendFittingFailed {
            reason: "all gene-wise dispersions are below the minimum".to_string(),
        });
    }
    usable.sort_by(|a, b| a.total_cmp(b));
    let n = usable.len();
    let trim = (n as f64 * 0.001).floor() as usize;
    let kept = &usable[trim..n - trim];
    Ok(kept.iter().sum::<f64>() / kept.len() as f64)
}
