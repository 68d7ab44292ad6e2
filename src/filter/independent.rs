//! Independent filtering on mean normalized count
//!
//! Low-count genes carry little power; dropping them before the BH
//! adjustment shrinks the multiple testing burden. The base-mean cutoff is
//! chosen from 50 quantile thresholds by smoothing the rejection curve.

use crate::normalization::median;
use crate::testing::{benjamini_hochberg, DeResults};

const N_THETA: usize = 50;

/// Re-adjust `results.padj` keeping only genes above the chosen base-mean
/// quantile; filtered genes get `padj = NaN`
pub fn independent_filtering(results: &mut DeResults, alpha: f64) {
    let n = results.n_genes();
    if n == 0 {
        return;
    }

    let mut sorted: Vec<f64> = results.base_means.iter().copied().filter(|m| m.is_finite()).collect();
    if sorted.is_empty() {
        return;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let lower = results.base_means.iter().filter(|&&m| m == 0.0).count() as f64 / n as f64;
    let upper = if lower < 0.95 { 0.95 } else { 1.0 };
    let thetas: Vec<f64> = (0..N_THETA)
        .map(|i| lower + (upper - lower) * i as f64 / (N_THETA - 1) as f64)
        .collect();
    let cutoffs: Vec<f64> = thetas.iter().map(|&t| quantile_type7(&sorted, t)).collect();

    let adjusted: Vec<Vec<f64>> = cutoffs
        .iter()
        .map(|&cutoff| {
            let pvalues: Vec<f64> = results
                .pvalues
                .iter()
                .zip(&results.base_means)
                .map(|(&p, &m)| if m >= cutoff { p } else { f64::NAN })
                .collect();
            benjamini_hochberg(&pvalues)
        })
        .collect();
    let num_rej: Vec<f64> = adjusted
        .iter()
        .map(|padj| padj.iter().filter(|&&p| p < alpha).count() as f64)
        .collect();

    let j = select_theta(&thetas, &num_rej);
    log::debug!(
        "Independent filtering: theta={:.3}, cutoff={:.3}, rejections={}",
        thetas[j],
        cutoffs[j],
        num_rej[j]
    );

    results.filter_threshold = Some(cutoffs[j]);
    if let Some(padj) = adjusted.into_iter().nth(j) {
        results.padj = padj;
    }
}

/// First theta whose rejection count exceeds the lowess maximum minus the
/// fit's RMSE; no filtering when at most 10 genes are ever rejected
fn select_theta(thetas: &[f64], num_rej: &[f64]) -> usize {
    let max_rej = num_rej.iter().copied().fold(0.0, f64::max);
    if max_rej <= 10.0 {
        return 0;
    }

    let fit = lowess(thetas, num_rej, 0.2, 3);
    let residuals: Vec<f64> = num_rej
        .iter()
        .zip(&fit)
        .filter(|(&r, _)| r > 0.0)
        .map(|(&r, &f)| r - f)
        .collect();
    let rmse = if residuals.is_empty() {
        0.0
    } else {
        (residuals.iter().map(|r| r * r).sum::<f64>() / residuals.len() as f64).sqrt()
    };
    let max_fit = fit.iter().copied().fold(f64::MIN, f64::max);

    [max_fit - rmse, 0.9 * max_fit, 0.8 * max_fit]
        .iter()
        .find_map(|&thresh| num_rej.iter().position(|&r| r > thresh))
        .unwrap_or(0)
}

/// Sample quantile, linear interpolation between order statistics
fn quantile_type7(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let h = (n - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Robust locally weighted linear smoothing of `y` on sorted `x`
fn lowess(x: &[f64], y: &[f64], f: f64, iterations: usize) -> Vec<f64> {
    let n = x.len();
    let k = ((f * n as f64).round() as usize).clamp(2, n.max(2)).min(n);
    let mut robustness = vec![1.0; n];
    let mut fitted = y.to_vec();

    for step in 0..=iterations {
        for i in 0..n {
            // k nearest neighbours of x[i]
            let mut lo = i.saturating_sub(k - 1).min(n - k);
            while lo + k < n && x[i] - x[lo] > x[lo + k] - x[i] {
                lo += 1;
            }
            let window = lo..lo + k;
            let h = window
                .clone()
                .map(|j| (x[j] - x[i]).abs())
                .fold(0.0, f64::max)
                .max(1e-12);

            let (mut sw, mut swx, mut swy, mut swxx, mut swxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
            for j in window {
                let u = (x[j] - x[i]).abs() / h;
                let w = if u < 1.0 { (1.0 - u.powi(3)).powi(3) } else { 0.0 } * robustness[j];
                sw += w;
                swx += w * x[j];
                swy += w * y[j];
                swxx += w * x[j] * x[j];
                swxy += w * x[j] * y[j];
            }
            if sw <= 0.0 {
                fitted[i] = y[i];
                continue;
            }
            let mx = swx / sw;
            let my = swy / sw;
            let var = swxx / sw - mx * mx;
            fitted[i] = if var > 1e-12 {
                my + (swxy / sw - mx * my) / var * (x[i] - mx)
            } else {
                my
            };
        }

        if step == iterations {
            break;
        }
        let abs_res: Vec<f64> = y.iter().zip(&fitted).map(|(a, b)| (a - b).abs()).collect();
        let s = median(&mut abs_res.clone());
        if s <= 0.0 {
            break;
        }
        for (r, w) in abs_res.iter().zip(robustness.iter_mut()) {
            let u = *r / (6.0 * s);
            *w = if u < 1.0 { (1.0 - u * u).powi(2) } else { 0.0 };
        }
    }
    fitted
}
