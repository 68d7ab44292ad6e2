//! Variance Stabilizing Transformation (VST)
//!
//! Maps counts to a log2-like scale on which the variance no longer
//! depends on the mean, using the closed-form integral of the fitted
//! mean-dispersion trend.

use ndarray::Array2;

use crate::data::ExpressionDataSet;
use crate::dispersion::{estimate_dispersions_with_design, DispersionParams, DispersionTrend};
use crate::error::{DgeError, Result};
use crate::glm::{dataset_design, intercept_design};

/// Transformed matrix with its labels
#[derive(Debug, Clone)]
pub struct VstResult {
    /// Genes x samples
    pub data: Array2<f64>,
    pub gene_ids: Vec<String>,
    pub sample_ids: Vec<String>,
    /// Trend the transformation was derived from
    pub trend: DispersionTrend,
}

/// Variance stabilizing transformation of the dataset's counts.
///
/// With `blind` the dispersion trend is re-estimated against `~ 1`, so the
/// treatment labels cannot influence the result. Otherwise a trend already
/// stored on the dataset is reused, or estimated against its design.
pub fn vst(dds: &ExpressionDataSet, blind: bool, params: &DispersionParams) -> Result<VstResult> {
    let normalized = dds.normalized_counts().ok_or_else(|| DgeError::InvalidInput {
        reason: "Size factors must be estimated before VST".to_string(),
    })?;

    let stored = match dds.dispersion_function() {
        Some((a0, a1)) if !blind => Some(DispersionTrend::Parametric {
            asympt_disp: a0,
            extra_pois: a1,
        }),
        _ => None,
    };
    let trend = match stored {
        Some(trend) => trend,
        None => {
            let mut work = dds.clone();
            let design = if blind {
                intercept_design(dds.n_samples())
            } else {
                dataset_design(dds)?.0
            };
            log::info!("Estimating dispersion trend for VST (blind = {})", blind);
            estimate_dispersions_with_design(&mut work, &design, params)?
        }
    };

    let data = normalized.mapv(|q| transform_value(&trend, q));
    Ok(VstResult {
        data,
        gene_ids: dds.counts().gene_ids().to_vec(),
        sample_ids: dds.counts().sample_ids().to_vec(),
        trend,
    })
}

/// Closed-form VST of one normalized count
pub fn transform_value(trend: &DispersionTrend, q: f64) -> f64 {
    match *trend {
        DispersionTrend::Parametric { asympt_disp: a, extra_pois: e } => {
            ((1.0 + e + 2.0 * a * q + 2.0 * (a * q * (1.0 + e + a * q)).sqrt()) / (4.0 * a)).log2()
        }
        DispersionTrend::Mean(a) => {
            (2.0 * (a * q).sqrt().asinh() - a.ln() - 4f64.ln()) / std::f64::consts::LN_2
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CountMatrix, SampleMetadata};
    use crate::normalization::estimate_size_factors;
    use ndarray::Array2;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parametric_is_monotone_and_log_like() {
        let trend = DispersionTrend::Parametric {
            asympt_disp: 0.05,
            extra_pois: 1.0,
        };
        let values: Vec<f64> = [0.0, 1.0, 10.0, 100.0, 1000.0]
            .iter()
            .map(|&q| transform_value(&trend, q))
            .collect();
        assert!(values.windows(2).all(|w| w[1] > w[0]));
        // at high counts the transform tracks log2
        let diff = transform_value(&trend, 2e7) - transform_value(&trend, 1e7);
        assert!((diff - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_mean_trend_is_monotone() {
        let trend = DispersionTrend::Mean(0.1);
        assert!(transform_value(&trend, 50.0) > transform_value(&trend, 5.0));
        assert!(transform_value(&trend, 0.0).is_finite());
    }

    #[test]
    fn test_blind_vst_on_dataset() {
        let n_genes = 60;
        let mut counts = Array2::zeros((n_genes, 6));
        for i in 0..n_genes {
            let base = 5.0 + 20.0 * i as f64;
            for j in 0..6 {
                let wobble = [0.8, 1.1, 0.95, 1.2, 0.85, 1.05][(i + j) % 6];
                counts[[i, j]] = (base * wobble).round();
            }
        }
        let gene_ids: Vec<String> = (0..n_genes).map(|i| format!("g{}", i)).collect();
        let samples = strings(&["s1", "s2", "s3", "s4", "s5", "s6"]);
        let matrix = CountMatrix::new(counts, gene_ids, samples.clone()).unwrap();
        let mut meta = SampleMetadata::new(samples).unwrap();
        meta.add_condition("treatment", strings(&["a", "a", "a", "b", "b", "b"]))
            .unwrap();
        let mut dds = ExpressionDataSet::new(matrix, meta, "treatment").unwrap();
        estimate_size_factors(&mut dds).unwrap();

        let res = vst(&dds, true, &DispersionParams::default()).unwrap();
        assert_eq!(res.data.dim(), (n_genes, 6));
        assert!(res.data.iter().all(|v| v.is_finite()));
        // higher expressed genes stay higher after the transform
        assert!(res.data[[n_genes - 1, 0]] > res.data[[0, 0]]);
        assert!(dds.dispersions().is_none());
    }
}
