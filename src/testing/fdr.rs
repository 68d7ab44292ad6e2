//! Multiple testing correction

/// Benjamini-Hochberg step-up adjustment. `NaN` p-values are left out of
/// the family and stay `NaN`.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..pvalues.len()).filter(|&i| !pvalues[i].is_nan()).collect();
    let m = order.len();
    let mut padj = vec![f64::NAN; pvalues.len()];
    if m == 0 {
        return padj;
    }
    order.sort_by(|&a, &b| pvalues[a].total_cmp(&pvalues[b]));

    let mut cummin = f64::INFINITY;
    for (rank, &i) in order.iter().enumerate().rev() {
        let adj = (pvalues[i] * m as f64 / (rank + 1) as f64).min(1.0);
        cummin = cummin.min(adj);
        padj[i] = cummin;
    }
    padj
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bh_known_values() {
        // p.adjust(c(0.01, 0.04, 0.03, 0.02), "BH")
        let padj = benjamini_hochberg(&[0.01, 0.04, 0.03, 0.02]);
        let expected = [0.04, 0.04, 0.04, 0.04];
        for (a, e) in padj.iter().zip(expected) {
            assert!((a - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_bh_with_nan() {
        let padj = benjamini_hochberg(&[0.01, f64::NAN, 0.03, 0.02]);
        assert!(padj[1].is_nan());
        assert!((padj[0] - 0.03).abs() < 1e-12);
        assert!((padj[2] - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_bh_monotone_and_capped() {
        let padj = benjamini_hochberg(&[0.001, 0.01, 0.05, 0.9]);
        assert!(padj.windows(2).all(|w| w[0] <= w[1]));
        assert!(padj.iter().all(|&p| p <= 1.0));
        assert!(benjamini_hochberg(&[f64::NAN]).iter().all(|p| p.is_nan()));
    }
}
