//! Significance calls and volcano-plot coordinates per gene

use serde::{Deserialize, Serialize};

use crate::annotation::GeneAnnotator;
use crate::testing::DeResults;

/// A gene is significant when `padj < padj` and `|log2FC| >= lfc`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignificanceThresholds {
    pub padj: f64,
    pub lfc: f64,
}

impl Default for SignificanceThresholds {
    fn default() -> Self {
        Self { padj: 0.05, lfc: 1.0 }
    }
}

impl SignificanceThresholds {
    pub fn is_significant(&self, padj: f64, log2_fold_change: f64) -> bool {
        !padj.is_nan() && padj < self.padj && log2_fold_change.abs() >= self.lfc
    }
}

/// One row of the final results table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedResult {
    pub gene_id: String,
    pub symbol: Option<String>,
    pub base_mean: f64,
    pub log2_fold_change: f64,
    pub lfc_se: f64,
    pub stat: f64,
    pub pvalue: f64,
    pub padj: f64,
    pub significant: bool,
    /// `-log10(padj)`, 0 when padj is undefined
    pub neg_log10_padj: f64,
}

impl AnnotatedResult {
    /// Symbol when known, gene id otherwise
    pub fn label(&self) -> &str {
        self.symbol.as_deref().unwrap_or(&self.gene_id)
    }
}

/// Attach symbols, significance calls and transformed p-values, keeping
/// gene order
pub fn shape_results<A: GeneAnnotator + ?Sized>(
    results: &DeResults,
    annotator: &A,
    thresholds: &SignificanceThresholds,
) -> Vec<AnnotatedResult> {
    let rows: Vec<AnnotatedResult> = (0..results.n_genes())
        .map(|i| {
            let padj = results.padj[i];
            let lfc = results.log2_fold_changes[i];
            AnnotatedResult {
                gene_id: results.gene_ids[i].clone(),
                symbol: annotator.symbol(&results.gene_ids[i]).map(str::to_string),
                base_mean: results.base_means[i],
                log2_fold_change: lfc,
                lfc_se: results.lfc_se[i],
                stat: results.stat[i],
                pvalue: results.pvalues[i],
                padj,
                significant: thresholds.is_significant(padj, lfc),
                neg_log10_padj: neg_log10(padj),
            }
        })
        .collect();

    let annotated = rows.iter().filter(|r| r.symbol.is_some()).count();
    log::info!(
        "{} of {} genes annotated, {} significant (padj < {}, |log2FC| >= {})",
        annotated,
        rows.len(),
        rows.iter().filter(|r| r.significant).count(),
        thresholds.padj,
        thresholds.lfc
    );
    rows
}

/// padj of exactly 0 is clamped to the smallest positive f64
fn neg_log10(padj: f64) -> f64 {
    if padj.is_nan() {
        0.0
    } else {
        -padj.max(f64::MIN_POSITIVE).log10()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationTable;
    use crate::testing::Contrast;

    fn results() -> DeResults {
        DeResults {
            gene_ids: vec!["ENSG1.2".into(), "ENSG2".into(), "ENSG3".into(), "ENSG4".into(), "ENSG5".into()],
            base_means: vec![100.0, 50.0, 20.0, 0.0, 10.0],
            log2_fold_changes: vec![2.0, -1.0, 0.5, 0.0, -3.0],
            lfc_se: vec![0.2; 5],
            stat: vec![10.0, -5.0, 2.5, f64::NAN, -15.0],
            pvalues: vec![1e-20, 1e-5, 0.01, f64::NAN, 0.0],
            padj: vec![1e-18, 0.049, 0.02, f64::NAN, 0.0],
            dispersions: vec![0.1; 5],
            contrast: Contrast::new("treatment", "DAC", "control"),
            filter_threshold: None,
        }
    }

    #[test]
    fn test_significance_rule() {
        let rows = shape_results(&results(), &AnnotationTable::new(), &SignificanceThresholds::default());
        assert_eq!(
            rows.iter().map(|r| r.significant).collect::<Vec<_>>(),
            vec![true, true, false, false, true]
        );
    }

    #[test]
    fn test_neg_log10_padj() {
        let rows = shape_results(&results(), &AnnotationTable::new(), &SignificanceThresholds::default());
        assert!((rows[0].neg_log10_padj - 18.0).abs() < 1e-9);
        assert_eq!(rows[3].neg_log10_padj, 0.0);
        assert!(rows[4].neg_log10_padj.is_finite() && rows[4].neg_log10_padj > 300.0);
    }

    #[test]
    fn test_symbols_attached() {
        let mut table = AnnotationTable::new();
        table.insert("ENSG1", "TP53");
        let rows = shape_results(&results(), &table, &SignificanceThresholds::default());
        assert_eq!(rows[0].symbol.as_deref(), Some("TP53"));
        assert_eq!(rows[0].label(), "TP53");
        assert_eq!(rows[1].symbol, None);
        assert_eq!(rows[1].label(), "ENSG2");
    }

    #[test]
    fn test_custom_thresholds() {
        let strict = SignificanceThresholds { padj: 0.01, lfc: 2.0 };
        assert!(!strict.is_significant(0.02, 3.0));
        assert!(!strict.is_significant(0.001, 1.5));
        assert!(strict.is_significant(0.001, -2.0));
    }
}
