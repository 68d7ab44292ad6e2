//! Per-gene differential expression results

use serde::{Deserialize, Serialize};

/// `numerator vs denominator` on one design variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contrast {
    pub variable: String,
    pub numerator: String,
    pub denominator: String,
}

impl Contrast {
    pub fn new(variable: &str, numerator: &str, denominator: &str) -> Self {
        Self {
            variable: variable.to_string(),
            numerator: numerator.to_string(),
            denominator: denominator.to_string(),
        }
    }
}

impl std::fmt::Display for Contrast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} vs {}", self.variable, self.numerator, self.denominator)
    }
}

/// Column-oriented Wald test results, one entry per gene. `NaN` marks an
/// undefined value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeResults {
    pub gene_ids: Vec<String>,
    /// Mean of normalized counts over all samples
    pub base_means: Vec<f64>,
    pub log2_fold_changes: Vec<f64>,
    pub lfc_se: Vec<f64>,
    /// Wald statistic
    pub stat: Vec<f64>,
    pub pvalues: Vec<f64>,
    /// BH adjusted p-values
    pub padj: Vec<f64>,
    /// Dispersions used in the fit
    pub dispersions: Vec<f64>,
    pub contrast: Contrast,
    /// Base-mean threshold chosen by independent filtering, if applied
    pub filter_threshold: Option<f64>,
}

impl DeResults {
    pub fn n_genes(&self) -> usize {
        self.gene_ids.len()
    }

    /// Genes with `padj < alpha`
    pub fn significant_genes(&self, alpha: f64) -> Vec<&str> {
        self.select(|p, _| p < alpha)
    }

    /// Significant genes with `log2FC >= min_lfc`
    pub fn upregulated_genes(&self, alpha: f64, min_lfc: f64) -> Vec<&str> {
        self.select(|p, lfc| p < alpha && lfc >= min_lfc && lfc > 0.0)
    }

    /// Significant genes with `log2FC <= -min_lfc`
    pub fn downregulated_genes(&self, alpha: f64, min_lfc: f64) -> Vec<&str> {
        self.select(|p, lfc| p < alpha && lfc <= -min_lfc && lfc < 0.0)
    }

    fn select<F: Fn(f64, f64) -> bool>(&self, keep: F) -> Vec<&str> {
        self.gene_ids
            .iter()
            .zip(self.padj.iter().zip(&self.log2_fold_changes))
            .filter(|(_, (&p, &lfc))| !p.is_nan() && keep(p, lfc))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn summary(&self, alpha: f64) -> ResultsSummary {
        ResultsSummary {
            total_genes: self.n_genes(),
            genes_tested: self.pvalues.iter().filter(|p| !p.is_nan()).count(),
            filtered: self
                .pvalues
                .iter()
                .zip(&self.padj)
                .filter(|(p, q)| !p.is_nan() && q.is_nan())
                .count(),
            significant: self.significant_genes(alpha).len(),
            upregulated: self.upregulated_genes(alpha, 0.0).len(),
            downregulated: self.downregulated_genes(alpha, 0.0).len(),
            alpha,
        }
    }
}

/// Counts behind `summary(res)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsSummary {
    pub total_genes: usize,
    pub genes_tested: usize,
    /// Tested genes removed by independent filtering
    pub filtered: usize,
    pub significant: usize,
    pub upregulated: usize,
    pub downregulated: usize,
    pub alpha: f64,
}

impl std::fmt::Display for ResultsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Differential expression summary")?;
        writeln!(f, "===============================")?;
        writeln!(f, "Total genes: {}", self.total_genes)?;
        writeln!(f, "Genes tested: {}", self.genes_tested)?;
        writeln!(f, "Low mean count (filtered): {}", self.filtered)?;
        writeln!(f, "Adjusted p-value < {}: {}", self.alpha, self.significant)?;
        writeln!(f, "  LFC > 0 (up): {}", self.upregulated)?;
        writeln!(f, "  LFC < 0 (down): {}", self.downregulated)?;
        Ok(())
    }
}
