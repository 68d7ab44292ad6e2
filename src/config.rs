//! Run configuration, loadable from JSON and overridable from the command line

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationFormat;
use crate::error::{DgeError, Result};
use crate::io::{SampleNaming, TreatmentRule, DEFAULT_SAMPLE_PATTERN};
use crate::pca::DEFAULT_NTOP;
use crate::report::SignificanceThresholds;

/// Everything a pipeline run needs besides the numerical fit parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Count files, or directories scanned for files matching `sample_pattern`
    pub inputs: Vec<PathBuf>,
    /// Regex whose first capture group is the sample id
    pub sample_pattern: String,
    /// Ordered `LABEL=REGEX` rules assigning a treatment from the file name
    pub treatment_rules: Vec<String>,
    pub design_variable: String,
    /// Denominator of the contrast
    pub reference_level: String,
    /// Numerator of the contrast
    pub numerator: String,
    /// Genes with a total count at or below this are dropped before fitting
    pub min_total_count: f64,
    /// Adjusted p-value cutoff for significance and independent filtering
    pub alpha: f64,
    /// Minimum absolute log2 fold change for a significant call
    pub lfc_threshold: f64,
    pub independent_filtering: bool,
    /// Genes used by the top-variance PCA
    pub pca_ntop: usize,
    pub annotation: Option<PathBuf>,
    pub annotation_format: AnnotationFormat,
    pub output_dir: PathBuf,
    /// Write the annotated results table
    pub write_results: bool,
    /// Significant genes labelled on the volcano plot
    pub top_labels: usize,
    /// Worker threads, 0 for one per core
    pub threads: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            sample_pattern: DEFAULT_SAMPLE_PATTERN.to_string(),
            treatment_rules: vec![
                "DAC=(?i)dac".to_string(),
                "control=(?i)(ctrl|control|dmso|mock)".to_string(),
            ],
            design_variable: "treatment".to_string(),
            reference_level: "control".to_string(),
            numerator: "DAC".to_string(),
            min_total_count: 1.0,
            alpha: 0.05,
            lfc_threshold: 1.0,
            independent_filtering: true,
            pca_ntop: DEFAULT_NTOP,
            annotation: None,
            annotation_format: AnnotationFormat::Tsv,
            output_dir: PathBuf::from("results"),
            write_results: true,
            top_labels: 10,
            threads: 0,
        }
    }
}

impl AnalysisConfig {
    /// Read a JSON config; absent fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        log::debug!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Reject values no run could use
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(DgeError::Config { reason });
        if self.inputs.is_empty() {
            return invalid("no input count files or directories given".to_string());
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return invalid(format!("alpha must lie in (0, 1), got {}", self.alpha));
        }
        if !(self.lfc_threshold >= 0.0) {
            return invalid(format!("lfc_threshold must be non-negative, got {}", self.lfc_threshold));
        }
        if self.min_total_count < 0.0 {
            return invalid(format!("min_total_count must be non-negative, got {}", self.min_total_count));
        }
        if self.pca_ntop == 0 {
            return invalid("pca_ntop must be at least 1".to_string());
        }
        if self.numerator == self.reference_level {
            return invalid(format!("numerator and reference level are both '{}'", self.numerator));
        }
        Ok(())
    }

    /// Sample id and treatment derivation from file names
    pub fn sample_naming(&self) -> Result<SampleNaming> {
        let rules = self
            .treatment_rules
            .iter()
            .map(|rule| TreatmentRule::parse(rule))
            .collect::<Result<Vec<_>>>()?;
        SampleNaming::new(&self.sample_pattern, rules)
    }

    pub fn thresholds(&self) -> SignificanceThresholds {
        SignificanceThresholds {
            padj: self.alpha,
            lfc: self.lfc_threshold,
        }
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_follow_walkthrough() {
        let config = AnalysisConfig::default();
        assert_eq!(config.design_variable, "treatment");
        assert_eq!(config.reference_level, "control");
        assert_eq!(config.numerator, "DAC");
        assert_eq!(config.min_total_count, 1.0);
        assert_eq!(config.pca_ntop, 500);
        assert_eq!(config.thresholds(), SignificanceThresholds::default());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"inputs": ["counts/"], "alpha": 0.1, "annotation_format": "gtf"}}"#
        )
        .unwrap();
        let config = AnalysisConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.inputs, vec![PathBuf::from("counts/")]);
        assert_eq!(config.alpha, 0.1);
        assert_eq!(config.annotation_format, AnnotationFormat::Gtf);
        assert_eq!(config.lfc_threshold, 1.0);
        assert!(config.independent_filtering);
    }

    #[test]
    fn test_validate() {
        let mut config = AnalysisConfig::default();
        assert!(config.validate().is_err());
        config.inputs.push(PathBuf::from("counts"));
        assert!(config.validate().is_ok());

        config.alpha = 1.5;
        assert!(matches!(config.validate(), Err(DgeError::Config { .. })));
        config.alpha = 0.05;
        config.numerator = "control".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sample_naming_from_rules() {
        let naming = AnalysisConfig::default().sample_naming().unwrap();
        assert_eq!(naming.treatment("DAC_rep1.counts.txt").unwrap(), "DAC");
        assert_eq!(naming.treatment("ctrl_rep1.counts.txt").unwrap(), "control");
        assert!(naming.treatment("other_rep1.counts.txt").is_err());
        assert_eq!(naming.sample_id("DAC_rep1.counts.txt").unwrap(), "DAC_rep1");

        let bad = AnalysisConfig {
            treatment_rules: vec!["no-equals-sign".to_string()],
            ..AnalysisConfig::default()
        };
        assert!(bad.sample_naming().is_err());
    }
}
