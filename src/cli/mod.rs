//! Command-line interface for rnaseq_dge

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::annotation::AnnotationFormat;
use crate::config::AnalysisConfig;
use crate::error::Result;

#[derive(Parser)]
#[command(name = "rnaseq_dge")]
#[command(version)]
#[command(about = "Differential expression of featureCounts samples: DAC vs control")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full analysis
    #[command(
        long_about = "Run the full analysis\n\n\
            Reads the count files, pre-filters low-count genes, normalizes, runs a\n\
            blind VST and PCA, fits the negative binomial GLM, tests the treatment\n\
            with a Wald test, annotates genes and writes tables and plots.",
        after_long_help = "\
Examples:
  # Every *.counts.txt in counts/, DAC vs control
  rnaseq_dge run counts/ -o results

  # Custom treatment rules and a GTF for gene symbols
  rnaseq_dge run counts/ --treatment DAC='_DAC_' --treatment control='_NT_' \\
    --annotation genes.gtf --annotation-format gtf

  # Settings from a JSON file, output directory overridden
  rnaseq_dge run --config analysis.json -o results_v2"
    )]
    Run(RunArgs),

    /// Build the count matrix and sample table only
    Ingest(InputArgs),

    /// Variance-stabilize and run both PCAs
    Pca(PcaArgs),
}

/// Inputs and sample naming, shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct InputArgs {
    /// featureCounts files, or directories holding them
    #[arg(value_name = "PATH")]
    pub inputs: Vec<PathBuf>,

    /// JSON configuration; command-line flags take precedence
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Regex deriving the sample ID from a file name (first capture group)
    #[arg(long, value_name = "REGEX")]
    pub sample_pattern: Option<String>,

    /// Treatment rule, tried in order against the file name
    #[arg(long = "treatment", value_name = "LABEL=REGEX",
        long_help = "Treatment rule LABEL=REGEX, tried in order against each file name.\n\
            Can be given multiple times; the first matching rule assigns the label.")]
    pub treatment_rules: Vec<String>,

    /// Metadata column used as the design variable
    #[arg(short, long)]
    pub design: Option<String>,

    /// Reference (denominator) level
    #[arg(long)]
    pub reference: Option<String>,

    /// Drop genes whose total count is at or below this
    #[arg(long, value_name = "N")]
    pub min_total_count: Option<f64>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Number of threads (0 = all cores)
    #[arg(long)]
    pub threads: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PcaArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Genes with the highest variance used by the top-variance PCA
    #[arg(long, value_name = "N")]
    pub ntop: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Genes with the highest variance used by the top-variance PCA
    #[arg(long, value_name = "N")]
    pub ntop: Option<usize>,

    /// Numerator level of the contrast
    #[arg(long)]
    pub numerator: Option<String>,

    /// Adjusted p-value cutoff
    #[arg(short, long)]
    pub alpha: Option<f64>,

    /// Minimum absolute log2 fold change for a significant call
    #[arg(long, value_name = "LFC")]
    pub lfc_threshold: Option<f64>,

    /// Skip independent filtering of low-mean genes
    #[arg(long)]
    pub no_independent_filtering: bool,

    /// Gene ID to symbol table
    #[arg(long, value_name = "FILE")]
    pub annotation: Option<PathBuf>,

    /// Layout of the annotation file
    #[arg(long, value_enum)]
    pub annotation_format: Option<AnnotationFormat>,

    /// Do not write the results table
    #[arg(long)]
    pub no_results: bool,

    /// Significant genes labelled on the volcano plot
    #[arg(long, value_name = "N")]
    pub top_labels: Option<usize>,
}

impl InputArgs {
    /// The JSON config (or defaults) with these flags applied on top
    pub fn to_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_json_file(path)?,
            None => AnalysisConfig::default(),
        };
        if !self.inputs.is_empty() {
            config.inputs = self.inputs.clone();
        }
        if let Some(pattern) = &self.sample_pattern {
            config.sample_pattern = pattern.clone();
        }
        if !self.treatment_rules.is_empty() {
            config.treatment_rules = self.treatment_rules.clone();
        }
        if let Some(design) = &self.design {
            config.design_variable = design.clone();
        }
        if let Some(reference) = &self.reference {
            config.reference_level = reference.clone();
        }
        if let Some(min_total) = self.min_total_count {
            config.min_total_count = min_total;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        Ok(config)
    }
}

impl PcaArgs {
    pub fn to_config(&self) -> Result<AnalysisConfig> {
        let mut config = self.input.to_config()?;
        if let Some(ntop) = self.ntop {
            config.pca_ntop = ntop;
        }
        Ok(config)
    }
}

impl RunArgs {
    pub fn to_config(&self) -> Result<AnalysisConfig> {
        let mut config = self.input.to_config()?;
        if let Some(ntop) = self.ntop {
            config.pca_ntop = ntop;
        }
        if let Some(numerator) = &self.numerator {
            config.numerator = numerator.clone();
        }
        if let Some(alpha) = self.alpha {
            config.alpha = alpha;
        }
        if let Some(lfc) = self.lfc_threshold {
            config.lfc_threshold = lfc;
        }
        if self.no_independent_filtering {
            config.independent_filtering = false;
        }
        if let Some(annotation) = &self.annotation {
            config.annotation = Some(annotation.clone());
        }
        if let Some(format) = self.annotation_format {
            config.annotation_format = format;
        }
        if self.no_results {
            config.write_results = false;
        }
        if let Some(top) = self.top_labels {
            config.top_labels = top;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_flags_override_defaults() {
        let cli = Cli::parse_from([
            "rnaseq_dge", "run", "counts/", "-o", "out", "--alpha", "0.1", "--treatment", "DAC=_D_",
            "--treatment", "control=_C_", "--no-independent-filtering", "--annotation-format", "gtf",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = args.to_config().unwrap();
        assert_eq!(config.inputs, vec![PathBuf::from("counts/")]);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.alpha, 0.1);
        assert_eq!(config.treatment_rules, vec!["DAC=_D_", "control=_C_"]);
        assert!(!config.independent_filtering);
        assert_eq!(config.annotation_format, AnnotationFormat::Gtf);
        assert_eq!(config.numerator, "DAC");
    }

    #[test]
    fn test_flags_take_precedence_over_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"inputs": ["a/"], "pca_ntop": 100, "reference_level": "mock"}}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::parse_from(["rnaseq_dge", "pca", "--config", path.as_str(), "--ntop", "50", "-v"]);
        assert!(cli.verbose);
        let Commands::Pca(args) = cli.command else {
            panic!("expected pca");
        };
        let config = args.to_config().unwrap();
        assert_eq!(config.inputs, vec![PathBuf::from("a/")]);
        assert_eq!(config.pca_ntop, 50);
        assert_eq!(config.reference_level, "mock");
    }
}
