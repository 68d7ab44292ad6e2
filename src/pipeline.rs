//! The walkthrough as a linear batch of stages, driven by an [`AnalysisConfig`]

use std::fs;
use std::path::PathBuf;

use crate::annotation::{AnnotationTable, GeneAnnotator, NoAnnotation};
use crate::config::AnalysisConfig;
use crate::data::{pivot_counts, CountMatrix, ExpressionDataSet, SampleMetadata};
use crate::dispersion::{estimate_dispersions, DispersionParams};
use crate::error::{DgeError, Result};
use crate::filter::{independent_filtering, prefilter_low_counts};
use crate::glm::{fit_glm, GlmFitParams};
use crate::io::{discover_inputs, ingest_files, write_matrix_tsv, write_metadata_tsv};
use crate::normalization::estimate_size_factors;
use crate::pca::{plot_pca_data, prcomp, PcaResult};
use crate::plot::{draw_ma_plot, draw_pca_plot, draw_volcano_plot};
use crate::report::{shape_results, write_pca_tsv, write_results_tsv, write_summary_json, RunSummary};
use crate::testing::{wald_test, Contrast, DeResults};
use crate::transform::{vst, VstResult};

/// What a run produced
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub summary: RunSummary,
    /// Every file written, in the order it was written
    pub outputs: Vec<PathBuf>,
}

/// Model object after pre-filtering and normalization
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub dds: ExpressionDataSet,
    pub genes_input: usize,
    pub genes_prefiltered: usize,
}

/// Variance-stabilized data and both PCA variants
#[derive(Debug, Clone)]
pub struct PcaStage {
    pub vst: VstResult,
    /// Top-variance genes, as the library's PCA helper does it
    pub top: PcaResult,
    /// All genes, manual `prcomp`
    pub all: PcaResult,
}

fn ensure_output_dir(config: &AnalysisConfig) -> Result<()> {
    fs::create_dir_all(&config.output_dir)?;
    Ok(())
}

/// Read the count files and pivot them into a matrix with aligned metadata
pub fn ingest_counts(config: &AnalysisConfig) -> Result<(CountMatrix, SampleMetadata)> {
    let naming = config.sample_naming()?;
    let files = discover_inputs(&config.inputs, &naming)?;
    log::info!("Reading {} count files", files.len());
    let records = ingest_files(&files, &naming)?;
    let (counts, metadata) = pivot_counts(&records)?;
    log::info!(
        "Count matrix: {} genes x {} samples",
        counts.n_genes(),
        counts.n_samples()
    );
    Ok((counts, metadata))
}

/// Ingest and write `counts.tsv` plus `metadata.tsv`
pub fn write_ingested_tables(config: &AnalysisConfig) -> Result<Vec<PathBuf>> {
    ensure_output_dir(config)?;
    let (counts, metadata) = ingest_counts(config)?;

    let counts_path = config.output_path("counts.tsv");
    write_matrix_tsv(&counts_path, counts.gene_ids(), counts.sample_ids(), counts.counts())?;
    let metadata_path = config.output_path("metadata.tsv");
    write_metadata_tsv(&metadata_path, &metadata)?;

    log::info!("Wrote {} and {}", counts_path.display(), metadata_path.display());
    Ok(vec![counts_path, metadata_path])
}

/// Build the model object, pre-filter and estimate size factors
pub fn prepare_dataset(config: &AnalysisConfig) -> Result<PreparedData> {
    let (counts, metadata) = ingest_counts(config)?;
    let genes_input = counts.n_genes();

    log::info!("Design: ~ {} (reference '{}')", config.design_variable, config.reference_level);
    let mut dds = ExpressionDataSet::new(counts, metadata, &config.design_variable)?
        .with_reference_level(&config.reference_level)?;

    let genes_prefiltered = prefilter_low_counts(&mut dds, config.min_total_count)?;
    if dds.n_genes() == 0 {
        return Err(DgeError::EmptyData {
            reason: format!("no gene has a total count above {}", config.min_total_count),
        });
    }

    estimate_size_factors(&mut dds)?;
    Ok(PreparedData {
        dds,
        genes_input,
        genes_prefiltered,
    })
}

/// Blind VST, both PCAs, their tables and charts
pub fn pca_stage(dds: &ExpressionDataSet, config: &AnalysisConfig, outputs: &mut Vec<PathBuf>) -> Result<PcaStage> {
    let vst_data = vst(dds, true, &DispersionParams::default())?;
    let vst_path = config.output_path("vst.tsv");
    write_matrix_tsv(&vst_path, &vst_data.gene_ids, &vst_data.sample_ids, vst_data.data.view())?;
    outputs.push(vst_path);

    let top = plot_pca_data(&vst_data, dds.sample_metadata(), &config.design_variable, config.pca_ntop)?;
    let mut all = prcomp(vst_data.data.view(), &vst_data.sample_ids)?;
    all.groups = top.groups.clone();

    for (pca, stem, title) in [
        (&top, "pca_top", format!("PCA, top {} genes by variance", top.n_genes)),
        (&all, "pca_all_genes", format!("PCA, all {} genes", all.n_genes)),
    ] {
        let table = config.output_path(&format!("{}.tsv", stem));
        write_pca_tsv(&table, pca)?;
        outputs.push(table);

        if pca.n_components() < 2 {
            log::warn!("{}: fewer than two components, skipping the plot", stem);
            continue;
        }
        let chart = config.output_path(&format!("{}.svg", stem));
        draw_pca_plot(&chart, pca, &title)?;
        outputs.push(chart);
    }

    Ok(PcaStage { vst: vst_data, top, all })
}

/// Dispersions, GLM fit, Wald test and optional independent filtering
pub fn test_stage(dds: &mut ExpressionDataSet, config: &AnalysisConfig) -> Result<DeResults> {
    estimate_dispersions(dds, &DispersionParams::default())?;
    let info = fit_glm(dds, &GlmFitParams::default())?;

    let contrast = Contrast::new(&config.design_variable, &config.numerator, &config.reference_level);
    log::info!("Wald test: {}", contrast);
    let mut results = wald_test(dds, &info, contrast)?;

    if config.independent_filtering {
        independent_filtering(&mut results, config.alpha);
    }
    Ok(results)
}

fn load_annotator(config: &AnalysisConfig) -> Result<Box<dyn GeneAnnotator>> {
    match &config.annotation {
        Some(path) => {
            let table = AnnotationTable::load(path, config.annotation_format)?;
            log::info!("Loaded {} gene symbols from {}", table.len(), path.display());
            Ok(Box::new(table))
        }
        None => Ok(Box::new(NoAnnotation)),
    }
}

/// Run the whole walkthrough and write every output into `output_dir`
pub fn run_pipeline(config: &AnalysisConfig) -> Result<AnalysisReport> {
    config.validate()?;
    ensure_output_dir(config)?;
    let mut outputs = Vec::new();

    let PreparedData {
        mut dds,
        genes_input,
        genes_prefiltered,
    } = prepare_dataset(config)?;

    if let Some(normalized) = dds.normalized_counts() {
        let path = config.output_path("normalized_counts.tsv");
        write_matrix_tsv(&path, dds.counts().gene_ids(), dds.counts().sample_ids(), normalized.view())?;
        outputs.push(path);
    }

    let pca = pca_stage(&dds, config, &mut outputs)?;
    let results = test_stage(&mut dds, config)?;

    let annotator = load_annotator(config)?;
    let thresholds = config.thresholds();
    let rows = shape_results(&results, annotator.as_ref(), &thresholds);

    let contrast = results.contrast.to_string();
    let ma_path = config.output_path("ma_plot.svg");
    draw_ma_plot(&ma_path, &rows, &format!("MA plot: {}", contrast))?;
    outputs.push(ma_path);
    let volcano_path = config.output_path("volcano_plot.svg");
    draw_volcano_plot(
        &volcano_path,
        &rows,
        &thresholds,
        config.top_labels,
        &format!("Volcano plot: {}", contrast),
    )?;
    outputs.push(volcano_path);

    if config.write_results {
        let path = config.output_path("results.tsv");
        write_results_tsv(&path, &rows)?;
        outputs.push(path);
    }

    let significant_up = rows.iter().filter(|r| r.significant && r.log2_fold_change > 0.0).count();
    let significant_down = rows.iter().filter(|r| r.significant && r.log2_fold_change < 0.0).count();
    let summary = RunSummary {
        contrast,
        samples: dds.counts().sample_ids().to_vec(),
        size_factors: dds.size_factors().map(|sf| sf.to_vec()).unwrap_or_default(),
        genes_input,
        genes_prefiltered,
        genes_tested: dds.n_genes(),
        filter_threshold: results.filter_threshold,
        results: results.summary(config.alpha),
        significant: significant_up + significant_down,
        significant_up,
        significant_down,
        pca_percent_var: pca.top.percent_var.clone(),
    };
    let summary_path = config.output_path("summary.json");
    write_summary_json(&summary_path, &summary)?;
    outputs.push(summary_path);

    log::info!(
        "{} of {} tested genes significant ({} up, {} down)",
        summary.significant,
        summary.genes_tested,
        significant_up,
        significant_down
    );
    Ok(AnalysisReport { summary, outputs })
}
