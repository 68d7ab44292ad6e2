//! rnaseq_dge command-line interface

use clap::Parser;
use log::{info, LevelFilter};

use rnaseq_dge::cli::{Cli, Commands};
use rnaseq_dge::prelude::*;

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Commands::Run(args) => args.to_config().and_then(|config| run_analysis(&config)),
        Commands::Ingest(args) => args.to_config().and_then(|config| run_ingest(&config)),
        Commands::Pca(args) => args.to_config().and_then(|config| run_pca(&config)),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn configure_threads(threads: usize) {
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok();
    }
}

fn run_analysis(config: &AnalysisConfig) -> Result<()> {
    configure_threads(config.threads);
    let report = run_pipeline(config)?;

    println!("{}", report.summary.results);
    println!(
        "Significant (padj < {}, |log2FC| >= {}): {} ({} up, {} down)",
        config.alpha,
        config.lfc_threshold,
        report.summary.significant,
        report.summary.significant_up,
        report.summary.significant_down
    );
    for path in &report.outputs {
        info!("  {}", path.display());
    }
    Ok(())
}

fn run_ingest(config: &AnalysisConfig) -> Result<()> {
    config.validate()?;
    for path in write_ingested_tables(config)? {
        info!("  {}", path.display());
    }
    Ok(())
}

fn run_pca(config: &AnalysisConfig) -> Result<()> {
    configure_threads(config.threads);
    config.validate()?;
    std::fs::create_dir_all(&config.output_dir)?;

    let prepared = prepare_dataset(config)?;
    let mut outputs = Vec::new();
    let stage = pca_stage(&prepared.dds, config, &mut outputs)?;

    let percent: Vec<String> = stage
        .top
        .percent_var
        .iter()
        .take(2)
        .map(|p| format!("{:.1}%", p * 100.0))
        .collect();
    println!(
        "PCA on {} of {} genes: PC1/PC2 explain {}",
        stage.top.n_genes,
        prepared.dds.n_genes(),
        percent.join(" / ")
    );
    for path in &outputs {
        info!("  {}", path.display());
    }
    Ok(())
}
