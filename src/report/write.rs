//! Result, PCA and summary files

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;

use super::shape::AnnotatedResult;
use crate::error::Result;
use crate::io::tsv_writer;
use crate::pca::PcaResult;
use crate::testing::ResultsSummary;

/// Machine-readable record of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub contrast: String,
    pub samples: Vec<String>,
    pub size_factors: Vec<f64>,
    pub genes_input: usize,
    pub genes_prefiltered: usize,
    pub genes_tested: usize,
    /// Base-mean cutoff chosen by independent filtering
    pub filter_threshold: Option<f64>,
    pub results: ResultsSummary,
    /// Genes passing both the padj and the fold-change threshold
    pub significant: usize,
    pub significant_up: usize,
    pub significant_down: usize,
    pub pca_percent_var: Vec<f64>,
}

fn fmt_value(v: f64) -> String {
    if v.is_nan() {
        "NA".to_string()
    } else {
        format!("{}", v)
    }
}

/// `symbol gene_id baseMean log2FoldChange stat pvalue padj significant
/// neg_log10_padj`, `NA` for anything undefined
pub fn write_results_tsv<P: AsRef<Path>>(path: P, rows: &[AnnotatedResult]) -> Result<()> {
    let mut wtr = tsv_writer(path)?;
    wtr.write_record([
        "symbol",
        "gene_id",
        "baseMean",
        "log2FoldChange",
        "stat",
        "pvalue",
        "padj",
        "significant",
        "neg_log10_padj",
    ])?;
    for r in rows {
        wtr.write_record([
            r.symbol.as_deref().unwrap_or("NA").to_string(),
            r.gene_id.clone(),
            fmt_value(r.base_mean),
            fmt_value(r.log2_fold_change),
            fmt_value(r.stat),
            fmt_value(r.pvalue),
            fmt_value(r.padj),
            if r.significant { "TRUE" } else { "FALSE" }.to_string(),
            fmt_value(r.neg_log10_padj),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// One row per sample: id, group, then every component score
pub fn write_pca_tsv<P: AsRef<Path>>(path: P, pca: &PcaResult) -> Result<()> {
    let mut wtr = tsv_writer(path)?;
    let n_components = pca.n_components();

    let mut header = vec!["sample_id".to_string(), "group".to_string()];
    header.extend((1..=n_components).map(|k| format!("PC{}", k)));
    wtr.write_record(&header)?;

    for (i, sample) in pca.sample_ids.iter().enumerate() {
        let group = pca.groups.get(i).map(|g| g.as_str()).unwrap_or("NA");
        let mut record = vec![sample.clone(), group.to_string()];
        record.extend((0..n_components).map(|k| format!("{:.6}", pca.scores[[i, k]])));
        wtr.write_record(&record)?;
    }

    // Same width as the header: label, empty group, one value per component
    let mut percent = vec!["#percent_var".to_string(), String::new()];
    percent.extend(
        pca.percent_var
            .iter()
            .take(n_components)
            .map(|p| format!("{:.4}", p * 100.0)),
    );
    wtr.write_record(&percent)?;
    wtr.flush()?;
    Ok(())
}

pub fn write_summary_json<P: AsRef<Path>>(path: P, summary: &RunSummary) -> Result<()> {
    let out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(out, summary)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::tempdir;

    fn row(gene_id: &str, symbol: Option<&str>, padj: f64) -> AnnotatedResult {
        AnnotatedResult {
            gene_id: gene_id.to_string(),
            symbol: symbol.map(str::to_string),
            base_mean: 12.5,
            log2_fold_change: 1.5,
            lfc_se: 0.3,
            stat: 5.0,
            pvalue: 1e-6,
            padj,
            significant: padj < 0.05,
            neg_log10_padj: if padj.is_nan() { 0.0 } else { -padj.log10() },
        }
    }

    #[test]
    fn test_results_tsv_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.tsv");
        write_results_tsv(&path, &[row("ENSG1", Some("TP53"), 0.001), row("ENSG2", None, f64::NAN)]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("symbol\tgene_id\tbaseMean"));
        assert!(lines[1].starts_with("TP53\tENSG1\t12.5\t1.5\t"));
        assert!(lines[1].contains("\tTRUE\t"));
        let fields: Vec<&str> = lines[2].split('\t').collect();
        assert_eq!(fields[0], "NA");
        assert_eq!(fields[6], "NA");
        assert_eq!(fields[7], "FALSE");
        assert_eq!(fields[8], "0");
    }

    #[test]
    fn test_pca_tsv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pca.tsv");
        let pca = PcaResult {
            sample_ids: vec!["s1".into(), "s2".into()],
            groups: vec!["control".into(), "DAC".into()],
            scores: array![[-1.0, 0.0], [1.0, 0.0]],
            variance: vec![2.0, 0.0],
            percent_var: vec![1.0, 0.0],
            n_genes: 10,
        };
        write_pca_tsv(&path, &pca).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("sample_id\tgroup\tPC1\tPC2\n"));
        assert!(text.contains("s2\tDAC\t1.000000\t0.000000"));
        assert!(text.ends_with("#percent_var\t\t100.0000\t0.0000\n"));
    }

    #[test]
    fn test_results_tsv_tab_in_symbol_stays_one_field() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.tsv");
        write_results_tsv(&path, &[row("ENSG1", Some("BAD\tSYM"), 0.001), row("ENSG2", Some("MYC"), 0.5)])
            .unwrap();

        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(&path)
            .unwrap();
        let records: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.len() == 9));
        assert_eq!(&records[0][0], "BAD\tSYM");
        assert_eq!(&records[0][1], "ENSG1");
        assert_eq!(&records[1][0], "MYC");
    }

    #[test]
    fn test_summary_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let summary = RunSummary {
            contrast: "treatment DAC vs control".into(),
            samples: vec!["s1".into()],
            size_factors: vec![1.0],
            genes_input: 10,
            genes_prefiltered: 2,
            genes_tested: 8,
            filter_threshold: None,
            results: ResultsSummary {
                total_genes: 8,
                genes_tested: 8,
                filtered: 0,
                significant: 3,
                upregulated: 2,
                downregulated: 1,
                alpha: 0.05,
            },
            significant: 2,
            significant_up: 1,
            significant_down: 1,
            pca_percent_var: vec![0.8, 0.2],
        };
        write_summary_json(&path, &summary).unwrap();
        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["genes_prefiltered"], 2);
        assert_eq!(value["results"]["significant"], 3);
    }
}
