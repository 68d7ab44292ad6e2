//! Volcano plot: log2 fold change against -log10 adjusted p-value

use std::path::Path;

use plotters::prelude::*;

use super::{padded_range, AXIS_FONT, CAPTION_FONT, LABEL_FONT, NOT_SIGNIFICANT, PLOT_HEIGHT, PLOT_WIDTH, SIGNIFICANT};
use crate::error::{DgeError, Result};
use crate::report::{AnnotatedResult, SignificanceThresholds};

/// Significant genes are highlighted and the `top_labels` most significant
/// of them are labelled with their symbol (or id)
pub fn draw_volcano_plot(
    path: &Path,
    rows: &[AnnotatedResult],
    thresholds: &SignificanceThresholds,
    top_labels: usize,
    title: &str,
) -> Result<()> {
    let err = |e| DgeError::plot("volcano", e);

    let plotted: Vec<&AnnotatedResult> = rows.iter().filter(|r| r.log2_fold_change.is_finite()).collect();
    let x_max = plotted
        .iter()
        .map(|r| r.log2_fold_change.abs())
        .fold(thresholds.lfc, f64::max)
        * 1.1;
    let y_range = padded_range(
        plotted
            .iter()
            .map(|r| r.neg_log10_padj)
            .chain([0.0, -thresholds.padj.log10()]),
    );

    let root = SVGBackend::new(path, (PLOT_WIDTH, PLOT_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, CAPTION_FONT)
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(-x_max..x_max, y_range.clone())
        .map_err(err)?;

    chart
        .configure_mesh()
        .x_desc("log2 fold change")
        .y_desc("-log10 adjusted p-value")
        .axis_desc_style(AXIS_FONT)
        .draw()
        .map_err(err)?;

    for (significant, colour, label) in [(false, NOT_SIGNIFICANT, "not significant"), (true, SIGNIFICANT, "significant")] {
        chart
            .draw_series(
                plotted
                    .iter()
                    .filter(|r| r.significant == significant)
                    .map(|r| Circle::new((r.log2_fold_change, r.neg_log10_padj), 2, colour.filled())),
            )
            .map_err(err)?
            .label(label)
            .legend(move |(x, y)| Circle::new((x, y), 4, colour.filled()));
    }

    let guide = BLACK.mix(0.5).stroke_width(1);
    let y_padj = -thresholds.padj.log10();
    chart
        .draw_series(LineSeries::new(vec![(-x_max, y_padj), (x_max, y_padj)], guide))
        .map_err(err)?;
    for x in [-thresholds.lfc, thresholds.lfc] {
        chart
            .draw_series(LineSeries::new(vec![(x, y_range.start), (x, y_range.end)], guide))
            .map_err(err)?;
    }

    let mut top: Vec<&&AnnotatedResult> = plotted.iter().filter(|r| r.significant).collect();
    top.sort_by(|a, b| b.neg_log10_padj.total_cmp(&a.neg_log10_padj));
    chart
        .draw_series(top.into_iter().take(top_labels).map(|r| {
            Text::new(
                r.label().to_string(),
                (r.log2_fold_change, r.neg_log10_padj),
                LABEL_FONT,
            )
        }))
        .map_err(err)?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .position(SeriesLabelPosition::UpperLeft)
        .draw()
        .map_err(err)?;

    root.present().map_err(err)?;
    log::info!("Wrote volcano plot to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn row(id: &str, symbol: Option<&str>, lfc: f64, padj: f64, significant: bool) -> AnnotatedResult {
        AnnotatedResult {
            gene_id: id.to_string(),
            symbol: symbol.map(str::to_string),
            base_mean: 50.0,
            log2_fold_change: lfc,
            lfc_se: 0.2,
            stat: 3.0,
            pvalue: padj,
            padj,
            significant,
            neg_log10_padj: if padj.is_nan() { 0.0 } else { -padj.log10() },
        }
    }

    #[test]
    fn test_draw_volcano_labels_top_genes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("volcano.svg");
        let rows = vec![
            row("ENSG1", Some("TP53"), 3.0, 1e-12, true),
            row("ENSG2", None, -2.0, 1e-4, true),
            row("ENSG3", Some("GAPDH"), 0.1, 0.8, false),
            row("ENSG4", Some("NOPE"), 0.0, f64::NAN, false),
        ];
        draw_volcano_plot(&path, &rows, &SignificanceThresholds::default(), 1, "Volcano").unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("TP53"));
        assert!(!svg.contains("ENSG2"));
        assert!(!svg.contains("GAPDH"));
    }
}
