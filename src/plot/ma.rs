//! MA plot: log10 mean expression against log2 fold change

use std::path::Path;

use plotters::prelude::*;

use super::{padded_range, AXIS_FONT, CAPTION_FONT, NOT_SIGNIFICANT, PLOT_HEIGHT, PLOT_WIDTH, SIGNIFICANT};
use crate::error::{DgeError, Result};
use crate::report::AnnotatedResult;

pub fn draw_ma_plot(path: &Path, rows: &[AnnotatedResult], title: &str) -> Result<()> {
    let err = |e| DgeError::plot("MA", e);

    // genes with zero mean or undefined fold change have no position
    let points: Vec<(f64, f64, bool)> = rows
        .iter()
        .filter(|r| r.base_mean > 0.0 && r.log2_fold_change.is_finite())
        .map(|r| (r.base_mean.log10(), r.log2_fold_change, r.significant))
        .collect();

    let x_range = padded_range(points.iter().map(|p| p.0));
    let y_max = points.iter().map(|p| p.1.abs()).fold(1.0, f64::max) * 1.05;

    let root = SVGBackend::new(path, (PLOT_WIDTH, PLOT_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, CAPTION_FONT)
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.clone(), -y_max..y_max)
        .map_err(err)?;

    chart
        .configure_mesh()
        .x_desc("log10 mean of normalized counts")
        .y_desc("log2 fold change")
        .axis_desc_style(AXIS_FONT)
        .draw()
        .map_err(err)?;

    for (significant, colour, label) in [(false, NOT_SIGNIFICANT, "not significant"), (true, SIGNIFICANT, "significant")] {
        chart
            .draw_series(
                points
                    .iter()
                    .filter(|p| p.2 == significant)
                    .map(|p| Circle::new((p.0, p.1), 2, colour.filled())),
            )
            .map_err(err)?
            .label(label)
            .legend(move |(x, y)| Circle::new((x, y), 4, colour.filled()));
    }

    chart
        .draw_series(LineSeries::new(
            vec![(x_range.start, 0.0), (x_range.end, 0.0)],
            BLACK.stroke_width(1),
        ))
        .map_err(err)?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .position(SeriesLabelPosition::UpperRight)
        .draw()
        .map_err(err)?;

    root.present().map_err(err)?;
    log::info!("Wrote MA plot to {}", path.display());
    Ok(())
}
