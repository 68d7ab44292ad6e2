//! PCA scatter coloured by sample group

use std::path::Path;

use plotters::prelude::*;

use super::{group_colour, padded_range, AXIS_FONT, CAPTION_FONT, LABEL_FONT, PLOT_HEIGHT, PLOT_WIDTH};
use crate::error::{DgeError, Result};
use crate::pca::PcaResult;

/// PC1 vs PC2, axis titles carrying the percent variance explained
pub fn draw_pca_plot(path: &Path, pca: &PcaResult, title: &str) -> Result<()> {
    let err = |e| DgeError::plot("PCA", e);
    if pca.n_components() < 2 {
        return Err(DgeError::Plot {
            chart: "PCA".to_string(),
            reason: "need at least two principal components".to_string(),
        });
    }
    let pc1 = pca.component(0);
    let pc2 = pca.component(1);

    let mut groups: Vec<&str> = Vec::new();
    for g in &pca.groups {
        if !groups.contains(&g.as_str()) {
            groups.push(g.as_str());
        }
    }

    let root = SVGBackend::new(path, (PLOT_WIDTH, PLOT_HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, CAPTION_FONT)
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(padded_range(pc1.iter().copied()), padded_range(pc2.iter().copied()))
        .map_err(err)?;

    chart
        .configure_mesh()
        .x_desc(format!("PC1: {:.0}% variance", pca.percent_var[0] * 100.0))
        .y_desc(format!("PC2: {:.0}% variance", pca.percent_var[1] * 100.0))
        .axis_desc_style(AXIS_FONT)
        .draw()
        .map_err(err)?;

    for (gi, group) in groups.iter().enumerate() {
        let colour = group_colour(gi);
        let points: Vec<(f64, f64)> = (0..pca.sample_ids.len())
            .filter(|&i| pca.groups[i] == *group)
            .map(|i| (pc1[i], pc2[i]))
            .collect();
        chart
            .draw_series(points.into_iter().map(|p| Circle::new(p, 6, colour.filled())))
            .map_err(err)?
            .label(*group)
            .legend(move |(x, y)| Circle::new((x, y), 6, colour.filled()));
    }

    chart
        .draw_series(
            pca.sample_ids
                .iter()
                .enumerate()
                .map(|(i, id)| Text::new(id.clone(), (pc1[i], pc2[i]), LABEL_FONT)),
        )
        .map_err(err)?;

    if !groups.is_empty() {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .position(SeriesLabelPosition::UpperRight)
            .draw()
            .map_err(err)?;
    }

    root.present().map_err(err)?;
    log::info!("Wrote PCA plot to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::tempdir;

    #[test]
    fn test_draw_pca_plot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pca.svg");
        let pca = PcaResult {
            sample_ids: vec!["s1".into(), "s2".into(), "s3".into(), "s4".into()],
            groups: vec!["control".into(), "control".into(), "DAC".into(), "DAC".into()],
            scores: array![[-2.0, 0.5], [-1.8, -0.4], [2.1, 0.2], [1.7, -0.3]],
            variance: vec![4.0, 0.2],
            percent_var: vec![0.95, 0.05],
            n_genes: 500,
        };
        draw_pca_plot(&path, &pca, "PCA").unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("PC1: 95% variance"));
    }
}
