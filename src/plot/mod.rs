//! SVG charts: PCA scatter, MA plot and volcano plot

mod ma;
mod pca;
mod volcano;

pub use ma::draw_ma_plot;
pub use pca::draw_pca_plot;
pub use volcano::draw_volcano_plot;

use std::ops::Range;

use plotters::style::full_palette::GREY_500;
use plotters::style::RGBColor;

pub(crate) const PLOT_WIDTH: u32 = 900;
pub(crate) const PLOT_HEIGHT: u32 = 700;

pub(crate) const CAPTION_FONT: (&str, u32) = ("sans-serif", 24);
pub(crate) const AXIS_FONT: (&str, u32) = ("sans-serif", 18);
pub(crate) const LABEL_FONT: (&str, u32) = ("sans-serif", 12);

pub(crate) const SIGNIFICANT: RGBColor = RGBColor(200, 30, 45);
pub(crate) const NOT_SIGNIFICANT: RGBColor = GREY_500;

/// Fixed colours for sample groups, cycled when there are more groups
pub(crate) fn group_colour(index: usize) -> RGBColor {
    const PALETTE: [RGBColor; 6] = [
        RGBColor(31, 119, 180),
        RGBColor(214, 39, 40),
        RGBColor(44, 160, 44),
        RGBColor(255, 127, 14),
        RGBColor(148, 103, 189),
        RGBColor(140, 86, 75),
    ];
    PALETTE[index % PALETTE.len()]
}

/// Finite min..max of `values` widened by 5% on both sides, never empty
pub(crate) fn padded_range<I: IntoIterator<Item = f64>>(values: I) -> Range<f64> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() {
        return -1.0..1.0;
    }
    let span = (hi - lo).max(1e-6);
    (lo - 0.05 * span)..(hi + 0.05 * span)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_range() {
        let r = padded_range(vec![0.0, 10.0, f64::NAN]);
        assert!((r.start + 0.5).abs() < 1e-12 && (r.end - 10.5).abs() < 1e-12);
        assert_eq!(padded_range(Vec::new()), -1.0..1.0);
        let single = padded_range(vec![3.0]);
        assert!(single.start < 3.0 && single.end > 3.0);
    }

    #[test]
    fn test_group_colours_cycle() {
        assert_eq!(group_colour(0), group_colour(6));
        assert_ne!(group_colour(0), group_colour(1));
    }
}
