//! Wald test for differential expression

use std::f64::consts::LN_2;

use super::fdr::benjamini_hochberg;
use super::pvalue::calculate_pvalue;
use super::results::{Contrast, DeResults};
use crate::data::ExpressionDataSet;
use crate::error::{DgeError, Result};
use crate::glm::DesignInfo;

/// Coefficient column and sign for `numerator vs denominator`. One side
/// must be the reference level; the other order flips the sign.
pub fn contrast_coefficient(info: &DesignInfo, contrast: &Contrast) -> Result<(usize, f64)> {
    if contrast.variable != info.variable {
        return Err(DgeError::InvalidContrast {
            reason: format!(
                "contrast variable '{}' is not the design variable '{}'",
                contrast.variable, info.variable
            ),
        });
    }
    if contrast.denominator == info.reference_level {
        Ok((info.coef_index(&contrast.numerator)?, 1.0))
    } else if contrast.numerator == info.reference_level {
        Ok((info.coef_index(&contrast.denominator)?, -1.0))
    } else {
        Err(DgeError::InvalidContrast {
            reason: format!(
                "contrast {} must involve the reference level '{}'",
                contrast, info.reference_level
            ),
        })
    }
}

/// Wald test of one contrast with BH adjustment across all tested genes
pub fn wald_test(dds: &ExpressionDataSet, info: &DesignInfo, contrast: Contrast) -> Result<DeResults> {
    let coefficients = dds.coefficients().ok_or_else(|| DgeError::InvalidContrast {
        reason: "GLM must be fitted before testing".to_string(),
    })?;
    let standard_errors = dds.standard_errors().ok_or_else(|| DgeError::InvalidContrast {
        reason: "Standard errors not available".to_string(),
    })?;
    let base_means = dds.base_means().ok_or_else(|| DgeError::InvalidInput {
        reason: "Size factors must be estimated before testing".to_string(),
    })?;

    let (coef, sign) = contrast_coefficient(info, &contrast)?;
    let n_genes = dds.n_genes();

    let mut log2_fold_changes = Vec::with_capacity(n_genes);
    let mut lfc_se = Vec::with_capacity(n_genes);
    let mut stat = Vec::with_capacity(n_genes);
    for i in 0..n_genes {
        // all-zero genes are not tested
        if base_means[i] == 0.0 {
            log2_fold_changes.push(0.0);
            lfc_se.push(0.0);
            stat.push(f64::NAN);
            continue;
        }
        let beta = sign * coefficients[[i, coef]];
        let se = standard_errors[[i, coef]];
        log2_fold_changes.push(beta / LN_2);
        lfc_se.push(se / LN_2);
        stat.push(if se > 0.0 && se.is_finite() { beta / se } else { f64::NAN });
    }

    let pvalues: Vec<f64> = stat.iter().map(|&z| calculate_pvalue(z)).collect();
    let padj = benjamini_hochberg(&pvalues);

    log::info!(
        "Wald test {}: {} genes tested",
        contrast,
        pvalues.iter().filter(|p| !p.is_nan()).count()
    );

    Ok(DeResults {
        gene_ids: dds.counts().gene_ids().to_vec(),
        base_means,
        log2_fold_changes,
        lfc_se,
        stat,
        pvalues,
        padj,
        dispersions: dds
            .dispersions()
            .map(|d| d.to_vec())
            .unwrap_or_else(|| vec![f64::NAN; n_genes]),
        contrast,
        filter_threshold: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CountMatrix, SampleMetadata};
    use crate::glm::create_design_matrix;
    use ndarray::{array, Array1};

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn info() -> DesignInfo {
        let samples = strings(&["control", "control", "DAC", "DAC"]);
        create_design_matrix(&samples, "treatment", "control").unwrap().1
    }

    #[test]
    fn test_contrast_coefficient_direction() {
        let info = info();
        assert_eq!(
            contrast_coefficient(&info, &Contrast::new("treatment", "DAC", "control")).unwrap(),
            (1, 1.0)
        );
        assert_eq!(
            contrast_coefficient(&info, &Contrast::new("treatment", "control", "DAC")).unwrap(),
            (1, -1.0)
        );
        assert!(contrast_coefficient(&info, &Contrast::new("batch", "DAC", "control")).is_err());
        assert!(contrast_coefficient(&info, &Contrast::new("treatment", "DAC", "other")).is_err());
    }

    #[test]
    fn test_wald_from_stored_fit() {
        let counts = CountMatrix::new(
            array![[10.0, 12.0, 40.0, 44.0], [0.0, 0.0, 0.0, 0.0]],
            strings(&["g1", "g2"]),
            strings(&["s1", "s2", "s3", "s4"]),
        )
        .unwrap();
        let mut meta = SampleMetadata::new(strings(&["s1", "s2", "s3", "s4"])).unwrap();
        meta.add_condition("treatment", strings(&["control", "control", "DAC", "DAC"]))
            .unwrap();
        let mut dds = ExpressionDataSet::new(counts, meta, "treatment")
            .unwrap()
            .with_reference_level("control")
            .unwrap();
        dds.set_size_factors(Array1::from_elem(4, 1.0)).unwrap();
        let (design, info) = crate::glm::dataset_design(&dds).unwrap();
        dds.set_glm_fit(
            design,
            info.coef_names.clone(),
            array![[2.4, 2.0 * LN_2], [0.0, 0.0]],
            array![[0.1, LN_2 / 2.0], [1.0, 1.0]],
            vec![true, true],
        )
        .unwrap();

        let res = wald_test(&dds, &info, Contrast::new("treatment", "DAC", "control")).unwrap();
        assert!((res.log2_fold_changes[0] - 2.0).abs() < 1e-12);
        assert!((res.lfc_se[0] - 0.5).abs() < 1e-12);
        assert!((res.stat[0] - 4.0).abs() < 1e-12);
        assert!(res.pvalues[0] < 1e-4);
        assert_eq!(res.log2_fold_changes[1], 0.0);
        assert!(res.pvalues[1].is_nan());
        assert!(res.padj[1].is_nan());
    }
}
