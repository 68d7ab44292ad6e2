//! Design matrix for a single-factor model `~ variable`

use ndarray::Array2;

use crate::data::ExpressionDataSet;
use crate::error::{DgeError, Result};

/// Coefficient layout of a design matrix
#[derive(Debug, Clone, PartialEq)]
pub struct DesignInfo {
    pub variable: String,
    /// Names of the coefficients, `Intercept` first
    pub coef_names: Vec<String>,
    pub reference_level: String,
    /// Levels in column order, reference first
    pub levels: Vec<String>,
}

impl DesignInfo {
    /// Column of the `level vs reference` coefficient
    pub fn coef_index(&self, level: &str) -> Result<usize> {
        if level == self.reference_level {
            return Err(DgeError::InvalidContrast {
                reason: format!("'{}' is the reference level and has no coefficient", level),
            });
        }
        self.levels
            .iter()
            .position(|l| l == level)
            .ok_or_else(|| DgeError::InvalidContrast {
                reason: format!(
                    "'{}' is not a level of '{}' (levels: {:?})",
                    level, self.variable, self.levels
                ),
            })
    }
}

/// Treatment-contrast design: intercept plus one indicator column per
/// non-reference level.
pub fn create_design_matrix(
    sample_levels: &[String],
    variable: &str,
    reference_level: &str,
) -> Result<(Array2<f64>, DesignInfo)> {
    let mut others: Vec<String> = sample_levels
        .iter()
        .filter(|l| l.as_str() != reference_level)
        .cloned()
        .collect();
    others.sort();
    others.dedup();

    if !sample_levels.iter().any(|l| l == reference_level) {
        return Err(DgeError::InvalidDesignMatrix {
            reason: format!("reference level '{}' has no samples", reference_level),
        });
    }

    let mut levels = vec![reference_level.to_string()];
    levels.extend(others);

    let n_samples = sample_levels.len();
    let n_coefs = levels.len();
    let mut design = Array2::zeros((n_samples, n_coefs));
    for (i, value) in sample_levels.iter().enumerate() {
        design[[i, 0]] = 1.0;
        if let Some(j) = levels.iter().skip(1).position(|l| l == value) {
            design[[i, j + 1]] = 1.0;
        }
    }

    let mut coef_names = vec!["Intercept".to_string()];
    coef_names.extend(
        levels
            .iter()
            .skip(1)
            .map(|l| format!("{}_{}_vs_{}", variable, l, reference_level)),
    );

    check_full_rank(&design)?;

    Ok((
        design,
        DesignInfo {
            variable: variable.to_string(),
            coef_names,
            reference_level: reference_level.to_string(),
            levels,
        },
    ))
}

/// Design matrix of the dataset's own `~ variable` formula
pub fn dataset_design(dds: &ExpressionDataSet) -> Result<(Array2<f64>, DesignInfo)> {
    create_design_matrix(dds.sample_levels(), dds.design_variable(), dds.reference_level())
}

/// Intercept-only design `~ 1`
pub fn intercept_design(n_samples: usize) -> Array2<f64> {
    Array2::from_elem((n_samples, 1), 1.0)
}

/// Reject designs with linearly dependent columns or no residual degrees
/// of freedom
pub fn check_full_rank(matrix: &Array2<f64>) -> Result<()> {
    let (n, p) = matrix.dim();
    if n <= p {
        return Err(DgeError::InvalidDesignMatrix {
            reason: format!(
                "{} samples for {} coefficients; replicates are required to estimate dispersion",
                n, p
            ),
        });
    }
    let rank = column_rank(matrix);
    if rank < p {
        return Err(DgeError::InvalidDesignMatrix {
            reason: format!("design matrix has rank {} but {} columns", rank, p),
        });
    }
    Ok(())
}

/// Rank by modified Gram-Schmidt on the columns
fn column_rank(matrix: &Array2<f64>) -> usize {
    let p = matrix.ncols();
    let mut basis: Vec<Vec<f64>> = Vec::with_capacity(p);
    for j in 0..p {
        let mut v: Vec<f64> = matrix.column(j).to_vec();
        for b in &basis {
            let proj: f64 = v.iter().zip(b).map(|(x, y)| x * y).sum();
            for (x, y) in v.iter_mut().zip(b) {
                *x -= proj * y;
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 1e-10 {
            basis.push(v.into_iter().map(|x| x / norm).collect());
        }
    }
    basis.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_two_level_design() {
        let samples = strings(&["DAC", "control", "DAC", "control"]);
        let (design, info) = create_design_matrix(&samples, "treatment", "control").unwrap();

        assert_eq!(design.dim(), (4, 2));
        assert_eq!(design.column(0).to_vec(), vec![1.0; 4]);
        assert_eq!(design.column(1).to_vec(), vec![1.0, 0.0, 1.0, 0.0]);
        assert_eq!(info.coef_names, vec!["Intercept", "treatment_DAC_vs_control"]);
        assert_eq!(info.coef_index("DAC").unwrap(), 1);
        assert!(info.coef_index("control").is_err());
        assert!(info.coef_index("placebo").is_err());
    }

    #[test]
    fn test_no_replicates_rejected() {
        let samples = strings(&["DAC", "control"]);
        assert!(create_design_matrix(&samples, "treatment", "control").is_err());
    }

    #[test]
    fn test_unknown_reference_rejected() {
        let samples = strings(&["a", "a", "b"]);
        assert!(create_design_matrix(&samples, "treatment", "c").is_err());
    }

    #[test]
    fn test_rank() {
        let m = Array2::from_shape_vec((3, 2), vec![1.0, 2.0, 1.0, 2.0, 1.0, 2.0]).unwrap();
        assert_eq!(column_rank(&m), 1);
        assert!(check_full_rank(&m).is_err());
    }
}
