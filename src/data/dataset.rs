//! ExpressionDataSet - counts, sample table and design, plus fitted state

use ndarray::{Array1, Array2};

use super::{CountMatrix, SampleMetadata};
use crate::error::{DgeError, Result};

/// Counts and sample metadata bound to a single-factor design `~ variable`,
/// together with everything estimated from them along the way.
#[derive(Debug, Clone)]
pub struct ExpressionDataSet {
    counts: CountMatrix,
    sample_metadata: SampleMetadata,
    design_variable: String,
    reference_level: String,

    size_factors: Option<Array1<f64>>,
    normalized_counts: Option<Array2<f64>>,

    gene_dispersions: Option<Array1<f64>>,
    trended_dispersions: Option<Array1<f64>>,
    /// Parametric trend coefficients (asymptotic dispersion, extra Poisson)
    dispersion_function: Option<(f64, f64)>,
    /// Dispersions used for the final GLM fit
    dispersions: Option<Array1<f64>>,

    design_matrix: Option<Array2<f64>>,
    coef_names: Option<Vec<String>>,
    coefficients: Option<Array2<f64>>,
    standard_errors: Option<Array2<f64>>,
    converged: Option<Vec<bool>>,
}

impl ExpressionDataSet {
    /// Bind counts to metadata.
    ///
    /// Matrix column `j` must be metadata row `j`: the sample IDs have to be
    /// identical and in identical order, otherwise every downstream
    /// statistic would be attributed to the wrong sample.
    pub fn new(
        counts: CountMatrix,
        sample_metadata: SampleMetadata,
        design_variable: &str,
    ) -> Result<Self> {
        let count_ids = counts.sample_ids();
        let meta_ids = sample_metadata.sample_ids();
        if count_ids.len() != meta_ids.len() {
            return Err(DgeError::SampleAlignment {
                reason: format!(
                    "count matrix has {} samples, metadata has {}",
                    count_ids.len(),
                    meta_ids.len()
                ),
            });
        }
        if let Some((j, (c, m))) = count_ids
            .iter()
            .zip(meta_ids.iter())
            .enumerate()
            .find(|(_, (c, m))| c != m)
        {
            return Err(DgeError::SampleAlignment {
                reason: format!("column {} is '{}' in counts but '{}' in metadata", j, c, m),
            });
        }

        let levels = sample_metadata.levels(design_variable).ok_or_else(|| {
            DgeError::InvalidDesignMatrix {
                reason: format!("Design variable '{}' not found in metadata", design_variable),
            }
        })?;
        if levels.len() < 2 {
            log::warn!(
                "Design variable '{}' has only one level ('{}'); differential testing needs two",
                design_variable,
                levels.first().map(|s| s.as_str()).unwrap_or(""),
            );
        }
        let reference_level = levels.first().cloned().unwrap_or_default();

        Ok(Self {
            counts,
            sample_metadata,
            design_variable: design_variable.to_string(),
            reference_level,
            size_factors: None,
            normalized_counts: None,
            gene_dispersions: None,
            trended_dispersions: None,
            dispersion_function: None,
            dispersions: None,
            design_matrix: None,
            coef_names: None,
            coefficients: None,
            standard_errors: None,
            converged: None,
        })
    }

    /// Choose the reference (denominator) level explicitly
    pub fn with_reference_level(mut self, level: &str) -> Result<Self> {
        if !self.levels().iter().any(|l| l == level) {
            return Err(DgeError::InvalidContrast {
                reason: format!(
                    "reference level '{}' is not a level of '{}' (levels: {:?})",
                    level,
                    self.design_variable,
                    self.levels()
                ),
            });
        }
        self.reference_level = level.to_string();
        Ok(self)
    }

    pub fn counts(&self) -> &CountMatrix {
        &self.counts
    }

    pub fn sample_metadata(&self) -> &SampleMetadata {
        &self.sample_metadata
    }

    pub fn design_variable(&self) -> &str {
        &self.design_variable
    }

    pub fn reference_level(&self) -> &str {
        &self.reference_level
    }

    /// Sorted levels of the design variable
    pub fn levels(&self) -> Vec<String> {
        self.sample_metadata
            .levels(&self.design_variable)
            .unwrap_or_default()
    }

    /// Design variable value of every sample, in column order
    pub fn sample_levels(&self) -> &[String] {
        self.sample_metadata
            .condition(&self.design_variable)
            .unwrap_or(&[])
    }

    pub fn n_genes(&self) -> usize {
        self.counts.n_genes()
    }

    pub fn n_samples(&self) -> usize {
        self.counts.n_samples()
    }

    /// Keep only the given genes. Everything estimated so far is dropped
    /// except size factors, which are per-sample.
    pub fn retain_genes(&mut self, gene_indices: &[usize]) -> Result<()> {
        self.counts = self.counts.subset_genes(gene_indices)?;
        self.gene_dispersions = None;
        self.trended_dispersions = None;
        self.dispersion_function = None;
        self.dispersions = None;
        self.design_matrix = None;
        self.coef_names = None;
        self.coefficients = None;
        self.standard_errors = None;
        self.converged = None;
        self.compute_normalized_counts();
        Ok(())
    }

    pub fn size_factors(&self) -> Option<&Array1<f64>> {
        self.size_factors.as_ref()
    }

    pub fn has_size_factors(&self) -> bool {
        self.size_factors.is_some()
    }

    pub fn set_size_factors(&mut self, size_factors: Array1<f64>) -> Result<()> {
        if size_factors.len() != self.n_samples() {
            return Err(DgeError::DimensionMismatch {
                expected: format!("{} size factors", self.n_samples()),
                got: format!("{}", size_factors.len()),
            });
        }
        if size_factors.iter().any(|&x| !x.is_finite() || x <= 0.0) {
            return Err(DgeError::InvalidInput {
                reason: "size factors must be positive finite values".to_string(),
            });
        }
        self.size_factors = Some(size_factors);
        self.compute_normalized_counts();
        Ok(())
    }

    pub fn normalized_counts(&self) -> Option<&Array2<f64>> {
        self.normalized_counts.as_ref()
    }

    fn compute_normalized_counts(&mut self) {
        if let Some(sf) = &self.size_factors {
            let mut normalized = self.counts.counts().to_owned();
            for (j, &s) in sf.iter().enumerate() {
                normalized.column_mut(j).mapv_inplace(|x| x / s);
            }
            self.normalized_counts = Some(normalized);
        }
    }

    /// Mean of normalized counts per gene
    pub fn base_means(&self) -> Option<Vec<f64>> {
        let n = self.n_samples() as f64;
        self.normalized_counts
            .as_ref()
            .map(|nc| nc.rows().into_iter().map(|row| row.sum() / n).collect())
    }

    pub fn gene_dispersions(&self) -> Option<&Array1<f64>> {
        self.gene_dispersions.as_ref()
    }

    pub fn set_gene_dispersions(&mut self, dispersions: Array1<f64>) -> Result<()> {
        self.check_gene_len(dispersions.len(), "gene-wise dispersions")?;
        self.gene_dispersions = Some(dispersions);
        Ok(())
    }

    pub fn trended_dispersions(&self) -> Option<&Array1<f64>> {
        self.trended_dispersions.as_ref()
    }

    pub fn set_trended_dispersions(&mut self, dispersions: Array1<f64>) -> Result<()> {
        self.check_gene_len(dispersions.len(), "trended dispersions")?;
        self.trended_dispersions = Some(dispersions);
        Ok(())
    }

    pub fn dispersion_function(&self) -> Option<(f64, f64)> {
        self.dispersion_function
    }

    pub fn set_dispersion_function(&mut self, asympt_disp: f64, extra_pois: f64) {
        self.dispersion_function = Some((asympt_disp, extra_pois));
    }

    pub fn dispersions(&self) -> Option<&Array1<f64>> {
        self.dispersions.as_ref()
    }

    pub fn has_dispersions(&self) -> bool {
        self.dispersions.is_some()
    }

    pub fn set_dispersions(&mut self, dispersions: Array1<f64>) -> Result<()> {
        self.check_gene_len(dispersions.len(), "dispersions")?;
        self.dispersions = Some(dispersions);
        Ok(())
    }

    pub fn design_matrix(&self) -> Option<&Array2<f64>> {
        self.design_matrix.as_ref()
    }

    pub fn coef_names(&self) -> Option<&[String]> {
        self.coef_names.as_deref()
    }

    pub fn coefficients(&self) -> Option<&Array2<f64>> {
        self.coefficients.as_ref()
    }

    pub fn standard_errors(&self) -> Option<&Array2<f64>> {
        self.standard_errors.as_ref()
    }

    pub fn converged(&self) -> Option<&[bool]> {
        self.converged.as_deref()
    }

    /// Store the outcome of the per-gene GLM fit
    pub fn set_glm_fit(
        &mut self,
        design: Array2<f64>,
        coef_names: Vec<String>,
        coefficients: Array2<f64>,
        standard_errors: Array2<f64>,
        converged: Vec<bool>,
    ) -> Result<()> {
        self.check_gene_len(coefficients.nrows(), "coefficient rows")?;
        self.check_gene_len(converged.len(), "convergence flags")?;
        if coefficients.dim() != standard_errors.dim() || coef_names.len() != coefficients.ncols() {
            return Err(DgeError::DimensionMismatch {
                expected: format!("{} coefficients per gene", coef_names.len()),
                got: format!("{:?} / {:?}", coefficients.dim(), standard_errors.dim()),
            });
        }
        self.design_matrix = Some(design);
        self.coef_names = Some(coef_names);
        self.coefficients = Some(coefficients);
        self.standard_errors = Some(standard_errors);
        self.converged = Some(converged);
        Ok(())
    }

    fn check_gene_len(&self, len: usize, what: &str) -> Result<()> {
        if len != self.n_genes() {
            return Err(DgeError::DimensionMismatch {
                expected: format!("{} {}", self.n_genes(), what),
                got: format!("{}", len),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn create_test_dataset() -> ExpressionDataSet {
        let counts = CountMatrix::new(
            array![[10.0, 20.0, 30.0, 40.0], [5.0, 15.0, 25.0, 35.0], [1.0, 0.0, 0.0, 0.0]],
            strings(&["g1", "g2", "g3"]),
            strings(&["s1", "s2", "s3", "s4"]),
        )
        .unwrap();
        let mut meta = SampleMetadata::new(strings(&["s1", "s2", "s3", "s4"])).unwrap();
        meta.add_condition("treatment", strings(&["control", "control", "DAC", "DAC"]))
            .unwrap();
        ExpressionDataSet::new(counts, meta, "treatment").unwrap()
    }

    #[test]
    fn test_dataset_creation() {
        let dds = create_test_dataset();
        assert_eq!(dds.n_genes(), 3);
        assert_eq!(dds.n_samples(), 4);
        // "DAC" sorts before "control"
        assert_eq!(dds.reference_level(), "DAC");
        assert_eq!(dds.sample_levels(), &["control", "control", "DAC", "DAC"]);
    }

    #[test]
    fn test_explicit_reference_level() {
        let dds = create_test_dataset().with_reference_level("control").unwrap();
        assert_eq!(dds.reference_level(), "control");
        assert!(create_test_dataset().with_reference_level("placebo").is_err());
    }

    #[test]
    fn test_misaligned_samples_rejected() {
        let counts = CountMatrix::new(
            array![[10.0, 20.0], [5.0, 15.0]],
            strings(&["g1", "g2"]),
            strings(&["s1", "s2"]),
        )
        .unwrap();
        let mut meta = SampleMetadata::new(strings(&["s2", "s1"])).unwrap();
        meta.add_condition("treatment", strings(&["a", "b"])).unwrap();
        assert!(matches!(
            ExpressionDataSet::new(counts, meta, "treatment"),
            Err(DgeError::SampleAlignment { .. })
        ));
    }

    #[test]
    fn test_missing_design_variable_rejected() {
        let counts = CountMatrix::new(array![[1.0, 2.0]], strings(&["g1"]), strings(&["s1", "s2"]))
            .unwrap();
        let meta = SampleMetadata::new(strings(&["s1", "s2"])).unwrap();
        assert!(ExpressionDataSet::new(counts, meta, "treatment").is_err());
    }

    #[test]
    fn test_size_factors_normalize_counts() {
        let mut dds = create_test_dataset();
        dds.set_size_factors(array![1.0, 2.0, 2.0, 4.0]).unwrap();
        let nc = dds.normalized_counts().unwrap();
        assert_eq!(nc[[0, 1]], 10.0);
        assert_eq!(nc[[0, 3]], 10.0);
        assert!(dds.set_size_factors(array![1.0, 0.0, 1.0, 1.0]).is_err());
    }

    #[test]
    fn test_retain_genes_keeps_size_factors() {
        let mut dds = create_test_dataset();
        dds.set_size_factors(array![1.0, 1.0, 1.0, 1.0]).unwrap();
        dds.set_dispersions(array![0.1, 0.1, 0.1]).unwrap();
        dds.retain_genes(&[0, 1]).unwrap();
        assert_eq!(dds.n_genes(), 2);
        assert!(dds.has_size_factors());
        assert!(!dds.has_dispersions());
        assert_eq!(dds.normalized_counts().unwrap().nrows(), 2);
    }
}
