//! Sample metadata (one row per sample)

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{DgeError, Result};

/// Per-sample experimental annotations
///
/// Columns are kept in insertion order so the table can be written back
/// out exactly as it was assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMetadata {
    sample_ids: Vec<String>,
    columns: Vec<(String, Vec<String>)>,
}

impl SampleMetadata {
    /// Create metadata for the given samples; duplicate IDs are rejected
    pub fn new(sample_ids: Vec<String>) -> Result<Self> {
        let mut seen = HashSet::new();
        for id in &sample_ids {
            if !seen.insert(id) {
                return Err(DgeError::InvalidMetadata {
                    reason: format!("duplicate sample ID '{}'", id),
                });
            }
        }
        Ok(Self {
            sample_ids,
            columns: Vec::new(),
        })
    }

    /// Add (or replace) a categorical column
    pub fn add_condition(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.sample_ids.len() {
            return Err(DgeError::DimensionMismatch {
                expected: format!("{} values", self.sample_ids.len()),
                got: format!("{} values", values.len()),
            });
        }
        match self.columns.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = values,
            None => self.columns.push((name.to_string(), values)),
        }
        Ok(())
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Values of a column, in sample order
    pub fn condition(&self, name: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn condition_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Sorted unique levels of a column
    pub fn levels(&self, name: &str) -> Option<Vec<String>> {
        self.condition(name).map(|values| {
            let mut unique = values.to_vec();
            unique.sort();
            unique.dedup();
            unique
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sample_metadata() {
        let mut meta = SampleMetadata::new(strings(&["s1", "s2", "s3", "s4"])).unwrap();
        meta.add_condition("treatment", strings(&["DAC", "control", "DAC", "control"]))
            .unwrap();

        assert_eq!(meta.levels("treatment").unwrap(), vec!["DAC", "control"]);
        assert_eq!(meta.condition_names(), vec!["treatment"]);
    }

    #[test]
    fn test_duplicate_sample_rejected() {
        assert!(SampleMetadata::new(strings(&["s1", "s1"])).is_err());
    }

    #[test]
    fn test_column_length_checked() {
        let mut meta = SampleMetadata::new(strings(&["s1", "s2"])).unwrap();
        assert!(meta.add_condition("treatment", strings(&["a"])).is_err());
    }
}
