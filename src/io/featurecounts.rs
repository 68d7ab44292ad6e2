//! featureCounts per-sample count files
//!
//! Each file has a fixed two-line preamble, a `#` comment holding the
//! program and command line followed by the column header
//! `Geneid Chr Start End Strand Length <count>`, then one tab-separated
//! row per gene. Only the gene ID and the seventh (count) column are used.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::data::CountRecord;
use crate::error::{DgeError, Result};

/// Number of columns in a featureCounts data row
const FEATURECOUNTS_COLUMNS: usize = 7;

/// Default pattern deriving the sample ID from a file name: everything
/// before an optional `.counts`/`.featureCounts` suffix and the extension
pub const DEFAULT_SAMPLE_PATTERN: &str = r"^(.+?)(?:[._](?:featureCounts|counts))?\.(?:txt|tsv)$";

/// Maps a file name to a treatment label when the pattern matches
#[derive(Debug, Clone)]
pub struct TreatmentRule {
    pub label: String,
    pub pattern: Regex,
}

impl TreatmentRule {
    pub fn new(label: &str, pattern: &str) -> Result<Self> {
        Ok(Self {
            label: label.to_string(),
            pattern: Regex::new(pattern)?,
        })
    }

    /// Parse `LABEL=REGEX`
    pub fn parse(spec: &str) -> Result<Self> {
        let (label, pattern) = spec.split_once('=').ok_or_else(|| DgeError::Config {
            reason: format!("treatment rule '{}' must look like LABEL=REGEX", spec),
        })?;
        if label.trim().is_empty() {
            return Err(DgeError::Config {
                reason: format!("treatment rule '{}' has an empty label", spec),
            });
        }
        Self::new(label.trim(), pattern)
    }
}

/// Derives sample ID and treatment label from a count file's name
#[derive(Debug, Clone)]
pub struct SampleNaming {
    sample_pattern: Regex,
    treatment_rules: Vec<TreatmentRule>,
}

impl SampleNaming {
    pub fn new(sample_pattern: &str, treatment_rules: Vec<TreatmentRule>) -> Result<Self> {
        if treatment_rules.is_empty() {
            return Err(DgeError::Config {
                reason: "at least one treatment rule is required".to_string(),
            });
        }
        Ok(Self {
            sample_pattern: Regex::new(sample_pattern)?,
            treatment_rules,
        })
    }

    /// Whether a file name looks like a count file
    pub fn matches(&self, file_name: &str) -> bool {
        self.sample_pattern.is_match(file_name)
    }

    /// First capture group of the sample pattern, or the whole match
    pub fn sample_id(&self, file_name: &str) -> Result<String> {
        let caps = self
            .sample_pattern
            .captures(file_name)
            .ok_or_else(|| DgeError::SampleNaming {
                file_name: file_name.to_string(),
                reason: format!("does not match sample pattern '{}'", self.sample_pattern),
            })?;
        let id = caps
            .get(1)
            .or_else(|| caps.get(0))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        if id.is_empty() {
            return Err(DgeError::SampleNaming {
                file_name: file_name.to_string(),
                reason: "sample pattern matched an empty string".to_string(),
            });
        }
        Ok(id)
    }

    /// Label of the first treatment rule whose pattern matches
    pub fn treatment(&self, file_name: &str) -> Result<String> {
        self.treatment_rules
            .iter()
            .find(|rule| rule.pattern.is_match(file_name))
            .map(|rule| rule.label.clone())
            .ok_or_else(|| DgeError::SampleNaming {
                file_name: file_name.to_string(),
                reason: "no treatment rule matches".to_string(),
            })
    }
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| DgeError::InvalidInput {
            reason: format!("'{}' has no usable file name", path.display()),
        })
}

/// Read one featureCounts file into long-format records
pub fn read_featurecounts<P: AsRef<Path>>(
    path: P,
    sample_id: &str,
    treatment: &str,
) -> Result<Vec<CountRecord>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let malformed = |line: usize, reason: String| DgeError::MalformedCountFile {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let header = reader.headers()?.clone();
    if header.len() != FEATURECOUNTS_COLUMNS || header.get(0) != Some("Geneid") {
        return Err(malformed(
            2,
            format!(
                "expected a {}-column header starting with 'Geneid', found {:?}",
                FEATURECOUNTS_COLUMNS,
                header.iter().collect::<Vec<_>>()
            ),
        ));
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let line = row.position().map(|p| p.line() as usize).unwrap_or(0);
        if row.len() != FEATURECOUNTS_COLUMNS {
            return Err(malformed(
                line,
                format!("expected {} columns, found {}", FEATURECOUNTS_COLUMNS, row.len()),
            ));
        }
        let gene_id = row[0].trim();
        if gene_id.is_empty() {
            return Err(malformed(line, "empty gene ID".to_string()));
        }
        let raw = row[FEATURECOUNTS_COLUMNS - 1].trim();
        let count: u64 = raw
            .parse()
            .map_err(|_| malformed(line, format!("invalid count '{}'", raw)))?;
        records.push(CountRecord::new(gene_id, sample_id, treatment, count));
    }

    if records.is_empty() {
        return Err(DgeError::EmptyData {
            reason: format!("no gene rows in {}", path.display()),
        });
    }

    Ok(records)
}

/// Expand directories into their count files (sorted by name); plain
/// file paths are kept as given
pub fn discover_inputs(inputs: &[PathBuf], naming: &SampleNaming) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(input)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .map_or(false, |n| naming.matches(n))
                })
                .collect();
            found.sort();
            log::debug!("{}: {} count files", input.display(), found.len());
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    if files.is_empty() {
        return Err(DgeError::EmptyData {
            reason: "no count files found".to_string(),
        });
    }
    Ok(files)
}

/// Read every count file, tagging rows with sample ID and treatment
pub fn ingest_files(paths: &[PathBuf], naming: &SampleNaming) -> Result<Vec<CountRecord>> {
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for path in paths {
        let file_name = file_name_of(path)?;
        let sample_id = naming.sample_id(&file_name)?;
        let treatment = naming.treatment(&file_name)?;
        if !seen.insert(sample_id.clone()) {
            return Err(DgeError::SampleNaming {
                file_name,
                reason: format!("sample ID '{}' was already produced by another file", sample_id),
            });
        }
        let rows = read_featurecounts(path, &sample_id, &treatment)?;
        log::info!("  {} -> sample {} ({}), {} genes", file_name, sample_id, treatment, rows.len());
        records.extend(rows);
    }

    Ok(records)
}
