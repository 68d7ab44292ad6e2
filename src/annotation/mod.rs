//! Gene identifier to symbol lookup
//!
//! Gene ids are compared without their Ensembl version suffix, so
//! `ENSG00000141510.17` and `ENSG00000141510` name the same gene.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DgeError, Result};

/// Anything that can name a gene
pub trait GeneAnnotator {
    /// Symbol for `gene_id`, `None` when the gene is unknown
    fn symbol(&self, gene_id: &str) -> Option<&str>;
}

/// On-disk layout of an annotation file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationFormat {
    /// `gene_id<TAB>symbol`, optional header
    Tsv,
    /// GTF with `gene_id` and `gene_name` attributes on `gene` features
    Gtf,
}

/// In-memory id -> symbol table
#[derive(Debug, Clone, Default)]
pub struct AnnotationTable {
    symbols: HashMap<String, String>,
}

/// Drop a trailing `.N` version from Ensembl-style ids
pub fn strip_version(gene_id: &str) -> &str {
    match gene_id.rsplit_once('.') {
        Some((base, version)) if !base.is_empty() && !version.is_empty() && version.bytes().all(|b| b.is_ascii_digit()) => base,
        _ => gene_id,
    }
}

impl AnnotationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping; an id already present keeps its first symbol
    pub fn insert(&mut self, gene_id: &str, symbol: &str) {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return;
        }
        self.symbols
            .entry(strip_version(gene_id.trim()).to_string())
            .or_insert_with(|| symbol.to_string());
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn load<P: AsRef<Path>>(path: P, format: AnnotationFormat) -> Result<Self> {
        match format {
            AnnotationFormat::Tsv => Self::from_tsv(path),
            AnnotationFormat::Gtf => Self::from_gtf(path),
        }
    }

    /// Two tab-separated columns, `gene_id` and symbol. A first line whose
    /// first field is `gene_id` or `Geneid` is taken as a header.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let mut table = Self::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if line_no == 0 && matches!(fields[0].trim(), "gene_id" | "Geneid" | "ensembl_gene_id") {
                continue;
            }
            if fields.len() < 2 {
                return Err(DgeError::Annotation {
                    reason: format!("{}:{}: expected 2 tab-separated columns", path.display(), line_no + 1),
                });
            }
            table.insert(fields[0], fields[1]);
        }

        log::info!("Loaded {} gene symbols from {}", table.len(), path.display());
        Ok(table)
    }

    /// `gene` features of a GTF file
    pub fn from_gtf<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let mut table = Self::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 9 {
                return Err(DgeError::Annotation {
                    reason: format!("{}:{}: GTF lines have 9 columns", path.display(), line_no + 1),
                });
            }
            if fields[2] != "gene" {
                continue;
            }
            let attrs = parse_gtf_attributes(fields[8]);
            if let (Some(id), Some(name)) = (attrs.get("gene_id"), attrs.get("gene_name")) {
                table.insert(id, name);
            }
        }

        log::info!("Loaded {} gene symbols from {}", table.len(), path.display());
        Ok(table)
    }
}

impl GeneAnnotator for AnnotationTable {
    fn symbol(&self, gene_id: &str) -> Option<&str> {
        self.symbols.get(strip_version(gene_id)).map(|s| s.as_str())
    }
}

/// Annotator that knows no genes
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAnnotation;

impl GeneAnnotator for NoAnnotation {
    fn symbol(&self, _gene_id: &str) -> Option<&str> {
        None
    }
}

/// `key "value"; key "value";`
fn parse_gtf_attributes(field: &str) -> HashMap<&str, &str> {
    field
        .split(';')
        .filter_map(|attr| {
            let (key, value) = attr.trim().split_once(' ')?;
            Some((key, value.trim().trim_matches('"')))
        })
        .collect()
}
