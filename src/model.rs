use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single table cell as handed over by the table extractor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    #[default]
    Empty,
}

impl Cell {
    /// Builds a text cell, mapping blank text to `Empty`.
    pub fn text(value: &str) -> Self {
        if value.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(value) => value.trim().is_empty(),
            Cell::Number(value) => value.is_nan(),
        }
    }

    pub fn as_text(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        match self {
            Cell::Text(value) => Some(value.clone()),
            Cell::Number(value) => Some(value.to_string()),
            Cell::Empty => None,
        }
    }

    /// Converts numeric-looking text into a number; other values are kept as-is.
    pub fn into_numeric(self) -> Self {
        match self {
            Cell::Text(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Cell::Empty;
                }
                match trimmed.parse::<f64>() {
                    Ok(number) if number.is_finite() => Cell::Number(number),
                    _ => Cell::Text(trimmed.to_string()),
                }
            }
            Cell::Number(value) if value.is_nan() => Cell::Empty,
            other => other,
        }
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        matches!(self, Cell::Text(value) if value.contains(needle))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(value) => write!(f, "{value}"),
            Cell::Text(value) => f.write_str(value),
            Cell::Empty => f.write_str("-"),
        }
    }
}

/// One page-table as produced by the table extractor, keyed by its original labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalField {
    Name,
    RollNo,
    PapersFailed,
    TotalCredits,
    Spi,
}

impl CanonicalField {
    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalField::Name => "name",
            CanonicalField::RollNo => "rollno",
            CanonicalField::PapersFailed => "papers_failed",
            CanonicalField::TotalCredits => "TC",
            CanonicalField::Spi => "SPI",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A table row keyed by canonical fields plus the open set of subject marks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalRow {
    /// Cell of the extractor's unlabeled leading column, cleared by the row merger.
    pub index: Cell,
    pub name: Cell,
    pub rollno: Cell,
    pub total_credits: Cell,
    pub spi: Cell,
    pub papers_failed: Cell,
    pub marks: BTreeMap<String, Cell>,
}

impl CanonicalRow {
    pub fn field(&self, field: CanonicalField) -> &Cell {
        match field {
            CanonicalField::Name => &self.name,
            CanonicalField::RollNo => &self.rollno,
            CanonicalField::PapersFailed => &self.papers_failed,
            CanonicalField::TotalCredits => &self.total_credits,
            CanonicalField::Spi => &self.spi,
        }
    }

    pub fn field_mut(&mut self, field: CanonicalField) -> &mut Cell {
        match field {
            CanonicalField::Name => &mut self.name,
            CanonicalField::RollNo => &mut self.rollno,
            CanonicalField::PapersFailed => &mut self.papers_failed,
            CanonicalField::TotalCredits => &mut self.total_credits,
            CanonicalField::Spi => &mut self.spi,
        }
    }

    /// Iterates every cell of the row except the given canonical field.
    pub fn cells_except(&self, skip: Option<CanonicalField>) -> impl Iterator<Item = &Cell> {
        [
            CanonicalField::Name,
            CanonicalField::RollNo,
            CanonicalField::PapersFailed,
            CanonicalField::TotalCredits,
            CanonicalField::Spi,
        ]
        .into_iter()
        .filter(move |field| Some(*field) != skip)
        .map(move |field| self.field(field))
        .chain(std::iter::once(&self.index))
        .chain(self.marks.values())
    }

    pub fn is_blank(&self) -> bool {
        self.cells_except(None).all(Cell::is_empty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub program: String,
    pub branch: String,
    pub semester: String,
    pub release_date: String,
    pub examination_date: String,
    pub notice: String,
}

/// One student's result on one page of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub name: String,
    pub rollno: String,
    pub program: String,
    pub branch: String,
    pub semester: String,
    pub pdf_filename: String,
    pub pdf_pagenum: usize,
    pub release_date: String,
    pub examination_date: String,
    pub notice: String,
    pub spi: Cell,
    pub total_credits: Cell,
    pub papers_failed: Vec<String>,
    pub marks: BTreeMap<String, Cell>,
}

/// Ledger value: `true`/`false` or an error description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LedgerEntry {
    Flag(bool),
    Error(String),
}

impl LedgerEntry {
    pub fn is_success(&self) -> bool {
        matches!(self, LedgerEntry::Flag(true))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ParsePaths {
    pub cache_root: String,
    pub source_directory: String,
    pub ledger_path: String,
    pub db_path: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseCounts {
    pub discovered_documents: usize,
    pub skipped_documents: usize,
    pub succeeded_documents: usize,
    pub failed_documents: usize,
    pub pages_parsed: usize,
    pub pages_failed: usize,
    pub records_produced: usize,
    pub records_stored: usize,
    pub rows_skipped: usize,
    pub papers_failed_warnings: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParseRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub paths: ParsePaths,
    pub counts: ParseCounts,
    pub failures: BTreeMap<String, String>,
}
