use tracing::debug;

use crate::model::{CanonicalField, CanonicalRow, Cell, RawTable};

/// Placeholder the table extractor gives its first unlabeled column.
pub const LEADING_INDEX_LABEL: &str = "Unnamed: 0";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnLabel {
    Canonical(CanonicalField),
    LeadingIndex,
    Subject(String),
}

impl ColumnLabel {
    pub fn as_str(&self) -> &str {
        match self {
            ColumnLabel::Canonical(field) => field.as_str(),
            ColumnLabel::LeadingIndex => LEADING_INDEX_LABEL,
            ColumnLabel::Subject(code) => code,
        }
    }
}

/// A page table after column normalization, rows still in extractor order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalTable {
    pub columns: Vec<ColumnLabel>,
    pub rows: Vec<CanonicalRow>,
}

impl CanonicalTable {
    pub fn has_field(&self, field: CanonicalField) -> bool {
        self.columns
            .iter()
            .any(|label| *label == ColumnLabel::Canonical(field))
    }
}

/// Lower-cased label with every whitespace character removed.
pub fn comparison_key(label: &str) -> String {
    label
        .chars()
        .filter(|character| !character.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn normalize_label(label: &str) -> ColumnLabel {
    match comparison_key(label).as_str() {
        "sr.no.name" | "name" => ColumnLabel::Canonical(CanonicalField::Name),
        "rollno." | "rollno" | "roll_no" => ColumnLabel::Canonical(CanonicalField::RollNo),
        "unnamed:1" | "papers_failed" => ColumnLabel::Canonical(CanonicalField::PapersFailed),
        "tc" | "total_credits" => ColumnLabel::Canonical(CanonicalField::TotalCredits),
        "spi" => ColumnLabel::Canonical(CanonicalField::Spi),
        "unnamed:0" => ColumnLabel::LeadingIndex,
        _ => ColumnLabel::Subject(label.trim().to_string()),
    }
}

pub fn normalize_columns(labels: &[String]) -> Vec<ColumnLabel> {
    labels
        .iter()
        .map(|label| {
            let normalized = normalize_label(label);
            if normalized.as_str() != label {
                debug!(from = %label, to = %normalized.as_str(), "renamed column");
            }
            normalized
        })
        .collect()
}

/// Renames the columns of `table` and lifts each row into a `CanonicalRow`.
pub fn normalize_table(table: &RawTable) -> CanonicalTable {
    let columns = normalize_columns(&table.columns);

    let rows = table
        .rows
        .iter()
        .map(|cells| {
            let mut row = CanonicalRow::default();
            for (position, label) in columns.iter().enumerate() {
                let cell = cells.get(position).cloned().unwrap_or(Cell::Empty);
                let slot = match label {
                    ColumnLabel::Canonical(field) => row.field_mut(*field),
                    ColumnLabel::LeadingIndex => &mut row.index,
                    ColumnLabel::Subject(code) => row.marks.entry(code.clone()).or_default(),
                };
                // Duplicate labels keep the first non-empty value.
                if slot.is_empty() {
                    *slot = cell;
                }
            }
            row
        })
        .collect();

    CanonicalTable { columns, rows }
}
