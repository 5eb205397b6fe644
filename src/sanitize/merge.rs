use tracing::{debug, warn};

use super::columns::{CanonicalTable, ColumnLabel};
use crate::error::SanitizeError;
use crate::model::{CanonicalField, CanonicalRow, Cell};

/// Cell value identifying the units row printed under the table header.
pub const UNITS_ROW_MARKER: &str = "Max. Marks / Credits";

/// Location of the page being merged, used in error reports.
#[derive(Debug, Clone, Copy)]
pub struct PageRef<'a> {
    pub document: &'a str,
    pub page: usize,
}

/// Runs the full merge for one page: preparation, then the `papers_failed`
/// pass, then the `name` pass. The pass order is fixed.
pub fn merge_page(table: CanonicalTable, page: PageRef<'_>) -> Result<CanonicalTable, SanitizeError> {
    let prepared = prepare_rows(table);
    let papers_merged = merge_continuations(prepared, CanonicalField::PapersFailed, page)?;
    merge_continuations(papers_merged, CanonicalField::Name, page)
}

/// Drops the units row, the leading index column and rows with no content.
pub fn prepare_rows(table: CanonicalTable) -> CanonicalTable {
    let CanonicalTable { columns, rows } = table;

    let mut rows = rows.into_iter().peekable();
    if rows
        .peek()
        .map(|first| first.cells_except(None).any(|cell| cell.contains_text(UNITS_ROW_MARKER)))
        .unwrap_or(false)
    {
        let dropped = rows.next();
        debug!(row = ?dropped, "dropped units row");
    }

    let rows = rows
        .map(|row| CanonicalRow {
            index: Cell::Empty,
            ..row
        })
        .filter(|row| !row.is_blank())
        .collect();

    let columns = columns
        .into_iter()
        .filter(|label| *label != ColumnLabel::LeadingIndex)
        .collect();

    CanonicalTable { columns, rows }
}

/// True when every cell except `field` is empty and `field` carries text.
pub fn is_continuation_row(row: &CanonicalRow, field: CanonicalField) -> bool {
    !row.field(field).is_empty() && row.cells_except(Some(field)).all(Cell::is_empty)
}

/// Folds continuation rows for `field` into the preceding surviving row.
pub fn merge_continuations(
    table: CanonicalTable,
    field: CanonicalField,
    page: PageRef<'_>,
) -> Result<CanonicalTable, SanitizeError> {
    if !table.has_field(field) {
        return Err(SanitizeError::StructuralExtraction {
            field,
            document: page.document.to_string(),
            page: page.page,
        });
    }

    let CanonicalTable { columns, rows } = table;
    let mut merged: Vec<CanonicalRow> = Vec::with_capacity(rows.len());

    for row in rows {
        if !is_continuation_row(&row, field) {
            merged.push(row);
            continue;
        }

        let fragment = row.field(field).as_text().unwrap_or_default();
        let Some(previous) = merged.last_mut() else {
            warn!(
                document = %page.document,
                page = page.page,
                field = %field,
                fragment = %fragment,
                "dropped continuation row with no preceding row"
            );
            continue;
        };

        let target = previous.field_mut(field);
        let joined = match target.as_text() {
            Some(existing) => format!("{existing} {}", fragment.trim()),
            None => fragment.trim().to_string(),
        };
        *target = Cell::Text(joined);
    }

    if field == CanonicalField::Name {
        for row in &mut merged {
            if let Some(name) = row.name.as_text() {
                row.name = Cell::text(&clean_name(&name));
            }
        }
    }

    Ok(CanonicalTable {
        columns,
        rows: merged,
    })
}

/// Strips the serial number prefix and collapses runs of spaces.
pub fn clean_name(raw: &str) -> String {
    raw.trim_start_matches(|character: char| character.is_ascii_digit() || character.is_whitespace())
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}
