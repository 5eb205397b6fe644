use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::debug;

use super::TableExtractor;
use crate::model::{Cell, RawTable};

/// Runs the tabula jar in lattice-guessing mode and reads its JSON output.
#[derive(Debug, Clone)]
pub struct TabulaTableExtractor {
    java_bin: PathBuf,
    jar: PathBuf,
}

#[derive(Debug, Deserialize)]
struct TabulaTable {
    #[serde(default)]
    data: Vec<Vec<TabulaCell>>,
}

#[derive(Debug, Deserialize)]
struct TabulaCell {
    #[serde(default)]
    text: String,
}

impl TabulaTableExtractor {
    pub fn new(java_bin: PathBuf, jar: PathBuf) -> Self {
        Self { java_bin, jar }
    }
}

impl TableExtractor for TabulaTableExtractor {
    fn extract_tables(&self, path: &Path) -> Result<Vec<RawTable>> {
        let output = Command::new(&self.java_bin)
            .arg("-jar")
            .arg(&self.jar)
            .arg("--format")
            .arg("JSON")
            .arg("--pages")
            .arg("all")
            .arg("--guess")
            .arg(path)
            .output()
            .with_context(|| format!("failed to execute tabula for {}", path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "tabula returned non-zero exit status for {}: {}",
                path.display(),
                stderr.trim()
            );
        }

        let tables = parse_tabula_json(&String::from_utf8_lossy(&output.stdout))
            .with_context(|| format!("failed to parse tabula output for {}", path.display()))?;
        debug!(path = %path.display(), tables = tables.len(), "tabula extraction finished");
        Ok(tables)
    }
}

/// Converts tabula's JSON into raw tables.
///
/// The first row of each table is its header. Blank header cells get the
/// placeholder labels `Unnamed: 0`, `Unnamed: 1`, ... counted over the blank
/// cells only, and every body row is padded to the header width.
pub fn parse_tabula_json(json: &str) -> Result<Vec<RawTable>> {
    let tables: Vec<TabulaTable> =
        serde_json::from_str(json).context("tabula output is not a JSON table list")?;

    Ok(tables.into_iter().map(into_raw_table).collect())
}

fn into_raw_table(table: TabulaTable) -> RawTable {
    let mut rows = table.data.into_iter().map(|row| {
        row.into_iter()
            .map(|cell| cell.text.replace('\r', " "))
            .collect::<Vec<String>>()
    });

    let mut unnamed = 0usize;
    let mut columns = rows
        .next()
        .unwrap_or_default()
        .into_iter()
        .map(|label| {
            let label = label.trim().to_string();
            if label.is_empty() {
                let placeholder = format!("Unnamed: {unnamed}");
                unnamed += 1;
                placeholder
            } else {
                label
            }
        })
        .collect::<Vec<String>>();

    let body = rows
        .map(|row| row.iter().map(|value| Cell::text(value)).collect::<Vec<Cell>>())
        .collect::<Vec<Vec<Cell>>>();

    let width = body.iter().map(Vec::len).max().unwrap_or(0);
    while columns.len() < width {
        columns.push(format!("Unnamed: {unnamed}"));
        unnamed += 1;
    }
    let rows = body
        .into_iter()
        .map(|mut row| {
            row.resize(columns.len(), Cell::Empty);
            row
        })
        .collect();

    RawTable { columns, rows }
}
