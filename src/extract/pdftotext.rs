use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow, bail};

use super::TextExtractor;
use crate::error::SanitizeError;
use crate::util::file_name_of;

/// Reads page text with poppler's `pdftotext`, sized by `pdfinfo`.
#[derive(Debug, Clone)]
pub struct PdftotextTextExtractor {
    pdftotext_bin: PathBuf,
    pdfinfo_bin: PathBuf,
}

impl PdftotextTextExtractor {
    pub fn new(pdftotext_bin: PathBuf, pdfinfo_bin: PathBuf) -> Self {
        Self {
            pdftotext_bin,
            pdfinfo_bin,
        }
    }

    fn page_count(&self, path: &Path) -> Result<usize> {
        let output = Command::new(&self.pdfinfo_bin)
            .arg(path)
            .output()
            .with_context(|| format!("failed to execute pdfinfo for {}", path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "pdfinfo returned non-zero exit status for {}: {}",
                path.display(),
                stderr.trim()
            );
        }

        parse_pdfinfo_pages(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| anyhow!("pdfinfo reported no page count for {}", path.display()))
    }
}

impl TextExtractor for PdftotextTextExtractor {
    fn extract_text(&self, path: &Path, page_index: usize) -> Result<Vec<String>> {
        let page_count = self.page_count(path)?;
        if page_index >= page_count {
            return Err(SanitizeError::PageOutOfRange {
                document: file_name_of(path),
                page: page_index,
                page_count,
            }
            .into());
        }

        let page_number = (page_index + 1).to_string();
        let output = Command::new(&self.pdftotext_bin)
            .arg("-enc")
            .arg("UTF-8")
            .arg("-layout")
            .arg("-f")
            .arg(&page_number)
            .arg("-l")
            .arg(&page_number)
            .arg(path)
            .arg("-")
            .output()
            .with_context(|| format!("failed to execute pdftotext for {}", path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "pdftotext returned non-zero exit status for {} page {}: {}",
                path.display(),
                page_index,
                stderr.trim()
            );
        }

        Ok(split_page_lines(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Reads the `Pages:` line of `pdfinfo` output.
pub fn parse_pdfinfo_pages(output: &str) -> Option<usize> {
    output.lines().find_map(|line| {
        line.strip_prefix("Pages:")
            .and_then(|value| value.trim().parse::<usize>().ok())
    })
}

pub fn split_page_lines(raw: &str) -> Vec<String> {
    raw.replace(['\u{0000}', '\u{000C}'], "")
        .lines()
        .map(|line| line.trim_end().to_string())
        .collect()
}
