use anyhow::{Context, Result};
use regex::Regex;

use crate::error::SanitizeError;
use crate::model::PageMetadata;

/// Opening of the sentence that announces which examination the notice covers.
pub const EXAMINATION_ANNOUNCEMENT: &str =
    "THE RESULT OF THE CANDIDATES WHO APPEARED IN THE FOLLOWING EXAMINATION";

/// Extracts the descriptive fields printed above the result table.
pub struct MetadataParser {
    program_semester: Regex,
    branch: Regex,
    examination_date: Regex,
    release_date: Regex,
}

#[derive(Debug, Default)]
struct PartialMetadata {
    program: Option<String>,
    branch: Option<String>,
    semester: Option<String>,
    release_date: Option<String>,
    examination_date: Option<String>,
    notice: Option<String>,
}

impl MetadataParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            program_semester: Regex::new(
                r"^Program\s?:\s*(?P<program>.+?)\s+Sem\s?:\s*(?P<semester>.+?)\s*$",
            )
            .context("failed to compile program/semester regex")?,
            branch: Regex::new(r"^Branch\s?:").context("failed to compile branch regex")?,
            examination_date: Regex::new(r"(?:JAN|FEB|MAR|APR|MAY|JUN|AUG|SEPT|OCT|NOV|DEC)[-.]\d{4}")
                .context("failed to compile examination date regex")?,
            release_date: Regex::new(r"Dated?\s?:\s?(?P<date>\d{1,4}(?:/\d{1,4}){1,2})")
                .context("failed to compile release date regex")?,
        })
    }

    /// Parses the six required fields; any missing one fails the whole page.
    pub fn parse(
        &self,
        lines: &[String],
        document: &str,
        page: usize,
    ) -> Result<PageMetadata, SanitizeError> {
        let mut found = PartialMetadata::default();

        for line in lines {
            let original = line.trim();
            let normalized = collapse_whitespace(original);
            if normalized.is_empty() {
                continue;
            }

            if found.notice.is_none() && is_notice_line(&normalized) {
                found.notice = Some(original.to_string());
                continue;
            }

            if found.examination_date.is_none() && normalized.starts_with(EXAMINATION_ANNOUNCEMENT) {
                found.examination_date = self
                    .examination_date
                    .find(&normalized)
                    .map(|token| token.as_str().to_string());
                continue;
            }

            if found.program.is_none()
                && let Some(captures) = self.program_semester.captures(&normalized)
            {
                found.program = Some(captures["program"].trim().to_string());
                found.semester = Some(captures["semester"].trim().to_string());
                continue;
            }

            if found.branch.is_none()
                && self.branch.is_match(&normalized)
                && let Some((_, value)) = normalized.split_once(':')
                && !value.trim().is_empty()
            {
                found.branch = Some(value.trim().to_string());
            }
        }

        let full_text = lines.concat();
        found.release_date = self
            .release_date
            .captures(&full_text)
            .map(|captures| captures["date"].to_string());

        found.into_metadata(document, page)
    }
}

impl PartialMetadata {
    fn into_metadata(self, document: &str, page: usize) -> Result<PageMetadata, SanitizeError> {
        let missing = |field: &'static str| SanitizeError::MetadataIncomplete {
            field,
            document: document.to_string(),
            page,
        };

        Ok(PageMetadata {
            program: self.program.ok_or_else(|| missing("program"))?,
            branch: self.branch.ok_or_else(|| missing("branch"))?,
            semester: self.semester.ok_or_else(|| missing("semester"))?,
            release_date: self.release_date.ok_or_else(|| missing("release_date"))?,
            examination_date: self
                .examination_date
                .ok_or_else(|| missing("examination_date"))?,
            notice: self.notice.ok_or_else(|| missing("notice"))?,
        })
    }
}

/// Notice lines start with "No" or "Result Notification" once reduced to
/// lower-case alphanumerics.
fn is_notice_line(line: &str) -> bool {
    let key = line
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|character| character.to_ascii_lowercase())
        .collect::<String>();
    key.starts_with("no") || key.starts_with("resultnotification")
}

fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<&str>>().join(" ")
}
