use anyhow::{Context, Result};
use regex::Regex;
use tracing::warn;

use crate::error::SanitizeError;
use crate::model::{CanonicalField, CanonicalRow, PageMetadata, ResultRecord};

/// Splits a `papers_failed` cell into subject codes such as `MC-303`.
pub struct PapersFailedTokenizer {
    subject_code: Regex,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct TokenizedPapers {
    pub codes: Vec<String>,
    pub residue: Vec<String>,
}

impl PapersFailedTokenizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            subject_code: Regex::new(r"[A-Z]{2,3}-\d{3}")
                .context("failed to compile subject code regex")?,
        })
    }

    /// Whitespace is dropped first so codes wrapped across lines rejoin.
    pub fn tokenize(&self, raw: &str) -> TokenizedPapers {
        let compact = raw
            .chars()
            .filter(|character| !character.is_whitespace())
            .collect::<String>();

        let mut tokenized = TokenizedPapers::default();
        let mut cursor = 0usize;
        for code in self.subject_code.find_iter(&compact) {
            if code.start() > cursor {
                tokenized.residue.push(compact[cursor..code.start()].to_string());
            }
            tokenized.codes.push(code.as_str().to_string());
            cursor = code.end();
        }
        if cursor < compact.len() {
            tokenized.residue.push(compact[cursor..].to_string());
        }

        tokenized
    }
}

/// Where the rows being assembled came from.
#[derive(Debug, Clone, Copy)]
pub struct RecordSource<'a> {
    pub pdf_filename: &'a str,
    pub pdf_pagenum: usize,
}

#[derive(Debug)]
pub enum RowOutcome {
    Record {
        record: Box<ResultRecord>,
        warnings: Vec<String>,
    },
    Skipped(SanitizeError),
}

#[derive(Debug, Default)]
pub struct AssembledPage {
    pub records: Vec<ResultRecord>,
    pub skipped: Vec<SanitizeError>,
    pub warnings: Vec<String>,
}

pub fn assemble_row(
    row: CanonicalRow,
    row_index: usize,
    metadata: &PageMetadata,
    source: RecordSource<'_>,
    tokenizer: &PapersFailedTokenizer,
) -> RowOutcome {
    let Some(name) = row.name.as_text() else {
        return RowOutcome::Skipped(SanitizeError::RowIncomplete {
            field: CanonicalField::Name,
            row: row_index,
        });
    };
    let Some(rollno) = row.rollno.as_text() else {
        return RowOutcome::Skipped(SanitizeError::RowIncomplete {
            field: CanonicalField::RollNo,
            row: row_index,
        });
    };
    let rollno = rollno.trim().to_string();

    let mut warnings = Vec::new();
    let papers_failed = match row.papers_failed.as_text() {
        Some(raw) => {
            let tokenized = tokenizer.tokenize(&raw);
            for fragment in tokenized.residue {
                warnings.push(format!(
                    "{} page {} rollno {}: unrecognized papers_failed fragment '{}'",
                    source.pdf_filename, source.pdf_pagenum, rollno, fragment
                ));
            }
            tokenized.codes
        }
        None => Vec::new(),
    };

    let marks = row
        .marks
        .into_iter()
        .map(|(code, cell)| (code, cell.into_numeric()))
        .collect();

    RowOutcome::Record {
        record: Box::new(ResultRecord {
            name,
            rollno,
            program: metadata.program.clone(),
            branch: metadata.branch.clone(),
            semester: metadata.semester.clone(),
            pdf_filename: source.pdf_filename.to_string(),
            pdf_pagenum: source.pdf_pagenum,
            release_date: metadata.release_date.clone(),
            examination_date: metadata.examination_date.clone(),
            notice: metadata.notice.clone(),
            spi: row.spi.into_numeric(),
            total_credits: row.total_credits.into_numeric(),
            papers_failed,
            marks,
        }),
        warnings,
    }
}

/// Builds one record per merged row; incomplete rows are skipped, not fatal.
pub fn assemble_page(
    rows: Vec<CanonicalRow>,
    metadata: &PageMetadata,
    source: RecordSource<'_>,
    tokenizer: &PapersFailedTokenizer,
) -> AssembledPage {
    let mut page = AssembledPage::default();

    for (row_index, row) in rows.into_iter().enumerate() {
        match assemble_row(row, row_index, metadata, source, tokenizer) {
            RowOutcome::Record { record, warnings } => {
                for warning in &warnings {
                    warn!(warning = %warning, "papers_failed residue");
                }
                page.warnings.extend(warnings);
                page.records.push(*record);
            }
            RowOutcome::Skipped(reason) => {
                warn!(
                    document = %source.pdf_filename,
                    page = source.pdf_pagenum,
                    reason = %reason,
                    "skipping row"
                );
                page.skipped.push(reason);
            }
        }
    }

    page
}
