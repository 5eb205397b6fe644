use std::path::Path;

use anyhow::{Result, bail};
use tracing::{debug, warn};

use crate::extract::{ExtractionCache, TableExtractor, TextExtractor, cached_tables, cached_text};
use crate::model::{RawTable, ResultRecord};
use crate::sanitize::{
    AssembledPage, MetadataParser, PageRef, PapersFailedTokenizer, RecordSource, assemble_page,
    merge_page, normalize_table,
};
use crate::util::{file_name_of, sha256_file};

/// What to do when a page fails to merge or its metadata is incomplete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Return the page error to the caller.
    Propagate,
    /// Log the failure, record it and carry on with the next page.
    IsolatePages,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageFailure {
    pub page: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    pub document: String,
    pub records: Vec<ResultRecord>,
    pub pages_parsed: usize,
    pub page_failures: Vec<PageFailure>,
    pub rows_skipped: usize,
    pub warnings: Vec<String>,
}

pub struct DocumentParser<'a> {
    tables: &'a dyn TableExtractor,
    text: &'a dyn TextExtractor,
    cache: &'a dyn ExtractionCache,
    metadata: MetadataParser,
    tokenizer: PapersFailedTokenizer,
}

impl<'a> DocumentParser<'a> {
    pub fn new(
        tables: &'a dyn TableExtractor,
        text: &'a dyn TextExtractor,
        cache: &'a dyn ExtractionCache,
    ) -> Result<Self> {
        Ok(Self {
            tables,
            text,
            cache,
            metadata: MetadataParser::new()?,
            tokenizer: PapersFailedTokenizer::new()?,
        })
    }

    /// Parses every page of `path` in page order and concatenates the records.
    pub fn parse_document(&self, path: &Path, policy: FailurePolicy) -> Result<ParsedDocument> {
        let document = file_name_of(path);
        let digest = sha256_file(path)?;
        let tables = cached_tables(self.cache, self.tables, path, &digest)?;
        if tables.is_empty() {
            bail!("table extractor found 0 pages in {document}");
        }

        let mut parsed = ParsedDocument {
            document: document.clone(),
            ..ParsedDocument::default()
        };
        let mut first_failure = None;

        for (page_index, table) in tables.iter().enumerate() {
            match self.parse_page(path, &document, &digest, page_index, table) {
                Ok(page) => {
                    debug!(
                        document = %document,
                        page = page_index,
                        records = page.records.len(),
                        "parsed page"
                    );
                    parsed.pages_parsed += 1;
                    parsed.rows_skipped += page.skipped.len();
                    parsed.warnings.extend(page.warnings);
                    parsed.records.extend(page.records);
                }
                Err(err) => {
                    if policy == FailurePolicy::Propagate {
                        return Err(err);
                    }
                    let message = format!("{err:#}");
                    warn!(document = %document, page = page_index, error = %message, "page failed");
                    parsed.page_failures.push(PageFailure {
                        page: page_index,
                        error: message,
                    });
                    first_failure.get_or_insert(err);
                }
            }
        }

        if parsed.pages_parsed == 0
            && let Some(err) = first_failure
        {
            return Err(err.context(format!("every page of {document} failed")));
        }

        Ok(parsed)
    }

    fn parse_page(
        &self,
        path: &Path,
        document: &str,
        digest: &str,
        page_index: usize,
        table: &RawTable,
    ) -> Result<AssembledPage> {
        let page = PageRef {
            document,
            page: page_index,
        };
        let merged = merge_page(normalize_table(table), page)?;

        let lines = cached_text(self.cache, self.text, path, digest, page_index)?;
        let metadata = self.metadata.parse(&lines, document, page_index)?;

        let source = RecordSource {
            pdf_filename: document,
            pdf_pagenum: page_index,
        };
        Ok(assemble_page(merged.rows, &metadata, source, &self.tokenizer))
    }
}
