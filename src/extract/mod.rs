//! Adapters over the external PDF tools plus the extraction cache.

mod cache;
mod pdftotext;
mod tabula;

use std::path::Path;

use anyhow::Result;

use crate::model::RawTable;

pub use cache::{DiskCache, ExtractionCache, MemoryCache, NoCache, cached_tables, cached_text};
pub use pdftotext::PdftotextTextExtractor;
pub use tabula::TabulaTableExtractor;

/// Yields every table of a document, one per page, in page order.
pub trait TableExtractor: Send + Sync {
    fn extract_tables(&self, path: &Path) -> Result<Vec<RawTable>>;
}

/// Yields the text lines of one page, top to bottom.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, path: &Path, page_index: usize) -> Result<Vec<String>>;
}
