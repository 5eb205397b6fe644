use thiserror::Error;

use crate::model::CanonicalField;

/// Failures raised while turning extractor output into result records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SanitizeError {
    #[error("{document} page {page}: table has no '{field}' column")]
    StructuralExtraction {
        field: CanonicalField,
        document: String,
        page: usize,
    },

    #[error("couldn't determine '{field}' from {document} page {page}")]
    MetadataIncomplete {
        field: &'static str,
        document: String,
        page: usize,
    },

    #[error("row {row}: '{field}' is empty")]
    RowIncomplete { field: CanonicalField, row: usize },

    #[error("{document} has {page_count} pages, requested page index {page}")]
    PageOutOfRange {
        document: String,
        page: usize,
        page_count: usize,
    },
}
