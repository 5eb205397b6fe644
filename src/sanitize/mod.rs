//! Turns raw extractor tables and page text into result records.
//!
//! Per page the stages run as: column normalization, row merging
//! (`papers_failed` pass then `name` pass), metadata parsing, record assembly.

mod assemble;
mod columns;
mod merge;
mod metadata;

pub use assemble::{AssembledPage, PapersFailedTokenizer, RecordSource, assemble_page};
pub use columns::normalize_table;
pub use merge::{PageRef, merge_page};
pub use metadata::MetadataParser;
