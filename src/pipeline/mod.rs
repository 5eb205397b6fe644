//! Drives the sanitizer over whole documents and directories of documents.

mod batch;
mod document;
mod ledger;
#[cfg(test)]
mod tests;

pub use batch::{BatchOptions, BatchSummary, DocumentOutcome, DocumentStatus, parse_all};
pub use document::{DocumentParser, FailurePolicy, ParsedDocument};
pub use ledger::ProgressLedger;
