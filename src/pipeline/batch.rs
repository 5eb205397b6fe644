use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{error, info};

use super::document::{DocumentParser, FailurePolicy, ParsedDocument};
use super::ledger::ProgressLedger;
use crate::model::LedgerEntry;
use crate::util::{discover_files, has_pdf_extension};

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub parallel: bool,
    /// Worker count; `None` lets rayon pick one per core.
    pub jobs: Option<usize>,
    pub show_progress: bool,
}

#[derive(Debug)]
pub enum DocumentStatus {
    Parsed(ParsedDocument),
    Failed(String),
}

#[derive(Debug)]
pub struct DocumentOutcome {
    pub key: String,
    pub status: DocumentStatus,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub discovered: usize,
    pub skipped: usize,
    /// Completion order, which differs from discovery order in parallel runs.
    pub outcomes: Vec<DocumentOutcome>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, DocumentStatus::Parsed(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn parsed_documents(&self) -> impl Iterator<Item = &ParsedDocument> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.status {
            DocumentStatus::Parsed(document) => Some(document),
            DocumentStatus::Failed(_) => None,
        })
    }
}

/// Ledger key for a document.
pub fn ledger_key(path: &Path) -> String {
    path.display().to_string()
}

/// Parses every PDF under `directory` not already marked successful.
///
/// Each parsed document is handed to `sink` on the calling thread as it
/// completes; a sink error turns that document into a failure. Every outcome
/// is written to `ledger`, which is saved once at the end of the run.
pub fn parse_all(
    parser: &DocumentParser<'_>,
    directory: &Path,
    options: BatchOptions,
    ledger: &mut ProgressLedger,
    sink: &mut dyn FnMut(&ParsedDocument) -> Result<()>,
) -> Result<BatchSummary> {
    let discovered = discover_files(directory)?
        .into_iter()
        .filter(|path| has_pdf_extension(path))
        .collect::<Vec<PathBuf>>();
    let pending = discovered
        .iter()
        .filter(|path| !ledger.is_success(&ledger_key(path)))
        .cloned()
        .collect::<Vec<PathBuf>>();

    let mut summary = BatchSummary {
        discovered: discovered.len(),
        skipped: discovered.len() - pending.len(),
        outcomes: Vec::with_capacity(pending.len()),
    };
    info!(
        directory = %directory.display(),
        discovered = summary.discovered,
        skipped = summary.skipped,
        pending = pending.len(),
        "starting batch parse"
    );

    let progress = progress_bar(pending.len(), options.show_progress)?;
    let mut record_outcome = |key: String, result: Result<ParsedDocument>| {
        let result = result.and_then(|document| {
            sink(&document)?;
            Ok(document)
        });
        let status = match result {
            Ok(document) => {
                ledger.record(&key, LedgerEntry::Flag(true));
                DocumentStatus::Parsed(document)
            }
            Err(err) => {
                let message = format!("{err:#}");
                error!(document = %key, error = %message, "document failed");
                ledger.record(&key, LedgerEntry::Error(message.clone()));
                DocumentStatus::Failed(message)
            }
        };
        summary.outcomes.push(DocumentOutcome { key, status });
        progress.inc(1);
    };

    if options.parallel {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.jobs.unwrap_or(0))
            .build()
            .context("failed to build document worker pool")?;
        let (sender, receiver) = mpsc::channel();

        thread::scope(|scope| {
            scope.spawn(move || {
                pool.install(|| {
                    pending.par_iter().for_each_with(sender, |sender, path| {
                        // The receiver only goes away if the collector panicked.
                        let _ = sender.send((ledger_key(path), parse_isolated(parser, path)));
                    });
                });
            });

            for (key, result) in receiver {
                record_outcome(key, result);
            }
        });
    } else {
        for path in &pending {
            record_outcome(ledger_key(path), parse_isolated(parser, path));
        }
    }
    progress.finish_and_clear();

    ledger.save()?;
    info!(
        succeeded = summary.succeeded(),
        failed = summary.failed(),
        skipped = summary.skipped,
        "batch parse finished"
    );

    Ok(summary)
}

/// Runs one document with page isolation and turns a worker panic into an error.
fn parse_isolated(parser: &DocumentParser<'_>, path: &Path) -> Result<ParsedDocument> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        parser.parse_document(path, FailurePolicy::IsolatePages)
    }))
    .unwrap_or_else(|payload| {
        Err(anyhow!(
            "worker panicked while parsing {}: {}",
            path.display(),
            panic_message(payload.as_ref())
        ))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn progress_bar(len: usize, visible: bool) -> Result<ProgressBar> {
    if !visible {
        return Ok(ProgressBar::hidden());
    }

    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .context("invalid progress bar template")?
            .progress_chars("#>-"),
    );
    Ok(bar)
}
