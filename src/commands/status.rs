use std::collections::BTreeMap;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{info, warn};

use super::{db_path, ledger_path};
use crate::cli::StatusArgs;
use crate::model::LedgerEntry;
use crate::pipeline::ProgressLedger;
use crate::store::ResultStore;

pub fn run(args: StatusArgs) -> Result<()> {
    let ledger_path = ledger_path(&args.cache_root, args.ledger_path.as_ref());
    let db_path = db_path(&args.cache_root, args.db_path.as_ref());

    info!(cache_root = %args.cache_root.display(), "status requested");

    if ledger_path.exists() {
        let ledger = ProgressLedger::load(&ledger_path)?;
        let counts = ledger.counts();
        info!(
            path = %ledger_path.display(),
            succeeded = counts.succeeded,
            failed = counts.failed,
            "loaded progress ledger"
        );

        let classifier = FailureClassifier::new()?;
        for (kind, count) in group_failures(ledger.entries(), &classifier) {
            info!(kind = %kind, count, "failure group");
        }
    } else {
        warn!(path = %ledger_path.display(), "progress ledger missing");
    }

    if db_path.exists() {
        let store = ResultStore::open(&db_path)?;
        info!(
            path = %db_path.display(),
            records = store.count_records()?,
            "result store status"
        );
    } else {
        warn!(path = %db_path.display(), "result store missing");
    }

    Ok(())
}

/// Reduces a ledger error string to the kind of failure it reports.
pub(crate) struct FailureClassifier {
    missing_metadata: Regex,
    missing_column: Regex,
}

impl FailureClassifier {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            missing_metadata: Regex::new(r"couldn't determine '([^']+)'")
                .context("failed to compile missing metadata regex")?,
            missing_column: Regex::new(r"has no '([^']+)' column")
                .context("failed to compile missing column regex")?,
        })
    }

    pub(crate) fn classify(&self, message: &str) -> String {
        if let Some(captures) = self.missing_metadata.captures(message) {
            return format!("couldn't determine '{}'", &captures[1]);
        }
        if let Some(captures) = self.missing_column.captures(message) {
            return format!("missing column '{}'", &captures[1]);
        }
        if message.contains("table extractor found 0 pages") {
            return "table extractor found 0 pages".to_string();
        }
        if message.contains("requested page index") {
            return "page out of range".to_string();
        }
        if message.contains("worker panicked") {
            return "worker panicked".to_string();
        }

        // `{:#}` chains end with the root cause.
        message
            .rsplit(": ")
            .next()
            .unwrap_or(message)
            .trim()
            .to_string()
    }
}

/// Failure kinds with their counts, most frequent first.
pub(crate) fn group_failures(
    entries: &BTreeMap<String, LedgerEntry>,
    classifier: &FailureClassifier,
) -> Vec<(String, usize)> {
    let mut groups = BTreeMap::<String, usize>::new();
    for entry in entries.values() {
        let kind = match entry {
            LedgerEntry::Flag(true) => continue,
            LedgerEntry::Flag(false) => "failed without detail".to_string(),
            LedgerEntry::Error(message) => classifier.classify(message),
        };
        *groups.entry(kind).or_default() += 1;
    }

    let mut groups = groups.into_iter().collect::<Vec<(String, usize)>>();
    groups.sort_by(|left, right| right.1.cmp(&left.1).then_with(|| left.0.cmp(&right.0)));
    groups
}
